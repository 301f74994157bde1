//! Declarative endpoint contracts.
//!
//! # Data Flow
//! ```text
//! ResourceDef (template, verb, shapes, content types)
//!     → definition.rs (builder, immutable once bound)
//!     → args.rs (field table: flat string map → typed args)
//!     → body.rs (how the request body becomes a typed value)
//! ```
//!
//! # Design Decisions
//! - Shapes are type parameters; the field table is built once per definition
//! - A definition names exactly one verb
//! - Absent keys leave the `Default` value in place

pub mod args;
pub mod body;
pub mod definition;
pub mod verb;

pub use args::{ArgsBinder, Args, ArgumentBindError, Field, FieldKind};
pub use body::BodyShape;
pub use definition::ResourceDef;
pub use verb::Verb;
