//! Request binding pipeline.
//!
//! # Data Flow
//! ```text
//! RawRequest
//!     → TraceInit (ids from headers, trace record received)
//!     → extract.rs (query + form body + path variables)
//!     → ArgsBinder (400 on failure)
//!     → CodecRegistry::decode_body (body verbs only, 400 on failure)
//!     → binder-wrapped handler (panics caught as HandlerFault)
//!     → negotiate.rs (success only)
//!     → CodecRegistry::encode_reply (500 on failure)
//!     → reply.rs (exactly one response, trace completed or failed)
//! ```
//!
//! # Design Decisions
//! - Every failure becomes a reply; nothing propagates past an endpoint
//! - The trace record is finalized by a drop guard on every exit path
//! - Binding checks verb capabilities once, up front

mod endpoint;
pub mod error;
pub mod extract;
pub mod negotiate;
pub mod reply;
pub mod root;

pub use error::PipelineError;
pub use reply::{catch_fault, guaranteed_reply, HandlerFault, ReplyOutcome};
pub use root::{Binding, RootHandler};
