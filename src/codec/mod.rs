//! Content-type codec subsystem.
//!
//! # Data Flow
//! ```text
//! request bytes + Content-Type
//!     → registry.rs (pick decoder by content type)
//!     → json.rs (bytes → serde_json::Value)
//!     → BodyShape (Value → typed body)
//!
//! typed reply body
//!     → serde_json::Value
//!     → registry.rs (pick encoder by negotiated content type)
//!     → bytes on the wire
//! ```
//!
//! # Design Decisions
//! - Registry is populated during setup, then shared read-only behind an Arc
//! - Content types are compared by essence (no parameters, lowercase)
//! - Raw byte and stream bodies bypass the registry entirely

pub mod json;
pub mod registry;

pub use registry::{Codec, CodecError, CodecRegistry, DecodeFn, EncodeFn};

/// Default body content type.
pub const APPLICATION_JSON: &str = "application/json";

/// Content type of HTML form submissions.
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Content type of multipart form submissions.
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";

/// Whether a request content type carries form fields.
pub fn is_form(content_type: &str) -> bool {
    matches!(essence(content_type).as_str(), FORM_URLENCODED | MULTIPART_FORM_DATA)
}

/// Reduce a content type to its essence.
///
/// `Application/JSON; charset=utf-8` becomes `application/json`.
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
