//! HTTP transport subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → router.rs (verb + template match, path variables)
//!     → RouteFn built by the pipeline
//!         → request.rs (raw request, decoded Request envelope)
//!         → handler
//!         → response.rs (Response envelope)
//!     → axum::response::Response to the client
//! ```

pub mod request;
pub mod response;
pub mod router;
pub mod server;

pub use request::{BodyError, RawRequest, Request, RequestContext};
pub use response::{ReplyBody, Response};
pub use router::{AxumRouter, RouteFn, SimpleRouter};
pub use server::HttpServer;
