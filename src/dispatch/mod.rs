//! Verb dispatch.
//!
//! # Data Flow
//! ```text
//! handler value
//!     → capability.rs (verb-tagged function table)
//!     → dispatch(handler, verb) (single function or BindError)
//!     → binder.rs (wraps the function, e.g. for auth)
//!     → pipeline
//! ```
//!
//! # Design Decisions
//! - Capabilities are resolved once, at bind time
//! - A missing capability is an error returned to the caller, never a runtime 404/405

pub mod binder;
pub mod capability;

use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use thiserror::Error;

use crate::http::request::Request;
use crate::http::response::Response;
use crate::resource::Verb;

pub use binder::{Anonymous, Binder};
pub use capability::{Capabilities, Capability, Handler};

/// A verb handler: takes the decoded request and a fresh response, returns the
/// response it filled in.
pub type HandlerFn<A, B, R> =
    Arc<dyn Fn(Request<A, B>, Response<R>) -> BoxFuture<'static, Response<R>> + Send + Sync>;

/// Box an async fn or closure as a [`HandlerFn`].
pub fn handler_fn<A, B, R, F, Fut>(f: F) -> HandlerFn<A, B, R>
where
    A: 'static,
    B: 'static,
    R: 'static,
    F: Fn(Request<A, B>, Response<R>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response<R>> + Send + 'static,
{
    Arc::new(move |req: Request<A, B>, res: Response<R>| f(req, res).boxed())
}

/// Errors raised while binding an endpoint.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("unknown verb {0:?}")]
    UnknownVerb(String),

    #[error("can't bind. method named {verb} is missing from type {handler}")]
    MissingCapability { verb: Verb, handler: &'static str },
}

/// Select the function `handler` registered for `verb`.
pub fn dispatch<A, B, R, H>(handler: &H, verb: Verb) -> Result<HandlerFn<A, B, R>, BindError>
where
    H: Handler<A, B, R> + ?Sized,
{
    handler
        .capabilities()
        .resolve(verb)
        .ok_or(BindError::MissingCapability {
            verb,
            handler: std::any::type_name::<H>(),
        })
}
