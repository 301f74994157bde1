//! Declarative HTTP endpoint binding.
//!
//! Describe an endpoint with a [`ResourceDef`], give it a [`Handler`] that
//! serves the definition's verb, and [`RootHandler::bind`] mounts a route that
//! decodes arguments and body, runs the handler, negotiates the reply content
//! type and always answers, even when the handler panics.

pub mod codec;
pub mod config;
pub mod dispatch;
pub mod http;
pub mod observability;
pub mod pipeline;
pub mod resource;

pub use codec::{CodecError, CodecRegistry};
pub use config::ServiceConfig;
pub use dispatch::{handler_fn, Anonymous, BindError, Binder, Capabilities, Capability, Handler, HandlerFn};
pub use http::{AxumRouter, HttpServer, ReplyBody, Request, Response, SimpleRouter};
pub use observability::{Category, Tracer};
pub use pipeline::{Binding, RootHandler};
pub use resource::{Args, Field, ResourceDef, Verb};
