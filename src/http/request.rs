//! Request envelope.
//!
//! # Responsibilities
//! - Hold the transport request head and a lazily read, memoized body
//! - Carry decoded arguments and body to the handler
//! - Expose the trace and a namespaced value bag through `RequestContext`
//!
//! # Design Decisions
//! - The body is read at most once; later reads return the cached bytes
//! - Reads are capped by the configured body limit
//! - Envelopes can be built without a transport for handler unit tests

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{header, request::Parts, HeaderMap, Method, Uri};
use thiserror::Error;

use crate::observability::trace::{Category, NopTracer, Tracer};

/// Default cap on request body size (2 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum BodyError {
    #[error("request body was already consumed")]
    Consumed,

    #[error("failed to read request body: {0}")]
    Read(#[source] axum::Error),
}

/// The transport request as received, plus the router's path variables.
pub struct RawRequest {
    parts: Parts,
    body: Option<Body>,
    bytes: Option<Bytes>,
    path_vars: HashMap<String, String>,
    body_limit: usize,
}

impl fmt::Debug for RawRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawRequest")
            .field("method", &self.parts.method)
            .field("uri", &self.parts.uri)
            .field("path_vars", &self.path_vars)
            .field("body_read", &self.bytes.is_some())
            .finish()
    }
}

impl RawRequest {
    pub fn new(request: axum::http::Request<Body>) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            parts,
            body: Some(body),
            bytes: None,
            path_vars: HashMap::new(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    pub fn with_path_vars(mut self, path_vars: HashMap<String, String>) -> Self {
        self.path_vars = path_vars;
        self
    }

    pub fn set_body_limit(&mut self, limit: usize) {
        self.body_limit = limit;
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn path_vars(&self) -> &HashMap<String, String> {
        &self.path_vars
    }

    pub fn query(&self) -> Option<&str> {
        self.parts.uri.query()
    }

    /// Every `Content-Type` value on the request, in order.
    pub fn content_types(&self) -> Vec<String> {
        header_values(&self.parts.headers, header::CONTENT_TYPE.as_str())
    }

    /// Read the whole body, once.
    pub async fn bytes(&mut self) -> Result<Bytes, BodyError> {
        if let Some(bytes) = &self.bytes {
            return Ok(bytes.clone());
        }
        let body = self.body.take().ok_or(BodyError::Consumed)?;
        let bytes = axum::body::to_bytes(body, self.body_limit)
            .await
            .map_err(BodyError::Read)?;
        self.bytes = Some(bytes.clone());
        Ok(bytes)
    }
}

fn header_values(headers: &HeaderMap, name: &str) -> Vec<String> {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// Per-request state shared with binders and handlers.
pub struct RequestContext {
    pub trace: Arc<dyn Tracer>,
    values: HashMap<(String, String), Box<dyn Any + Send + Sync>>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new(Arc::new(NopTracer))
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("values", &self.values.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl RequestContext {
    pub fn new(trace: Arc<dyn Tracer>) -> Self {
        Self {
            trace,
            values: HashMap::new(),
        }
    }

    /// Store `value` under `namespace`/`key`, replacing any previous value.
    pub fn add<T: Any + Send + Sync>(&mut self, namespace: &str, key: &str, value: T) {
        self.values
            .insert((namespace.to_string(), key.to_string()), Box::new(value));
    }

    /// Value under `namespace`/`key`, if present and of type `T`.
    pub fn get<T: Any>(&self, namespace: &str, key: &str) -> Option<&T> {
        self.values
            .get(&(namespace.to_string(), key.to_string()))
            .and_then(|v| v.downcast_ref::<T>())
    }

    /// Take the value out. A value of another type stays in place.
    pub fn remove<T: Any>(&mut self, namespace: &str, key: &str) -> Option<T> {
        let slot = (namespace.to_string(), key.to_string());
        if !self.values.get(&slot)?.is::<T>() {
            return None;
        }
        self.values
            .remove(&slot)
            .and_then(|v| v.downcast::<T>().ok())
            .map(|v| *v)
    }
}

/// Decoded request handed to a verb handler.
///
/// `A` is the bound argument shape, `B` the decoded body.
pub struct Request<A = (), B = ()> {
    pub args: A,
    pub body: Option<B>,
    pub context: RequestContext,
    resource: String,
    raw: Option<RawRequest>,
}

impl<A: fmt::Debug, B: fmt::Debug> fmt::Debug for Request<A, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("resource", &self.resource)
            .field("args", &self.args)
            .field("body", &self.body)
            .field("raw", &self.raw)
            .finish()
    }
}

impl<A, B> Request<A, B> {
    /// Build a request without a transport, e.g. to unit test a handler.
    pub fn local(args: A, body: Option<B>) -> Self {
        Self {
            args,
            body,
            context: RequestContext::default(),
            resource: "local".to_string(),
            raw: None,
        }
    }

    pub(crate) fn bound(
        args: A,
        body: Option<B>,
        context: RequestContext,
        resource: String,
        raw: RawRequest,
    ) -> Self {
        Self {
            args,
            body,
            context,
            resource,
            raw: Some(raw),
        }
    }

    /// Name of the endpoint serving this request, e.g. `GET - /widgets/{id}`.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn raw(&self) -> Option<&RawRequest> {
        self.raw.as_ref()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.raw
            .as_ref()?
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
    }

    /// Raw body bytes. Empty for local requests.
    pub async fn bytes(&mut self) -> Result<Bytes, BodyError> {
        match self.raw.as_mut() {
            Some(raw) => raw.bytes().await,
            None => Ok(Bytes::new()),
        }
    }

    pub fn annotate(&self, category: Category, key: &str, value: &str) {
        self.context.trace.annotate(category, key, value);
    }
}
