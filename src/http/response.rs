//! Response envelope filled in by verb handlers.
//!
//! The status starts unset. A handler that returns without setting one
//! produces a 500, so forgetting to answer never looks like success.

use std::error::Error;
use std::fmt;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};

/// Reply payload.
pub enum ReplyBody<R> {
    Empty,
    /// Encoded with the negotiated content type.
    Value(R),
    /// Sent as is.
    Bytes(Bytes),
    /// Drained and sent as is.
    Stream(Body),
}

impl<R> ReplyBody<R> {
    pub fn is_empty(&self) -> bool {
        matches!(self, ReplyBody::Empty)
    }

    /// Byte and stream bodies skip the codecs.
    pub fn is_binary(&self) -> bool {
        matches!(self, ReplyBody::Bytes(_) | ReplyBody::Stream(_))
    }

    pub fn value(&self) -> Option<&R> {
        match self {
            ReplyBody::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl<R: fmt::Debug> fmt::Debug for ReplyBody<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyBody::Empty => f.write_str("Empty"),
            ReplyBody::Value(value) => f.debug_tuple("Value").field(value).finish(),
            ReplyBody::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            ReplyBody::Stream(_) => f.write_str("Stream"),
        }
    }
}

pub struct Response<R = ()> {
    pub(crate) status: Option<StatusCode>,
    pub(crate) message: String,
    pub(crate) headers: HeaderMap,
    pub(crate) content_type: Option<String>,
    pub(crate) body: ReplyBody<R>,
    pub(crate) error: Option<Box<dyn Error + Send + Sync>>,
}

impl<R> Default for Response<R> {
    fn default() -> Self {
        Self {
            status: None,
            message: String::new(),
            headers: HeaderMap::new(),
            content_type: None,
            body: ReplyBody::Empty,
            error: None,
        }
    }
}

impl<R: fmt::Debug> fmt::Debug for Response<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("message", &self.message)
            .field("content_type", &self.content_type)
            .field("body", &self.body)
            .field("error", &self.error.as_ref().map(|e| e.to_string()))
            .finish()
    }
}

impl<R> Response<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 200 "ok" with `body`.
    pub fn reply(&mut self, body: R) {
        self.status = Some(StatusCode::OK);
        self.message = "ok".to_string();
        self.body = ReplyBody::Value(body);
    }

    /// Set the status code and message. Codes outside 100..=999 become 500.
    pub fn set_status(&mut self, code: u16, message: impl Into<String>) {
        self.status = Some(StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR));
        self.message = message.into();
    }

    pub fn set_body(&mut self, body: R) {
        self.body = ReplyBody::Value(body);
    }

    pub fn set_bytes(&mut self, bytes: impl Into<Bytes>) {
        self.body = ReplyBody::Bytes(bytes.into());
    }

    pub fn set_stream(&mut self, stream: Body) {
        self.body = ReplyBody::Stream(stream);
    }

    /// Override content negotiation.
    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = Some(content_type.into());
    }

    /// Append a header to the reply.
    pub fn add_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.append(name, value);
    }

    /// Record an application error. It is traced and logged; the status is untouched.
    pub fn set_error(&mut self, error: impl Into<Box<dyn Error + Send + Sync>>) {
        self.error = Some(error.into());
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn body(&self) -> &ReplyBody<R> {
        &self.body
    }

    pub fn error(&self) -> Option<&(dyn Error + Send + Sync)> {
        self.error.as_deref()
    }
}
