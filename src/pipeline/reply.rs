//! Guaranteed reply.
//!
//! # Responsibilities
//! - Turn handler panics into a typed [`HandlerFault`]
//! - Write exactly one transport response per request, whatever happened
//! - Mark the trace completed or failed
//!
//! # Design Decisions
//! - The response is assembled field by field, so writing it cannot fail
//! - Handler headers are written on every reply, error replies included
//! - The panic site and stack are recorded by a chained panic hook, before
//!   unwinding discards the faulting frames
//! - Successful bodies are streamed in chunks so an abandoned write is noticed

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Once;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use futures_util::{FutureExt, Stream};

use crate::observability::metrics;
use crate::observability::trace::{Category, Tracer};
use crate::pipeline::error::{HANDLER_FAULT, NOT_COMPLETED};

/// Largest chunk handed to the transport at once.
const WRITE_CHUNK: usize = 64 * 1024;

/// A panic caught while serving a request.
#[derive(Debug, Clone)]
pub struct HandlerFault {
    pub message: String,
    /// `file:line:column` of the panic, when the hook saw it.
    pub location: Option<String>,
    pub stack: String,
}

/// What the panic hook recorded for the most recent panic on this thread.
struct PanicSite {
    message: String,
    location: Option<String>,
    stack: String,
}

thread_local! {
    static LAST_PANIC: RefCell<Option<PanicSite>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Chain a hook in front of the current panic hook that records the panic
/// site while the faulting frames are still on the stack.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let site = PanicSite {
                message: panic_message(info.payload()),
                location: info.location().map(|l| l.to_string()),
                stack: Backtrace::force_capture().to_string(),
            };
            // A panicking hook would abort the process.
            let _ = LAST_PANIC.try_with(|slot| {
                if let Ok(mut slot) = slot.try_borrow_mut() {
                    *slot = Some(site);
                }
            });
            previous(info);
        }));
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl HandlerFault {
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = panic_message(payload.as_ref());
        let site = LAST_PANIC
            .try_with(|slot| slot.try_borrow_mut().ok().and_then(|mut s| s.take()))
            .ok()
            .flatten()
            .filter(|site| site.message == message);
        match site {
            Some(site) => Self {
                message,
                location: site.location,
                stack: site.stack,
            },
            None => Self {
                message,
                location: None,
                stack: Backtrace::force_capture().to_string(),
            },
        }
    }
}

impl fmt::Display for HandlerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(location) = &self.location {
            write!(f, " at {location}")?;
        }
        Ok(())
    }
}

impl std::error::Error for HandlerFault {}

/// Run `fut`, converting a panic into a [`HandlerFault`].
pub async fn catch_fault<F: Future>(fut: F) -> Result<F::Output, HandlerFault> {
    install_panic_hook();
    AssertUnwindSafe(fut)
        .catch_unwind()
        .await
        .map_err(HandlerFault::from_panic)
}

/// Success body handed to the transport in chunks.
///
/// Dropped before every byte was taken means the client went away
/// mid-response; that is logged and never retried.
pub(crate) struct WrittenBody {
    body: Bytes,
    total: usize,
    sent: usize,
    resource: String,
}

impl WrittenBody {
    pub(crate) fn new(body: Bytes, resource: &str) -> Self {
        Self {
            total: body.len(),
            body,
            sent: 0,
            resource: resource.to_string(),
        }
    }

    /// `(bytes_sent, total_bytes)` while the write is unfinished.
    pub(crate) fn unfinished(&self) -> Option<(usize, usize)> {
        (self.sent < self.total).then_some((self.sent, self.total))
    }
}

impl Stream for WrittenBody {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.body.is_empty() {
            return Poll::Ready(None);
        }
        let chunk = this.body.split_to(this.body.len().min(WRITE_CHUNK));
        this.sent += chunk.len();
        Poll::Ready(Some(Ok(chunk)))
    }
}

impl Drop for WrittenBody {
    fn drop(&mut self) {
        if let Some((bytes_sent, total_bytes)) = self.unfinished() {
            tracing::warn!(
                resource = %self.resource,
                bytes_sent,
                total_bytes,
                "failed to write response"
            );
            metrics::record_partial_write(&self.resource);
        }
    }
}

/// What the pipeline stages decided to send.
#[derive(Debug, Default)]
pub struct ReplyOutcome {
    /// `None` until a handler or a failing stage sets it.
    pub status: Option<StatusCode>,
    pub message: String,
    pub body: Bytes,
    pub content_type: Option<String>,
    pub headers: HeaderMap,
    /// HEAD replies: the transport never reads the body.
    pub head_only: bool,
}

impl ReplyOutcome {
    pub fn fail(&mut self, err: &crate::pipeline::PipelineError) {
        self.status = Some(err.status());
        self.message = err.reply_message().to_string();
    }
}

/// Build the single transport response for a request.
pub fn guaranteed_reply(
    mut outcome: ReplyOutcome,
    fault: Option<&HandlerFault>,
    tracer: &dyn Tracer,
    resource: &str,
) -> axum::response::Response {
    if let Some(fault) = fault {
        outcome.status = Some(StatusCode::INTERNAL_SERVER_ERROR);
        outcome.message = HANDLER_FAULT.to_string();
        tracer.annotate(Category::Panic, "request fail", &fault.message);
        tracer.annotate(
            Category::Panic,
            "stack",
            &format!("{fault} callstack: {}", fault.stack),
        );
        tracing::error!(
            resource = %resource,
            panic = %fault.message,
            location = fault.location.as_deref().unwrap_or("unknown"),
            stack = %fault.stack,
            "Handler panicked"
        );
        metrics::record_fault(resource);
    }

    let status = match outcome.status {
        Some(status) => status,
        None => {
            tracing::error!(resource = %resource, "Request abandoned: no status was set");
            outcome.message = NOT_COMPLETED.to_string();
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let mut response = axum::response::Response::new(Body::empty());
    *response.status_mut() = status;
    let headers = response.headers_mut();
    for (name, value) in outcome.headers.iter() {
        headers.append(name.clone(), value.clone());
    }

    if status.is_success() {
        let content_type = outcome.content_type.as_deref().unwrap_or_default();
        if !content_type.is_empty() {
            if let Ok(value) = HeaderValue::from_str(content_type) {
                headers.insert(header::CONTENT_TYPE, value);
            }
        }
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(outcome.body.len()));
        if outcome.head_only {
            *response.body_mut() = Body::from(outcome.body);
        } else if !outcome.body.is_empty() {
            *response.body_mut() = Body::from_stream(WrittenBody::new(outcome.body, resource));
        }
        tracer.completed();
    } else {
        if outcome.message.is_empty() {
            outcome.message = status.canonical_reason().unwrap_or_default().to_string();
        }
        tracer.annotate(
            Category::Error,
            &format!("httpResponse: {}", status.as_u16()),
            &outcome.message,
        );
        let text = format!("{}\n", outcome.message);
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        headers.insert(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        );
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(text.len()));
        *response.body_mut() = Body::from(text);
        tracer.failed();
    }

    response
}
