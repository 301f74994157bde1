//! Per-request trace records.
//!
//! # Responsibilities
//! - Pick trace/span ids from request headers, or mint fresh ones
//! - Collect annotations from every pipeline stage and from handlers
//! - Hand the finished record to a sink exactly once
//!
//! # Design Decisions
//! - The record lives behind a mutex shared by the pipeline and the handler's context
//! - Finalization happens in `Drop`, so cancelled requests still emit their record
//! - A panicking sink is contained and logged

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use axum::body::Bytes;
use axum::http::HeaderMap;
use serde::Serialize;
use uuid::Uuid;

/// Where an annotation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Info,
    Error,
    Panic,
    RequestData,
    ResponseData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceOutcome {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnnotationValue {
    Text {
        value: String,
    },
    Binary {
        content_type: String,
        len: usize,
        #[serde(skip)]
        data: Bytes,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub category: Category,
    pub key: String,
    #[serde(flatten)]
    pub value: AnnotationValue,
}

/// Everything recorded about one request.
#[derive(Debug, Clone, Serialize)]
pub struct TraceMessage {
    pub trace_id: String,
    pub span_id: String,
    pub name: String,
    pub args: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub outcome: TraceOutcome,
    pub elapsed_ms: Option<u128>,
    pub annotations: Vec<Annotation>,
    #[serde(skip)]
    started: Instant,
}

impl TraceMessage {
    pub fn new(trace_id: impl Into<String>, span_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            span_id: span_id.into(),
            name: String::new(),
            args: BTreeMap::new(),
            headers: BTreeMap::new(),
            outcome: TraceOutcome::Pending,
            elapsed_ms: None,
            annotations: Vec::new(),
            started: Instant::now(),
        }
    }

    /// First annotation recorded under `key`.
    pub fn annotation(&self, key: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.key == key)
    }

    fn finish(&mut self, outcome: TraceOutcome) {
        self.outcome = outcome;
        self.elapsed_ms = Some(self.started.elapsed().as_millis());
    }
}

/// Annotation sink exposed to handlers through the request context.
pub trait Tracer: Send + Sync {
    fn annotate(&self, category: Category, key: &str, value: &str);
    fn annotate_binary(&self, category: Category, key: &str, data: Bytes, content_type: &str);
    fn received(&self, name: &str, args: &HashMap<String, String>, headers: &HeaderMap);
    fn completed(&self);
    fn failed(&self);
}

/// Tracer that records nothing. Used by envelopes built without a transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopTracer;

impl Tracer for NopTracer {
    fn annotate(&self, _: Category, _: &str, _: &str) {}
    fn annotate_binary(&self, _: Category, _: &str, _: Bytes, _: &str) {}
    fn received(&self, _: &str, _: &HashMap<String, String>, _: &HeaderMap) {}
    fn completed(&self) {}
    fn failed(&self) {}
}

/// Tracer backed by a shared [`TraceMessage`].
#[derive(Clone)]
pub struct MessageTracer {
    message: Arc<Mutex<TraceMessage>>,
}

impl fmt::Debug for MessageTracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = self.lock();
        f.debug_struct("MessageTracer")
            .field("trace_id", &message.trace_id)
            .field("span_id", &message.span_id)
            .finish()
    }
}

impl MessageTracer {
    pub fn new(message: TraceMessage) -> Self {
        Self {
            message: Arc::new(Mutex::new(message)),
        }
    }

    /// Start a trace using the ids carried in `trace_header`/`span_header`.
    /// Missing or empty headers get a fresh UUID v4.
    pub fn from_headers(headers: &HeaderMap, trace_header: &str, span_header: &str) -> Self {
        let id = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| Uuid::new_v4().to_string())
        };
        Self::new(TraceMessage::new(id(trace_header), id(span_header)))
    }

    // A handler panic while holding the lock must not lose the record.
    fn lock(&self) -> MutexGuard<'_, TraceMessage> {
        self.message.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn trace_id(&self) -> String {
        self.lock().trace_id.clone()
    }

    pub fn span_id(&self) -> String {
        self.lock().span_id.clone()
    }

    pub fn snapshot(&self) -> TraceMessage {
        self.lock().clone()
    }

    fn push(&self, annotation: Annotation) {
        self.lock().annotations.push(annotation);
    }
}

impl Tracer for MessageTracer {
    fn annotate(&self, category: Category, key: &str, value: &str) {
        self.push(Annotation {
            category,
            key: key.to_string(),
            value: AnnotationValue::Text {
                value: value.to_string(),
            },
        });
    }

    fn annotate_binary(&self, category: Category, key: &str, data: Bytes, content_type: &str) {
        self.push(Annotation {
            category,
            key: key.to_string(),
            value: AnnotationValue::Binary {
                content_type: content_type.to_string(),
                len: data.len(),
                data,
            },
        });
    }

    fn received(&self, name: &str, args: &HashMap<String, String>, headers: &HeaderMap) {
        let mut flat: BTreeMap<String, String> = BTreeMap::new();
        for (key, value) in headers {
            let Ok(value) = value.to_str() else { continue };
            flat.entry(key.as_str().to_string())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }

        let mut message = self.lock();
        message.name = name.to_string();
        message.args = args.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        message.headers = flat;
    }

    fn completed(&self) {
        self.lock().finish(TraceOutcome::Completed);
    }

    fn failed(&self) {
        self.lock().finish(TraceOutcome::Failed);
    }
}

/// Receives finished trace records.
pub type TraceSink = Arc<dyn Fn(TraceMessage) + Send + Sync>;

/// Default sink: one structured log event per request.
pub fn log_sink() -> TraceSink {
    Arc::new(|message: TraceMessage| {
        tracing::info!(
            trace_id = %message.trace_id,
            span_id = %message.span_id,
            name = %message.name,
            outcome = ?message.outcome,
            elapsed_ms = message.elapsed_ms.unwrap_or_default() as u64,
            annotations = message.annotations.len(),
            "Request trace"
        );
        if tracing::enabled!(tracing::Level::DEBUG) {
            match serde_json::to_string(&message) {
                Ok(record) => tracing::debug!(trace = %record, "Request trace record"),
                Err(e) => tracing::warn!(error = %e, "Failed to serialize trace record"),
            }
        }
    })
}

/// Sends the trace record to the sink when dropped.
pub struct TraceFinalizer {
    tracer: MessageTracer,
    sink: TraceSink,
}

impl TraceFinalizer {
    pub fn new(tracer: MessageTracer, sink: TraceSink) -> Self {
        Self { tracer, sink }
    }
}

impl Drop for TraceFinalizer {
    fn drop(&mut self) {
        let mut message = self.tracer.snapshot();
        if message.outcome == TraceOutcome::Pending {
            message.finish(TraceOutcome::Failed);
        }
        let sink = &self.sink;
        if std::panic::catch_unwind(AssertUnwindSafe(|| sink(message))).is_err() {
            tracing::error!("Trace sink panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn collecting_sink() -> (TraceSink, Arc<Mutex<Vec<TraceMessage>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let sink: TraceSink = Arc::new(move |m: TraceMessage| sink_seen.lock().unwrap().push(m));
        (sink, seen)
    }

    #[test]
    fn test_ids_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("tr-trace", HeaderValue::from_static("trace-1"));
        headers.insert("tr-span", HeaderValue::from_static("span-1"));

        let tracer = MessageTracer::from_headers(&headers, "tr-trace", "tr-span");
        assert_eq!(tracer.trace_id(), "trace-1");
        assert_eq!(tracer.span_id(), "span-1");
    }

    #[test]
    fn test_ids_generated_when_missing() {
        let tracer = MessageTracer::from_headers(&HeaderMap::new(), "tr-trace", "tr-span");
        assert!(Uuid::parse_str(&tracer.trace_id()).is_ok());
        assert!(Uuid::parse_str(&tracer.span_id()).is_ok());
        assert_ne!(tracer.trace_id(), tracer.span_id());
    }

    #[test]
    fn test_received_and_annotations() {
        let tracer = MessageTracer::new(TraceMessage::new("t", "s"));
        let mut headers = HeaderMap::new();
        headers.append("accept", HeaderValue::from_static("text/plain"));
        headers.append("accept", HeaderValue::from_static("application/json"));

        let args = HashMap::from([("id".to_string(), "7".to_string())]);
        tracer.received("GET - /widgets/{id}", &args, &headers);
        tracer.annotate(Category::Error, "httpResponse: 404", "not here");
        tracer.annotate_binary(Category::ResponseData, "body", Bytes::from_static(b"abc"), "image/png");
        tracer.completed();

        let message = tracer.snapshot();
        assert_eq!(message.name, "GET - /widgets/{id}");
        assert_eq!(message.args["id"], "7");
        assert_eq!(message.headers["accept"], "text/plain, application/json");
        assert_eq!(message.outcome, TraceOutcome::Completed);
        assert!(message.elapsed_ms.is_some());

        let body = message.annotation("body").unwrap();
        assert!(matches!(body.value, AnnotationValue::Binary { len: 3, .. }));

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["annotations"][0]["kind"], "text");
        assert_eq!(json["annotations"][1]["content_type"], "image/png");
        assert!(json["annotations"][1].get("data").is_none());
    }

    #[test]
    fn test_finalizer_runs_once_on_drop() {
        let (sink, seen) = collecting_sink();
        let tracer = MessageTracer::new(TraceMessage::new("t", "s"));
        {
            let _guard = TraceFinalizer::new(tracer.clone(), sink);
            tracer.completed();
        }
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].outcome, TraceOutcome::Completed);
    }

    #[test]
    fn test_finalizer_marks_abandoned_trace_failed() {
        let (sink, seen) = collecting_sink();
        drop(TraceFinalizer::new(MessageTracer::new(TraceMessage::new("t", "s")), sink));
        assert_eq!(seen.lock().unwrap()[0].outcome, TraceOutcome::Failed);
    }

    #[test]
    fn test_panicking_sink_is_contained() {
        let sink: TraceSink = Arc::new(|_: TraceMessage| panic!("sink down"));
        drop(TraceFinalizer::new(MessageTracer::new(TraceMessage::new("t", "s")), sink));
    }
}
