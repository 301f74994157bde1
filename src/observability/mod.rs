//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline stages produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (reply counters, latency histogram, fault counter)
//!     → trace.rs (per-request trace record with annotations)
//!
//! Consumers:
//!     → stdout via tracing-subscriber
//!     → Prometheus scrape endpoint
//!     → pluggable trace sink (defaults to a log event)
//! ```
//!
//! # Design Decisions
//! - Trace ids come from request headers so records join up across services
//! - Metric updates are cheap enough to run on every reply
//! - Nothing here can fail a request

pub mod logging;
pub mod metrics;
pub mod trace;

pub use trace::{Category, MessageTracer, NopTracer, TraceMessage, TraceSink, Tracer};
