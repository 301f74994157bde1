//! Metrics collection and exposition.
//!
//! # Metrics
//! - `binder_replies_total` (counter): replies by verb, resource, status
//! - `binder_request_duration_seconds` (histogram): latency by verb, resource
//! - `binder_handler_faults_total` (counter): handler panics by resource
//! - `binder_partial_writes_total` (counter): replies abandoned mid-write by resource

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape listener. Must run inside a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one finished reply.
pub fn record_reply(verb: &str, resource: &str, status: u16, start: Instant) {
    metrics::counter!(
        "binder_replies_total",
        "verb" => verb.to_string(),
        "resource" => resource.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "binder_request_duration_seconds",
        "verb" => verb.to_string(),
        "resource" => resource.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_fault(resource: &str) {
    metrics::counter!("binder_handler_faults_total", "resource" => resource.to_string()).increment(1);
}

pub fn record_partial_write(resource: &str) {
    metrics::counter!("binder_partial_writes_total", "resource" => resource.to_string()).increment(1);
}
