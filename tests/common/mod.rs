//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, StatusCode};
use axum::Router;
use endpoint_binder::observability::trace::{TraceMessage, TraceSink};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower::ServiceExt;

/// Reply as seen by a client.
#[allow(dead_code)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[allow(dead_code)]
impl Reply {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Send one request through `app` in process.
#[allow(dead_code)]
pub async fn send(app: &Router, request: axum::http::Request<Body>) -> Reply {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    Reply { status, headers, body }
}

/// Trace sink that keeps every finalized record.
#[allow(dead_code)]
pub fn collecting_sink() -> (TraceSink, Arc<Mutex<Vec<TraceMessage>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);
    let sink: TraceSink = Arc::new(move |message: TraceMessage| {
        sink_seen.lock().unwrap().push(message);
    });
    (sink, seen)
}

/// Serve `app` on an ephemeral port until the returned sender fires.
#[allow(dead_code)]
pub async fn start_server(app: Router) -> (SocketAddr, oneshot::Sender<()>) {
    use endpoint_binder::{HttpServer, ServiceConfig};

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();

    let server = HttpServer::new(app, ServiceConfig::default());
    tokio::spawn(async move {
        let _ = server
            .run_until(listener, async move {
                let _ = rx.await;
            })
            .await;
    });

    (addr, tx)
}
