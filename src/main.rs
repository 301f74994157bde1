//! Demo service built on endpoint-binder.
//!
//! Serves an in-memory widget API and a raw-bytes echo endpoint:
//!
//! ```text
//! GET    /widgets          list (query: color, limit)
//! POST   /widgets          create (JSON or urlencoded form)
//! GET    /widgets/{id}     fetch
//! PUT    /widgets/{id}     replace (JSON)
//! DELETE /widgets/{id}     remove
//! POST   /echo             raw bytes back
//! ```

mod widgets;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use endpoint_binder::config::{apply_overrides, load_config, ServiceConfig};
use endpoint_binder::observability::{logging, metrics};
use endpoint_binder::{AxumRouter, HttpServer, RootHandler};

use crate::widgets::WidgetStore;

#[derive(Parser)]
#[command(name = "endpoint-binder")]
#[command(about = "Demo widget service for endpoint-binder", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `server.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    let config = apply_overrides(config, cli.bind)?;

    logging::init_logging(&config.observability.log_level)?;
    tracing::info!("endpoint-binder v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.server.bind_address,
        resource_root = %config.binding.resource_root,
        request_timeout_secs = config.server.request_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let root = RootHandler::from_config(&config);
    let mut router = AxumRouter::new();
    widgets::bind_all(&root, &mut router, Arc::new(WidgetStore::new()))?;

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(router.into_router(), config);
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
