//! RESTCONF protocol server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ───────────────▶ net::listener ──▶ http::server ──▶ routing::ResourceTree
//!                      (limits, TLS)     (HTTP/1.1, 2)    (peel segments, negotiate)
//!                                                               │
//!                                          ┌────────────────────┴─────────────┐
//!                                          ▼                                  ▼
//!                                   CompletedRequest                   PendingRequest
//!                                   (404/405/406/415,                  (bound operation)
//!                                    OPTIONS, discovery)                      │
//!                                          │                                  ▼
//!     Client Response                      │                         backend::RestconfBackend
//!     ◀────────────────────────────────────┴──────── pending::transform ◀─────┘
//!
//!     streams::StreamRegistry ──▶ RestconfStream ──▶ Sender ──▶ SseBody (text/event-stream)
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

use restconf_server::config::{load_config, RestconfConfig};
use restconf_server::lifecycle::{wait_for_signal, Shutdown};
use restconf_server::net::{tls, Listener};
use restconf_server::observability::{logging, metrics};
use restconf_server::{EndpointInvariants, MemoryBackend, RestconfServer, StreamRegistry};

#[derive(Parser)]
#[command(name = "restconf-server")]
#[command(about = "RESTCONF server over an in-memory datastore", long_about = None)]
struct Args {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => RestconfConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!("restconf-server v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        base_path = %config.endpoint.base_path,
        default_encoding = %config.endpoint.default_encoding,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let registry = Arc::new(StreamRegistry::new());
    let backend = MemoryBackend::new().with_notifications(registry.clone());
    let invariants = Arc::new(EndpointInvariants::from_config(
        &config,
        Arc::new(backend),
        registry,
    ));

    let listener = Listener::bind(&config.listener).await?;
    let mut server = RestconfServer::new(&config, invariants);
    if let Some(tls_config) = &config.listener.tls {
        let rustls = tls::load_tls_config(
            Path::new(&tls_config.cert_path),
            Path::new(&tls_config.key_path),
        )
        .await?;
        server = server.with_tls(rustls);
    }

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.trigger();
    });

    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
