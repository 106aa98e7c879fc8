//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use serde_json::json;
use tokio::net::TcpListener;

use restconf_server::config::RestconfConfig;
use restconf_server::http::build_router;
use restconf_server::lifecycle::Shutdown;
use restconf_server::net::Listener;
use restconf_server::{EndpointInvariants, MemoryBackend, RestconfServer, StreamRegistry};

/// Datastore content most tests start from. The memory backend keys list
/// entries by their canonical path step.
pub fn seed() -> serde_json::Value {
    json!({
        "example-jukebox:jukebox": {
            "library": {
                "artist=Foo%20Fighters": {
                    "name": "Foo Fighters",
                    "album=Wasting%20Light": { "name": "Wasting Light", "year": 2011 }
                }
            }
        }
    })
}

fn invariants(config: &RestconfConfig) -> (Arc<EndpointInvariants>, Arc<StreamRegistry>) {
    let registry = Arc::new(StreamRegistry::new());
    let backend = MemoryBackend::new()
        .with_notifications(registry.clone())
        .with_data(seed())
        .with_module("example-jukebox", Some("2016-08-15"), "module example-jukebox { }", None);
    let invariants = Arc::new(EndpointInvariants::from_config(
        config,
        Arc::new(backend),
        registry.clone(),
    ));
    (invariants, registry)
}

/// In-process router over a seeded memory backend.
pub fn router(config: &RestconfConfig) -> (Router, Arc<StreamRegistry>) {
    let (invariants, registry) = invariants(config);
    (build_router(config, invariants), registry)
}

/// A server on an ephemeral port; stopped when dropped.
pub struct TestServer {
    pub addr: SocketAddr,
    pub registry: Arc<StreamRegistry>,
    shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger graceful shutdown without waiting for it.
    pub fn stop(&self) {
        self.shutdown.trigger();
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_server(mut config: RestconfConfig) -> TestServer {
    config.listener.bind_address = "127.0.0.1:0".into();
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    let listener = Listener::from_tcp(tcp, config.listener.max_connections);

    let (invariants, registry) = invariants(&config);
    let server = RestconfServer::new(&config, invariants);
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestServer {
        addr,
        registry,
        shutdown,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
