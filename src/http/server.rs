//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the dispatch handler
//! - Serve HTTP/1.1 and HTTP/2 on every accepted connection
//! - Wire up middleware (tracing, limits, request ID, principal)
//! - Hand each request to the resource tree and run what it binds
//! - Drain connections on shutdown

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::HttpBody;
use axum::extract::{Request, State};
use axum::http::HeaderName;
use axum::response::{IntoResponse, Response};
use axum::{middleware, Router};
use axum_server::accept::Accept;
use axum_server::tls_rustls::{RustlsAcceptor, RustlsConfig};
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast;
use tower::ServiceExt;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::backend::{Principal, QueryParameters};
use crate::config::RestconfConfig;
use crate::http::request::{self, X_REQUEST_ID};
use crate::lifecycle::Shutdown;
use crate::net::{tls, ConnectionTracker, Listener, ListenerError, TransportSession};
use crate::observability::metrics;
use crate::pending::{EndpointInvariants, PreparedRequest};
use crate::routing::{PrepareContext, ResourceTree};

/// How long open connections get to finish after shutdown is triggered.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Application state injected into the dispatch handler.
#[derive(Clone)]
pub struct AppState {
    pub tree: Arc<ResourceTree>,
    pub invariants: Arc<EndpointInvariants>,
}

/// The RESTCONF HTTP server.
pub struct RestconfServer {
    router: Router,
    invariants: Arc<EndpointInvariants>,
    tls: Option<RustlsConfig>,
    tracker: ConnectionTracker,
}

impl RestconfServer {
    /// Create a new server over validated configuration.
    pub fn new(config: &RestconfConfig, invariants: Arc<EndpointInvariants>) -> Self {
        let router = build_router(config, invariants.clone());
        Self {
            router,
            invariants,
            tls: None,
            tracker: ConnectionTracker::new(),
        }
    }

    /// Terminate TLS on every accepted connection.
    pub fn with_tls(mut self, tls: RustlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Accept connections until `shutdown` fires, then drain.
    pub async fn run(self, listener: Listener, shutdown: Shutdown) -> Result<(), ListenerError> {
        let mut stop = shutdown.subscribe();
        let acceptor = self.tls.clone().map(tls::acceptor);
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(
                address = %addr,
                tls = acceptor.is_some(),
                base_path = %self.invariants.base_path,
                "RESTCONF server starting"
            );
        }

        loop {
            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                _ = stop.recv() => break,
            };
            let (stream, peer, permit) = match accepted {
                Ok(accepted) => accepted,
                Err(ListenerError::Accept(e)) => {
                    tracing::warn!(error = %e, "Accept failed");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let guard = self.tracker.track();
            let session = TransportSession {
                id: guard.id(),
                peer,
                secure: acceptor.is_some(),
            };
            let router = self.router.clone();
            let acceptor = acceptor.clone();
            let stop = shutdown.subscribe();
            tokio::spawn(async move {
                let _permit = permit;
                let _guard = guard;
                match acceptor {
                    Some(acceptor) => match handshake(&acceptor, stream).await {
                        Ok(stream) => serve_connection(stream, router, session, stop).await,
                        Err(e) => tracing::debug!(
                            connection = %session.id,
                            peer = %session.peer,
                            error = %e,
                            "TLS handshake failed"
                        ),
                    },
                    None => serve_connection(stream, router, session, stop).await,
                }
            });
        }

        tracing::info!(
            active_connections = self.tracker.active_count(),
            "Stopped accepting, draining connections"
        );
        self.invariants.registry.end_streams();
        if !self.tracker.wait_idle(DRAIN_TIMEOUT).await {
            tracing::warn!(
                active_connections = self.tracker.active_count(),
                "Drain timed out"
            );
        }
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn handshake(
    acceptor: &RustlsAcceptor,
    stream: tokio::net::TcpStream,
) -> std::io::Result<impl AsyncRead + AsyncWrite + Unpin + Send + 'static> {
    let (stream, ()) = acceptor.accept(stream, ()).await?;
    Ok(stream)
}

/// Serve one connection (HTTP/1.1 or HTTP/2) until it closes or shutdown
/// asks it to finish in-flight requests.
async fn serve_connection<I>(
    io: I,
    router: Router,
    session: TransportSession,
    mut stop: broadcast::Receiver<()>,
) where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let id = session.id;
    let service = hyper::service::service_fn(move |mut request: axum::http::Request<Incoming>| {
        request.extensions_mut().insert(session);
        router.clone().oneshot(request)
    });

    let builder = auto::Builder::new(TokioExecutor::new());
    let connection = builder.serve_connection(TokioIo::new(io), service);
    tokio::pin!(connection);

    let result = tokio::select! {
        result = connection.as_mut() => result,
        _ = stop.recv() => {
            connection.as_mut().graceful_shutdown();
            connection.await
        }
    };
    if let Err(e) = result {
        tracing::debug!(connection = %id, error = %e, "Connection ended with error");
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(config: &RestconfConfig, invariants: Arc<EndpointInvariants>) -> Router {
    let state = AppState {
        tree: Arc::new(ResourceTree::new(&invariants)),
        invariants,
    };
    // Validated at load time; fall back to the default for unvalidated input.
    let principal_header = HeaderName::try_from(config.endpoint.principal_header.as_str())
        .unwrap_or_else(|_| HeaderName::from_static("x-remote-user"));

    Router::new()
        .fallback(dispatch)
        .with_state(state)
        .layer(middleware::from_fn_with_state(
            principal_header,
            request::extract_principal,
        ))
        .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
        .layer(TraceLayer::new_for_http().make_span_with(request::request_span))
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
}

/// Prepare the request against the resource tree, then either return the
/// finished response or execute the bound operation.
async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let start_time = Instant::now();
    let (parts, body) = request.into_parts();
    let method_str = parts.method.to_string();

    let ctx = PrepareContext {
        method: &parts.method,
        headers: &parts.headers,
        query: QueryParameters::parse(parts.uri.query()),
        principal: parts.extensions.get::<Principal>().cloned(),
        has_body: !body.is_end_stream(),
        base_uri: request::base_uri(&parts, &state.invariants.base_path),
        invariants: &state.invariants,
    };

    let response = match state.tree.prepare(&ctx, parts.uri.path()) {
        PreparedRequest::Completed(completed) => {
            tracing::debug!(status = %completed.status(), "Request completed during routing");
            completed.into_response()
        }
        PreparedRequest::Pending(pending) => {
            tracing::debug!(operation = pending.operation().name(), "Executing operation");
            pending.execute(body).await
        }
    };

    metrics::record_request(&method_str, response.status().as_u16(), start_time);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::streams::StreamRegistry;
    use axum::body::Body;
    use axum::http::StatusCode;

    fn router() -> Router {
        let config = RestconfConfig::default();
        let invariants = Arc::new(EndpointInvariants::from_config(
            &config,
            Arc::new(MemoryBackend::new()),
            Arc::new(StreamRegistry::new()),
        ));
        build_router(&config, invariants)
    }

    #[tokio::test]
    async fn test_request_id_is_assigned() {
        let response = router()
            .oneshot(
                axum::http::Request::get("/restconf/data")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(X_REQUEST_ID));
    }

    #[tokio::test]
    async fn test_unknown_root_is_not_found() {
        let response = router()
            .oneshot(axum::http::Request::get("/other").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
