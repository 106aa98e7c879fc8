//! Request-side plumbing in front of dispatch.
//!
//! # Responsibilities
//! - Name the request id header and build per-request tracing spans
//! - Lift the trusted principal header into a request extension
//! - Derive the base URI used in `Location` headers
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The principal header is trusted as-is; authentication happens upstream

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::HOST;
use axum::http::request::Parts;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::Span;

use crate::backend::Principal;
use crate::net::TransportSession;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Request id assigned by the request-id layer, if any.
pub fn request_id(headers: &axum::http::HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
}

/// Span for one request, carrying the fields every log line inside it needs.
pub fn request_span(request: &axum::http::Request<Body>) -> Span {
    let connection = request
        .extensions()
        .get::<TransportSession>()
        .map(|session| session.id.to_string());
    tracing::info_span!(
        "request",
        request_id = %request_id(request.headers()),
        method = %request.method(),
        path = %request.uri().path(),
        connection = connection.as_deref().unwrap_or("-"),
    )
}

/// Middleware storing the value of the configured principal header as a
/// [`Principal`] extension. Empty or non-UTF-8 values are ignored.
pub async fn extract_principal(
    State(header): State<HeaderName>,
    mut request: Request,
    next: Next,
) -> Response {
    let principal = request
        .headers()
        .get(&header)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(|value| Principal(value.to_owned()));
    if let Some(principal) = principal {
        request.extensions_mut().insert(principal);
    } else {
        request.extensions_mut().remove::<Principal>();
    }
    next.run(request).await
}

/// `{scheme}://{authority}{base_path}/` for this request. The authority
/// comes from the request target (HTTP/2 `:authority`) or the `Host` header.
pub fn base_uri(parts: &Parts, base_path: &str) -> String {
    let scheme = parts
        .extensions
        .get::<TransportSession>()
        .map_or("http", TransportSession::scheme);
    let authority = parts
        .uri
        .authority()
        .map(|authority| authority.as_str())
        .or_else(|| parts.headers.get(HOST).and_then(|v: &HeaderValue| v.to_str().ok()))
        .unwrap_or("localhost");
    format!("{scheme}://{authority}{base_path}/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::ConnectionId;

    fn parts(uri: &str, host: Option<&'static str>, session: Option<TransportSession>) -> Parts {
        let mut builder = axum::http::Request::builder().uri(uri);
        if let Some(host) = host {
            builder = builder.header(HOST, host);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        if let Some(session) = session {
            parts.extensions.insert(session);
        }
        parts
    }

    #[test]
    fn test_base_uri_from_host_header() {
        let parts = parts("/restconf/data", Some("router.example:8181"), None);
        assert_eq!(base_uri(&parts, "/restconf"), "http://router.example:8181/restconf/");
    }

    #[test]
    fn test_base_uri_prefers_request_authority_and_tls() {
        let session = TransportSession {
            id: ConnectionId::new(),
            peer: "127.0.0.1:40000".parse().unwrap(),
            secure: true,
        };
        let parts = parts("https://h2.example/rests/data", Some("ignored"), Some(session));
        assert_eq!(base_uri(&parts, "/rests"), "https://h2.example/rests/");
    }

    #[test]
    fn test_request_id_fallback() {
        assert_eq!(request_id(&axum::http::HeaderMap::new()), "-");
    }
}
