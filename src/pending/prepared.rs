//! Outcome of routing a request.

use axum::http::header::ALLOW;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use super::operation::PendingRequest;
use super::transform;

/// Either a final response or an operation bound for execution.
pub enum PreparedRequest {
    Completed(CompletedRequest),
    Pending(PendingRequest),
}

impl From<CompletedRequest> for PreparedRequest {
    fn from(completed: CompletedRequest) -> Self {
        Self::Completed(completed)
    }
}

impl From<PendingRequest> for PreparedRequest {
    fn from(pending: PendingRequest) -> Self {
        Self::Pending(pending)
    }
}

impl std::fmt::Debug for PreparedRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed(completed) => f.debug_tuple("Completed").field(&completed.status()).finish(),
            Self::Pending(pending) => f.debug_tuple("Pending").field(pending.operation()).finish(),
        }
    }
}

/// A response decided without touching the backend.
pub struct CompletedRequest(Response);

impl CompletedRequest {
    pub fn new(response: Response) -> Self {
        Self(response)
    }

    pub fn status(&self) -> StatusCode {
        self.0.status()
    }

    pub fn response(&self) -> &Response {
        &self.0
    }

    /// Unknown resource; no body.
    pub fn not_found() -> Self {
        Self(StatusCode::NOT_FOUND.into_response())
    }

    /// Method not supported by the resource; no body.
    pub fn method_not_allowed(allow: &'static str) -> Self {
        Self(
            (
                StatusCode::METHOD_NOT_ALLOWED,
                transform::header(ALLOW, allow),
            )
                .into_response(),
        )
    }

    pub fn options(allow: &'static str, accept_patch: bool) -> Self {
        Self(transform::options(allow, accept_patch))
    }
}

impl From<Response> for CompletedRequest {
    fn from(response: Response) -> Self {
        Self(response)
    }
}

impl IntoResponse for CompletedRequest {
    fn into_response(self) -> Response {
        self.0
    }
}
