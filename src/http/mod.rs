//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (hyper auto builder: HTTP/1.1 or HTTP/2)
//!     → tower-http layers (request id, trace span, timeout, body limit)
//!     → request.rs (principal extension, base URI)
//!     → server.rs dispatch → routing::ResourceTree::prepare
//!     → CompletedRequest, or PendingRequest::execute → backend
//!     → Send to client
//! ```

pub mod request;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{build_router, AppState, RestconfServer};
