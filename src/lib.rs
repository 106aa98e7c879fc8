//! RESTCONF (RFC 8040) protocol server library.

pub mod backend;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod negotiation;
pub mod net;
pub mod observability;
pub mod pending;
pub mod routing;
pub mod streams;

pub use backend::{MemoryBackend, RestconfBackend};
pub use config::RestconfConfig;
pub use http::RestconfServer;
pub use lifecycle::Shutdown;
pub use pending::EndpointInvariants;
pub use streams::StreamRegistry;
