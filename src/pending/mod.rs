//! Pending request lifecycle.
//!
//! # Data Flow
//! ```text
//! routing (prepare, synchronous)
//!     → PreparedRequest::Completed (404/405/406/415/400, OPTIONS, discovery)
//!     → PreparedRequest::Pending (bound Operation + ServerRequest)
//!           → execute(body): wrap body in TypedBody, call RestconfBackend
//!           → transform: result → status, headers, body
//!           → or ServerError → ErrorTagMapping → YANG-errors body
//! ```
//!
//! # Design Decisions
//! - `execute` takes `self`, so a prepared operation cannot run twice
//! - The request body is owned here and released right after the backend
//!   call returns
//! - Rendering failures are defects and answer a bare 500

pub mod errors;
pub mod invariants;
pub mod operation;
pub mod prepared;
pub mod transform;
pub mod xml;

pub use invariants::{EndpointInvariants, SseSettings};
pub use operation::{ModuleFormat, Operation, PendingRequest, StreamTarget};
pub use prepared::{CompletedRequest, PreparedRequest};
