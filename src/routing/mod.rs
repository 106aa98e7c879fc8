//! Routing subsystem: the resource tree.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, raw path, headers, principal)
//!     → root.rs (peel first segment: .well-known or base path)
//!     → api.rs (demultiplex data / operations / yang-library-version /
//!               modules / streams / subscriptions)
//!     → leaf resource (parse remainder, negotiate, pick operation)
//!     → Return: CompletedRequest or PendingRequest
//! ```
//!
//! # Design Decisions
//! - Tree built once at startup, immutable at runtime
//! - Preparation is synchronous and never calls the backend
//! - Segments are decoded one at a time; leaf resources see the raw remainder
//! - Deterministic: same request always yields the same outcome

pub mod api;
pub mod api_path;
pub mod data;
pub mod modules;
pub mod operations;
pub mod peeler;
pub mod resource;
pub mod root;
pub mod streams;
pub mod well_known;
pub mod yang_library;

pub use api_path::{ApiPath, ApiPathError, Step};
pub use peeler::{NotAbsolute, SegmentPeeler};
pub use resource::{allow, PrepareContext, PRETTY_PRINT_PARAM};
pub use root::ResourceTree;
