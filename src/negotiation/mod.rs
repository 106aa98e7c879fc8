//! Content negotiation subsystem.
//!
//! # Data Flow
//! ```text
//! Request headers (Accept, Content-Type, Content-Length, Transfer-Encoding)
//!     → media_type.rs (split header values, extract MIME essence)
//!     → negotiate.rs (output encoding, input encoding, PATCH dialect)
//!     → MessageEncoding bound into the pending request
//! ```
//!
//! # Design Decisions
//! - Accept values are scanned in header order; quality values are not honored
//! - Wildcard subtypes (`application/*`) are not honored; only `*/*` is
//! - Legacy `application/json`, `application/xml` and `text/xml` are accepted
//!   wherever a YANG data media type is

pub mod encoding;
pub mod media_type;
pub mod negotiate;

pub use encoding::MessageEncoding;
pub use negotiate::{
    accepts_event_stream, body_present, negotiate_input, negotiate_output,
    negotiate_output_or, resolve_patch, InputEncoding, NotAcceptable, PatchDialect,
    UnsupportedMediaType,
};
