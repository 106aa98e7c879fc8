//! Media type constants and header value parsing.

use axum::http::{header::HeaderName, HeaderMap};

pub const YANG_DATA_JSON: &str = "application/yang-data+json";
pub const YANG_DATA_XML: &str = "application/yang-data+xml";
pub const YANG_PATCH_JSON: &str = "application/yang-patch+json";
pub const YANG_PATCH_XML: &str = "application/yang-patch+xml";
pub const APPLICATION_YANG: &str = "application/yang";
pub const APPLICATION_YIN_XML: &str = "application/yin+xml";
pub const APPLICATION_JSON: &str = "application/json";
pub const APPLICATION_XML: &str = "application/xml";
pub const TEXT_XML: &str = "text/xml";
pub const TEXT_EVENT_STREAM: &str = "text/event-stream";
pub const APPLICATION_XRD_XML: &str = "application/xrd+xml";
pub const ANY: &str = "*/*";

/// RFC 5789 `Accept-Patch`; not among the `http` crate's named headers.
pub const ACCEPT_PATCH: HeaderName = HeaderName::from_static("accept-patch");

/// Media types accepted for PATCH bodies, in the order they are advertised.
///
/// The bare JSON/XML types are listed for backward compatibility even though
/// RFC 8072 errata 3169 says they should not be.
pub const PATCH_TYPES: &[&str] = &[
    YANG_DATA_JSON,
    YANG_DATA_XML,
    YANG_PATCH_JSON,
    YANG_PATCH_XML,
    APPLICATION_JSON,
    APPLICATION_XML,
    TEXT_XML,
];

/// Media types accepted for POST/PUT bodies and produced for data.
pub const ACCEPT_DATA: &[&str] = &[
    YANG_DATA_JSON,
    YANG_DATA_XML,
    APPLICATION_JSON,
    APPLICATION_XML,
    TEXT_XML,
];

/// Extract the lowercase `type/subtype` essence of a single media type value,
/// dropping parameters. Returns `None` for values without a `/`.
pub fn essence(value: &str) -> Option<String> {
    let essence = value.split(';').next()?.trim();
    let (kind, subtype) = essence.split_once('/')?;
    if kind.is_empty() || subtype.is_empty() {
        return None;
    }
    Some(essence.to_ascii_lowercase())
}

/// Iterate the essences of every comma-separated value across all occurrences
/// of `name`, in header order. Values that are not valid UTF-8 or not media
/// types are skipped.
pub fn essences(headers: &HeaderMap, name: HeaderName) -> impl Iterator<Item = String> + '_ {
    headers
        .get_all(name)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(essence)
}

/// Join media types for `Accept` / `Accept-Patch` response headers.
pub fn join(types: &[&str]) -> String {
    types.join(", ")
}
