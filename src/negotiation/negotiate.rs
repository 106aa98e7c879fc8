//! Resolution of Accept / Content-Type headers to a `MessageEncoding`.
//!
//! # Responsibilities
//! - Pick the output encoding from `Accept`
//! - Pick the input encoding from `Content-Type`
//! - Tell a plain merge PATCH (RFC 8040 §4.6.1) from a YANG Patch (RFC 8072)
//!
//! # Design Decisions
//! - Header order decides, `q` parameters are ignored
//! - `*/*` selects the endpoint default wherever it appears first
//! - All functions are pure: headers in, decision out

use axum::http::{
    header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING},
    HeaderMap,
};

use super::encoding::MessageEncoding;
use super::media_type::{self, essence, essences, ANY, TEXT_EVENT_STREAM};

/// No acceptable output encoding could be found (406).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("none of the acceptable media types is supported, supported types: {}", .supported.join(", "))]
pub struct NotAcceptable {
    pub supported: Vec<&'static str>,
}

/// The request body media type is missing or not supported (415).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported media type {}, supported types: {}", .found.as_deref().unwrap_or("<none>"), .supported.join(", "))]
pub struct UnsupportedMediaType {
    pub found: Option<String>,
    pub supported: &'static [&'static str],
}

/// Outcome of input encoding resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEncoding {
    /// The request carries no body at all.
    NoBody,
    /// The body is in a supported encoding.
    Resolved(MessageEncoding),
    /// A body is present but `Content-Type` is missing or unparseable.
    Unspecified,
    /// A body is present with a `Content-Type` that is not YANG data.
    Unrecognized(String),
}

/// Which PATCH flavour a request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchDialect {
    /// Plain merge patch, body is YANG data.
    Plain(MessageEncoding),
    /// YANG Patch edit list.
    YangPatch(MessageEncoding),
}

/// Resolve the output encoding from `Accept`.
///
/// An absent header yields `default`. Otherwise the first value in header
/// order that is either `*/*` (yielding `default`) or a data media type of
/// some encoding wins.
pub fn negotiate_output(
    headers: &HeaderMap,
    default: MessageEncoding,
) -> Result<MessageEncoding, NotAcceptable> {
    if !headers.contains_key(ACCEPT) {
        return Ok(default);
    }
    for value in essences(headers, ACCEPT) {
        if value == ANY {
            return Ok(default);
        }
        if let Some(encoding) = MessageEncoding::ALL
            .into_iter()
            .find(|encoding| encoding.is_data_media_type(&value))
        {
            return Ok(encoding);
        }
    }
    Err(NotAcceptable {
        supported: MessageEncoding::ALL
            .into_iter()
            .map(MessageEncoding::data_media_type)
            .collect(),
    })
}

/// Like [`negotiate_output`], but falls back to `fallback` instead of failing.
/// Used to pick the encoding of error bodies and of optional outputs.
pub fn negotiate_output_or(
    headers: &HeaderMap,
    default: MessageEncoding,
    fallback: MessageEncoding,
) -> MessageEncoding {
    negotiate_output(headers, default).unwrap_or(fallback)
}

/// Whether the request declares a body through `Content-Length` or
/// `Transfer-Encoding`.
pub fn body_present(headers: &HeaderMap) -> bool {
    if headers.contains_key(TRANSFER_ENCODING) {
        return true;
    }
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .is_some_and(|length| length > 0)
}

/// Resolve the input encoding from `Content-Type`.
///
/// `has_body` is the transport's view of whether a body follows; it is
/// combined with [`body_present`] so HTTP/2 requests without
/// `Content-Length` are still recognized.
pub fn negotiate_input(headers: &HeaderMap, has_body: bool) -> InputEncoding {
    if !has_body && !body_present(headers) {
        return InputEncoding::NoBody;
    }
    let Some(content_type) = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(essence)
    else {
        return InputEncoding::Unspecified;
    };
    MessageEncoding::ALL
        .into_iter()
        .find(|encoding| encoding.is_data_media_type(&content_type))
        .map_or(InputEncoding::Unrecognized(content_type), InputEncoding::Resolved)
}

/// Classify a PATCH request body by its `Content-Type`.
///
/// For each encoding the data media type is checked before the patch media
/// type; the first match wins.
pub fn resolve_patch(headers: &HeaderMap) -> Result<PatchDialect, UnsupportedMediaType> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(essence);
    if let Some(content_type) = &content_type {
        for encoding in MessageEncoding::ALL {
            if encoding.is_data_media_type(content_type) {
                return Ok(PatchDialect::Plain(encoding));
            }
            if encoding.is_patch_media_type(content_type) {
                return Ok(PatchDialect::YangPatch(encoding));
            }
        }
    }
    Err(UnsupportedMediaType {
        found: content_type,
        supported: media_type::PATCH_TYPES,
    })
}

/// Whether `Accept` explicitly asks for `text/event-stream`.
pub fn accepts_event_stream(headers: &HeaderMap) -> bool {
    essences(headers, ACCEPT).any(|value| value == TEXT_EVENT_STREAM)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_output_defaults_without_accept() {
        let map = HeaderMap::new();
        assert_eq!(negotiate_output(&map, MessageEncoding::Xml), Ok(MessageEncoding::Xml));
    }

    #[test]
    fn test_output_uses_header_order_not_quality() {
        let map = headers(&[(
            "accept",
            "application/yang-data+xml;q=0.1, application/yang-data+json;q=1.0",
        )]);
        assert_eq!(negotiate_output(&map, MessageEncoding::Json), Ok(MessageEncoding::Xml));
    }

    #[test]
    fn test_output_wildcard_selects_default() {
        let map = headers(&[("accept", "text/html, */*")]);
        assert_eq!(negotiate_output(&map, MessageEncoding::Xml), Ok(MessageEncoding::Xml));
    }

    #[test]
    fn test_output_ignores_subtype_wildcards() {
        // application/* is deliberately not honored
        let map = headers(&[("accept", "application/*")]);
        assert!(negotiate_output(&map, MessageEncoding::Json).is_err());
    }

    #[test]
    fn test_output_is_idempotent() {
        let map = headers(&[("accept", "text/plain"), ("accept", "application/xml")]);
        let first = negotiate_output(&map, MessageEncoding::Json);
        let second = negotiate_output(&map, MessageEncoding::Json);
        assert_eq!(first, second);
        assert_eq!(first, Ok(MessageEncoding::Xml));
    }

    #[test]
    fn test_output_not_acceptable_lists_types() {
        let map = headers(&[("accept", "text/plain")]);
        let err = negotiate_output(&map, MessageEncoding::Json).unwrap_err();
        assert_eq!(
            err.supported,
            vec!["application/yang-data+json", "application/yang-data+xml"]
        );
    }

    #[test]
    fn test_input_without_body() {
        let map = headers(&[("content-type", "text/plain")]);
        assert_eq!(negotiate_input(&map, false), InputEncoding::NoBody);
        let map = headers(&[("content-length", "0")]);
        assert_eq!(negotiate_input(&map, false), InputEncoding::NoBody);
    }

    #[test]
    fn test_input_with_body() {
        let map = headers(&[("content-length", "2")]);
        assert_eq!(negotiate_input(&map, false), InputEncoding::Unspecified);

        let map = headers(&[("content-length", "2"), ("content-type", "text/plain")]);
        assert_eq!(
            negotiate_input(&map, false),
            InputEncoding::Unrecognized("text/plain".to_string())
        );

        let map = headers(&[("content-type", "application/yang-data+xml; charset=utf-8")]);
        assert_eq!(
            negotiate_input(&map, true),
            InputEncoding::Resolved(MessageEncoding::Xml)
        );
    }

    #[test]
    fn test_patch_dialects() {
        let map = headers(&[("content-type", "application/yang-patch+json")]);
        assert_eq!(resolve_patch(&map), Ok(PatchDialect::YangPatch(MessageEncoding::Json)));

        let map = headers(&[("content-type", "text/xml")]);
        assert_eq!(resolve_patch(&map), Ok(PatchDialect::Plain(MessageEncoding::Xml)));

        let map = headers(&[("content-type", "application/merge-patch+json")]);
        let err = resolve_patch(&map).unwrap_err();
        assert!(err.supported.contains(&"application/json"));
        assert!(err.supported.contains(&"text/xml"));

        assert!(resolve_patch(&HeaderMap::new()).is_err());
    }

    #[test]
    fn test_event_stream_detection() {
        assert!(accepts_event_stream(&headers(&[("accept", "text/event-stream")])));
        assert!(!accepts_event_stream(&headers(&[("accept", "*/*")])));
        assert!(!accepts_event_stream(&HeaderMap::new()));
    }
}
