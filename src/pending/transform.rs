//! Typed results to HTTP responses.

use axum::body::Body;
use axum::http::header::{
    ALLOW, CACHE_CONTROL, CONTENT_TYPE, ETAG, LAST_MODIFIED, LOCATION,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::backend::{
    ConfigurationMetadata, ErrorTagMapping, FormattableBody, InvokeResult, OptionsResult,
    PatchStatus, PrettyPrint, ServerError, YangError,
};
use crate::negotiation::{media_type, MessageEncoding};
use crate::routing::allow;

use super::errors::{format_errors, format_patch_status};

/// A local failure that is a defect, not a client error. Deliberately
/// carries no body.
pub fn internal_error(context: &str, error: &dyn std::fmt::Display) -> Response {
    tracing::error!(context, error = %error, "Failed to assemble response");
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

fn header_value(value: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(value).ok()
}

pub fn apply_metadata(headers: &mut HeaderMap, metadata: &ConfigurationMetadata) {
    if let Some(tag) = metadata.entity_tag.as_ref().and_then(|tag| tag.header_value()) {
        headers.insert(ETAG, tag);
    }
    if let Some(value) = metadata
        .last_modified
        .and_then(|time| header_value(&time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()))
    {
        headers.insert(LAST_MODIFIED, value);
    }
}

/// Response with a body rendered by `write`, or a bare 500 if rendering
/// fails.
fn rendered<E: std::fmt::Display>(
    status: StatusCode,
    mut headers: HeaderMap,
    content_type: &'static str,
    with_content: bool,
    write: impl FnOnce(&mut Vec<u8>) -> Result<(), E>,
) -> Response {
    let mut out = Vec::new();
    if let Err(error) = write(&mut out) {
        return internal_error("body", &error);
    }
    if !with_content {
        return (status, headers).into_response();
    }
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    (status, headers, Body::from(out)).into_response()
}

/// YANG-errors response with an explicit status.
pub fn errors_response(
    status: StatusCode,
    errors: &[YangError],
    encoding: MessageEncoding,
    pretty: PrettyPrint,
    extra: HeaderMap,
) -> Response {
    rendered(status, extra, encoding.data_media_type(), true, |out| {
        format_errors(errors, encoding, pretty, out)
    })
}

/// Backend failure: status from the first error's tag.
pub fn server_error(
    error: &ServerError,
    mapping: &ErrorTagMapping,
    encoding: MessageEncoding,
    pretty: PrettyPrint,
    with_content: bool,
) -> Response {
    let status = mapping.status_of_error(error);
    tracing::debug!(status = %status, error = %error, "Backend request failed");
    rendered(status, HeaderMap::new(), encoding.data_media_type(), with_content, |out| {
        format_errors(error.errors(), encoding, pretty, out)
    })
}

/// GET/HEAD of a data-like resource. HEAD keeps `Cache-Control` and the
/// metadata but drops the body and `Content-Type`.
pub fn read(
    body: &dyn FormattableBody,
    metadata: Option<&ConfigurationMetadata>,
    encoding: MessageEncoding,
    pretty: PrettyPrint,
    with_content: bool,
) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    if let Some(metadata) = metadata {
        apply_metadata(&mut headers, metadata);
    }
    rendered(StatusCode::OK, headers, encoding.data_media_type(), with_content, |out| {
        body.format(encoding, pretty, out)
    })
}

/// 201 with `Location` = base URI + `data/` + created path.
pub fn created(base_uri: &str, created_path: &str, metadata: &ConfigurationMetadata) -> Response {
    let mut headers = HeaderMap::new();
    let location = format!("{base_uri}data/{created_path}");
    match header_value(&location) {
        Some(value) => headers.insert(LOCATION, value),
        None => return internal_error("location", &location),
    };
    apply_metadata(&mut headers, metadata);
    (StatusCode::CREATED, headers).into_response()
}

/// 204 for an operation without output, otherwise 200 with the output.
pub fn invoked(result: &InvokeResult, encoding: MessageEncoding, pretty: PrettyPrint) -> Response {
    match &result.output {
        None => StatusCode::NO_CONTENT.into_response(),
        Some(output) => rendered(
            StatusCode::OK,
            HeaderMap::new(),
            encoding.data_media_type(),
            true,
            |out| output.format(encoding, pretty, out),
        ),
    }
}

/// Status with metadata headers and no body (PUT, plain PATCH).
pub fn metadata_only(status: StatusCode, metadata: &ConfigurationMetadata) -> Response {
    let mut headers = HeaderMap::new();
    apply_metadata(&mut headers, metadata);
    (status, headers).into_response()
}

/// Overall status of a YANG Patch: OK if every edit applied, else the first
/// global error, else the first failed edit in edit order, else 500.
pub fn patch_status_code(status: &PatchStatus, mapping: &ErrorTagMapping) -> StatusCode {
    if status.ok {
        return StatusCode::OK;
    }
    if let Some(error) = status.global_errors.first() {
        return mapping.status_of(error.error_tag);
    }
    status
        .edits
        .iter()
        .find_map(|edit| edit.errors.first())
        .map_or(StatusCode::INTERNAL_SERVER_ERROR, |error| {
            mapping.status_of(error.error_tag)
        })
}

pub fn yang_patch(
    status: &PatchStatus,
    metadata: &ConfigurationMetadata,
    mapping: &ErrorTagMapping,
    encoding: MessageEncoding,
    pretty: PrettyPrint,
) -> Response {
    let mut headers = HeaderMap::new();
    apply_metadata(&mut headers, metadata);
    rendered(
        patch_status_code(status, mapping),
        headers,
        encoding.data_media_type(),
        true,
        |out| format_patch_status(status, encoding, pretty, out),
    )
}

/// 200 with `Allow` and, where edits are possible, `Accept-Patch`.
pub fn options(allow: &'static str, accept_patch: bool) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(ALLOW, HeaderValue::from_static(allow));
    if accept_patch {
        if let Some(value) = header_value(&media_type::join(media_type::PATCH_TYPES)) {
            headers.insert(media_type::ACCEPT_PATCH, value);
        }
    }
    (StatusCode::OK, headers).into_response()
}

/// OPTIONS on a data resource, by resource kind.
pub fn data_options(kind: OptionsResult) -> Response {
    match kind {
        OptionsResult::Datastore => options(allow::DATASTORE, true),
        OptionsResult::Resource => options(allow::RESOURCE, true),
        OptionsResult::ReadOnly => options(allow::READ_ONLY, false),
        OptionsResult::Rpc | OptionsResult::Action => options(allow::OPERATION, false),
    }
}

/// OPTIONS on `/operations/{rpc}`, which also answers GET.
pub fn operations_options(kind: OptionsResult) -> Response {
    match kind {
        OptionsResult::Rpc | OptionsResult::Action => options(allow::OPERATIONS_RPC, false),
        other => data_options(other),
    }
}

/// Raw bytes with a fixed media type (module sources, discovery documents).
pub fn raw(
    content_type: &'static str,
    bytes: impl Into<Body>,
    with_content: bool,
) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    if !with_content {
        return (StatusCode::OK, headers).into_response();
    }
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    (StatusCode::OK, headers, bytes.into()).into_response()
}

/// Single header, for `Allow` on 405s and the media type lists on 406/415.
pub fn header(name: HeaderName, value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(value) = header_value(value) {
        headers.insert(name, value);
    }
    headers
}
