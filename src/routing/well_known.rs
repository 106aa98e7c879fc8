//! RFC 6415 / RFC 8615 discovery under `/.well-known`.

use axum::http::Method;
use serde_json::json;

use super::peeler::SegmentPeeler;
use super::resource::{allow, PrepareContext};
use crate::negotiation::media_type;
use crate::pending::{transform, CompletedRequest, PreparedRequest};

pub const SEGMENT: &str = ".well-known";

fn host_meta(base_path: &str) -> String {
    format!(
        "<?xml version='1.0' encoding='UTF-8'?>\n\
         <XRD xmlns='http://docs.oasis-open.org/ns/xri/xrd-1.0'>\n\
         \x20 <Link rel='restconf' href='{base_path}'/>\n\
         </XRD>\n"
    )
}

fn host_meta_json(base_path: &str) -> String {
    json!({ "links": [{ "rel": "restconf", "href": base_path }] }).to_string()
}

pub fn prepare(ctx: &PrepareContext<'_>, mut peeler: SegmentPeeler<'_>) -> PreparedRequest {
    let document = match peeler.next_segment().as_deref() {
        Some("host-meta") => Document::Xrd,
        Some("host-meta.json") => Document::Jrd,
        _ => return CompletedRequest::not_found().into(),
    };
    if !peeler.is_exhausted() {
        return CompletedRequest::not_found().into();
    }

    let with_content = match *ctx.method {
        Method::GET => true,
        Method::HEAD => false,
        Method::OPTIONS => return CompletedRequest::options(allow::READ_ONLY, false).into(),
        _ => return CompletedRequest::method_not_allowed(allow::READ_ONLY).into(),
    };
    let base_path = &ctx.invariants.base_path;
    let response = match document {
        Document::Xrd => transform::raw(
            media_type::APPLICATION_XRD_XML,
            host_meta(base_path),
            with_content,
        ),
        Document::Jrd => transform::raw(
            media_type::APPLICATION_JSON,
            host_meta_json(base_path),
            with_content,
        ),
    };
    CompletedRequest::new(response).into()
}

enum Document {
    Xrd,
    Jrd,
}
