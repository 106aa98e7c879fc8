//! `{base}/modules`: YANG and YIN module sources.
//!
//! ```text
//! /modules/{name}[?revision={date}]
//! /modules/{mount-point}/yang-ext:mount/{name}[?revision={date}]
//! ```

use axum::http::header::ACCEPT;
use axum::http::{HeaderMap, Method};

use super::resource::{allow, PrepareContext};
use super::SegmentPeeler;
use crate::negotiation::media_type::{self, essences};
use crate::pending::{CompletedRequest, ModuleFormat, Operation, PreparedRequest};
use crate::routing::ApiPath;

const MOUNT_MARKER: &str = "/yang-ext:mount/";

/// Pick YANG or YIN from `Accept`, in header order. No header or `*/*`
/// means YANG.
fn module_format(headers: &HeaderMap) -> Option<ModuleFormat> {
    if !headers.contains_key(ACCEPT) {
        return Some(ModuleFormat::Yang);
    }
    essences(headers, ACCEPT).find_map(|value| match value.as_str() {
        media_type::APPLICATION_YANG | media_type::ANY => Some(ModuleFormat::Yang),
        media_type::APPLICATION_YIN_XML => Some(ModuleFormat::Yin),
        _ => None,
    })
}

/// The single decoded segment naming the module, if `raw` is exactly `/{name}`.
fn module_name(raw: &str) -> Option<String> {
    let mut peeler = SegmentPeeler::new(raw).ok()?;
    let name = peeler.next_segment()?;
    (peeler.is_exhausted() && !name.is_empty()).then(|| name.into_owned())
}

pub fn prepare(ctx: &PrepareContext<'_>, remaining: &str) -> PreparedRequest {
    let (mount, name) = match remaining.find(MOUNT_MARKER) {
        Some(index) => {
            let mount = match ctx.api_path(&remaining[..index]) {
                Ok(mount) => mount,
                Err(completed) => return completed.into(),
            };
            let tail = &remaining[index + MOUNT_MARKER.len() - 1..];
            (mount, module_name(tail))
        }
        None => (ApiPath::empty(), module_name(remaining)),
    };
    let Some(name) = name else {
        return CompletedRequest::not_found().into();
    };

    match *ctx.method {
        Method::GET | Method::HEAD => {
            let Some(format) = module_format(ctx.headers) else {
                return ctx
                    .not_acceptable_types(&[
                        media_type::APPLICATION_YANG,
                        media_type::APPLICATION_YIN_XML,
                    ])
                    .into();
            };
            let revision = ctx
                .query
                .get("revision")
                .filter(|revision| !revision.is_empty())
                .map(str::to_owned);
            ctx.pending(
                ctx.error_encoding(),
                Operation::ModuleGet {
                    mount,
                    name,
                    revision,
                    format,
                },
            )
            .into()
        }
        Method::OPTIONS => CompletedRequest::options(allow::READ_ONLY, false).into(),
        _ => CompletedRequest::method_not_allowed(allow::READ_ONLY).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::QueryParameters;
    use crate::routing::resource::test_support::*;
    use axum::http::StatusCode;

    fn run(
        method: Method,
        remaining: &str,
        query: Option<&str>,
        pairs: &[(&'static str, &'static str)],
    ) -> PreparedRequest {
        let invariants = invariants();
        let headers = headers(pairs);
        let mut ctx = context(&method, &headers, &invariants);
        ctx.query = QueryParameters::parse(query);
        prepare(&ctx, remaining)
    }

    #[test]
    fn test_module_with_revision() {
        let pending = pending(run(Method::GET, "/ietf-interfaces", Some("revision=2018-02-20"), &[]));
        assert_eq!(
            pending.operation(),
            &Operation::ModuleGet {
                mount: ApiPath::empty(),
                name: "ietf-interfaces".into(),
                revision: Some("2018-02-20".into()),
                format: ModuleFormat::Yang,
            }
        );
    }

    #[test]
    fn test_yin_requested() {
        let pending = pending(run(
            Method::GET,
            "/ietf-interfaces",
            None,
            &[("accept", "application/yin+xml")],
        ));
        assert!(matches!(
            pending.operation(),
            Operation::ModuleGet { format: ModuleFormat::Yin, revision: None, .. }
        ));
    }

    #[test]
    fn test_unacceptable_format() {
        let completed = completed(run(
            Method::GET,
            "/ietf-interfaces",
            None,
            &[("accept", "application/yang-data+json")],
        ));
        assert_eq!(completed.status(), StatusCode::NOT_ACCEPTABLE);
    }

    #[test]
    fn test_mount_point_module() {
        let pending = pending(run(
            Method::GET,
            "/network-topology:network-topology/topology=t/yang-ext:mount/vendor-module",
            None,
            &[],
        ));
        let Operation::ModuleGet { mount, name, .. } = pending.operation() else {
            panic!("expected a module read");
        };
        assert_eq!(mount.steps().len(), 2);
        assert_eq!(name, "vendor-module");
    }

    #[test]
    fn test_missing_or_nested_name() {
        for remaining in ["", "/", "/a/b"] {
            assert_eq!(
                completed(run(Method::GET, remaining, None, &[])).status(),
                StatusCode::NOT_FOUND,
                "{remaining}"
            );
        }
    }

    #[test]
    fn test_read_only() {
        let completed = completed(run(Method::DELETE, "/ietf-interfaces", None, &[]));
        assert_eq!(completed.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
