//! `{base}/data`: the datastore and every node in it.

use axum::http::{HeaderMap, Method};

use super::resource::{allow, PrepareContext};
use crate::negotiation::{self, PatchDialect};
use crate::pending::{CompletedRequest, Operation, PreparedRequest};

pub fn prepare(ctx: &PrepareContext<'_>, remaining: &str) -> PreparedRequest {
    let path = match ctx.api_path(remaining) {
        Ok(path) => path,
        Err(completed) => return completed.into(),
    };
    let headers: &HeaderMap = ctx.headers;
    let default = ctx.default_encoding();

    match *ctx.method {
        Method::GET | Method::HEAD => match ctx.output_encoding() {
            Ok(encoding) => ctx.pending(encoding, Operation::DataGet { path }).into(),
            Err(completed) => completed.into(),
        },
        Method::OPTIONS => ctx
            .pending(ctx.error_encoding(), Operation::DataOptions { path })
            .into(),
        Method::POST => match ctx.input_encoding() {
            Ok(input) => {
                let output = negotiation::negotiate_output_or(headers, default, input);
                ctx.pending(output, Operation::DataPost { path, input }).into()
            }
            Err(completed) => completed.into(),
        },
        Method::PUT => match ctx.input_encoding() {
            Ok(input) => {
                let output = negotiation::negotiate_output_or(headers, default, input);
                ctx.pending(output, Operation::DataPut { path, input }).into()
            }
            Err(completed) => completed.into(),
        },
        Method::PATCH => match negotiation::resolve_patch(headers) {
            Ok(PatchDialect::Plain(input)) => {
                let output = negotiation::negotiate_output_or(headers, default, input);
                ctx.pending(output, Operation::DataPatch { path, input }).into()
            }
            Ok(PatchDialect::YangPatch(input)) => match ctx.output_encoding() {
                Ok(output) => ctx
                    .pending(output, Operation::DataYangPatch { path, input })
                    .into(),
                Err(completed) => completed.into(),
            },
            Err(error) => ctx.unsupported_patch(&error).into(),
        },
        Method::DELETE if path.is_empty() => {
            CompletedRequest::method_not_allowed(allow::DATASTORE).into()
        }
        Method::DELETE => ctx
            .pending(ctx.error_encoding(), Operation::DataDelete { path })
            .into(),
        _ if path.is_empty() => CompletedRequest::method_not_allowed(allow::DATASTORE).into(),
        _ => CompletedRequest::method_not_allowed(allow::RESOURCE).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::negotiation::MessageEncoding;
    use crate::routing::resource::test_support::*;
    use crate::routing::ApiPath;
    use crate::negotiation::media_type::ACCEPT_PATCH;
    use axum::http::header::ALLOW;
    use axum::http::StatusCode;

    fn run(method: Method, remaining: &str, pairs: &[(&'static str, &'static str)]) -> PreparedRequest {
        let invariants = invariants();
        let headers = headers(pairs);
        let mut ctx = context(&method, &headers, &invariants);
        ctx.has_body = pairs.iter().any(|(name, _)| *name == "content-length");
        prepare(&ctx, remaining)
    }

    #[test]
    fn test_get_binds_json_datastore_read() {
        let pending = pending(run(
            Method::GET,
            "",
            &[("accept", "application/yang-data+json")],
        ));
        assert_eq!(
            pending.operation(),
            &Operation::DataGet {
                path: ApiPath::empty()
            }
        );
        assert_eq!(pending.request().encoding, MessageEncoding::Json);
        assert!(pending.with_content());
    }

    #[test]
    fn test_get_not_acceptable() {
        let completed = completed(run(Method::GET, "/example:top", &[("accept", "text/html")]));
        assert_eq!(completed.status(), StatusCode::NOT_ACCEPTABLE);
    }

    #[test]
    fn test_yang_patch_uses_default_output() {
        let pending = pending(run(
            Method::PATCH,
            "/foo:bar",
            &[("content-type", "application/yang-patch+xml"), ("content-length", "10")],
        ));
        assert!(matches!(
            pending.operation(),
            Operation::DataYangPatch { input: MessageEncoding::Xml, .. }
        ));
        assert_eq!(pending.request().encoding, MessageEncoding::Json);
    }

    #[test]
    fn test_plain_patch() {
        let pending = pending(run(
            Method::PATCH,
            "/foo:bar",
            &[("content-type", "application/yang-data+xml")],
        ));
        assert!(matches!(
            pending.operation(),
            Operation::DataPatch { input: MessageEncoding::Xml, .. }
        ));
        assert_eq!(pending.request().encoding, MessageEncoding::Json);
    }

    #[test]
    fn test_plain_patch_unmatched_accept_falls_back_to_input() {
        let pending = pending(run(
            Method::PATCH,
            "/foo:bar",
            &[
                ("content-type", "application/yang-data+xml"),
                ("accept", "text/html"),
            ],
        ));
        assert_eq!(pending.request().encoding, MessageEncoding::Xml);
    }

    #[test]
    fn test_patch_unsupported_lists_patch_types() {
        let completed = completed(run(
            Method::PATCH,
            "/foo:bar",
            &[("content-type", "text/plain")],
        ));
        assert_eq!(completed.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let accept_patch = completed.response().headers()[ACCEPT_PATCH].to_str().unwrap();
        assert!(accept_patch.contains("application/yang-patch+json"));
        assert!(accept_patch.contains("text/xml"));
    }

    #[test]
    fn test_post_text_plain_is_unsupported() {
        let completed = completed(run(
            Method::POST,
            "",
            &[("content-type", "text/plain"), ("content-length", "5")],
        ));
        assert_eq!(completed.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[test]
    fn test_post_output_falls_back_to_input() {
        let pending = pending(run(
            Method::POST,
            "/example:top",
            &[
                ("content-type", "application/yang-data+xml"),
                ("content-length", "7"),
                ("accept", "text/html"),
            ],
        ));
        assert_eq!(pending.request().encoding, MessageEncoding::Xml);
        assert!(matches!(
            pending.operation(),
            Operation::DataPost { input: MessageEncoding::Xml, path } if !path.is_empty()
        ));
    }

    #[test]
    fn test_put_on_root() {
        let pending = pending(run(Method::PUT, "/", &[]));
        assert!(matches!(
            pending.operation(),
            Operation::DataPut { path, .. } if path.is_empty()
        ));
    }

    #[test]
    fn test_delete_root_not_allowed() {
        let completed = completed(run(Method::DELETE, "", &[]));
        assert_eq!(completed.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            completed.response().headers()[ALLOW],
            "GET, HEAD, OPTIONS, PATCH, POST, PUT"
        );
        assert!(matches!(
            pending(run(Method::DELETE, "/example:top", &[])).operation(),
            Operation::DataDelete { .. }
        ));
    }

    #[test]
    fn test_unknown_method() {
        let completed = completed(run(Method::TRACE, "/example:top", &[]));
        assert_eq!(completed.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(completed.response().headers()[ALLOW], allow::RESOURCE);
    }

    #[test]
    fn test_malformed_path_is_bad_request_for_every_method() {
        for method in [
            Method::GET,
            Method::HEAD,
            Method::OPTIONS,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::TRACE,
        ] {
            let completed = completed(run(method.clone(), "/example:list=a/b=%", &[]));
            assert_eq!(completed.status(), StatusCode::BAD_REQUEST, "{method}");
        }
    }
}
