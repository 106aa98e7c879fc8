//! `{base}/yang-library-version`, optionally followed by
//! `/{mount-point}/yang-ext:mount`.

use axum::http::Method;

use super::resource::{allow, PrepareContext};
use crate::pending::{CompletedRequest, Operation, PreparedRequest};
use crate::routing::ApiPath;

pub fn prepare(ctx: &PrepareContext<'_>, remaining: &str) -> PreparedRequest {
    let mount = if remaining.is_empty() {
        ApiPath::empty()
    } else {
        match ApiPath::parse_remainder(remaining)
            .ok()
            .and_then(|path| path.split_mount())
        {
            Some((mount, rest)) if !mount.is_empty() && rest.is_empty() => mount,
            _ => return CompletedRequest::not_found().into(),
        }
    };
    match *ctx.method {
        Method::GET | Method::HEAD => match ctx.output_encoding() {
            Ok(encoding) => ctx
                .pending(
                    encoding,
                    Operation::YangLibraryVersionGet { mount },
                )
                .into(),
            Err(completed) => completed.into(),
        },
        Method::OPTIONS => CompletedRequest::options(allow::READ_ONLY, false).into(),
        _ => CompletedRequest::method_not_allowed(allow::READ_ONLY).into(),
    }
}
