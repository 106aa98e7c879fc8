//! `{base}/operations`: RPC discovery and invocation.

use axum::http::Method;

use super::resource::{allow, PrepareContext};
use crate::negotiation;
use crate::pending::{CompletedRequest, Operation, PreparedRequest};

pub fn prepare(ctx: &PrepareContext<'_>, remaining: &str) -> PreparedRequest {
    let path = match ctx.api_path(remaining) {
        Ok(path) => path,
        Err(completed) => return completed.into(),
    };
    let allowed = if path.is_empty() {
        allow::READ_ONLY
    } else {
        allow::OPERATIONS_RPC
    };

    match *ctx.method {
        Method::GET | Method::HEAD => match ctx.output_encoding() {
            Ok(encoding) => ctx.pending(encoding, Operation::OperationsGet { path }).into(),
            Err(completed) => completed.into(),
        },
        Method::OPTIONS if path.is_empty() => CompletedRequest::options(allowed, false).into(),
        Method::OPTIONS => ctx
            .pending(ctx.error_encoding(), Operation::OperationsOptions { path })
            .into(),
        Method::POST if !path.is_empty() => match ctx.input_encoding() {
            Ok(input) => {
                let output =
                    negotiation::negotiate_output_or(ctx.headers, ctx.default_encoding(), input);
                ctx.pending(output, Operation::OperationsPost { path, input })
                    .into()
            }
            Err(completed) => completed.into(),
        },
        _ => CompletedRequest::method_not_allowed(allowed).into(),
    }
}
