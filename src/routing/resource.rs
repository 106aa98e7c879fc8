//! Shared request context for resource preparation.

use std::sync::Arc;

use axum::http::header::ACCEPT;
use axum::http::{HeaderMap, HeaderName, Method, StatusCode};

use crate::backend::{ErrorTag, ErrorType, PrettyPrint, Principal, QueryParameters, ServerRequest, YangError};
use crate::negotiation::{
    self, media_type, InputEncoding, MessageEncoding, NotAcceptable, UnsupportedMediaType,
};
use crate::pending::{transform, CompletedRequest, EndpointInvariants, Operation, PendingRequest};

use super::api_path::{ApiPath, ApiPathError};

/// Canonical `Allow` sets.
pub mod allow {
    /// The datastore root: everything but DELETE.
    pub const DATASTORE: &str = "GET, HEAD, OPTIONS, PATCH, POST, PUT";
    pub const RESOURCE: &str = "DELETE, GET, HEAD, OPTIONS, PATCH, POST, PUT";
    pub const READ_ONLY: &str = "GET, HEAD, OPTIONS";
    /// An RPC or action under `/data`.
    pub const OPERATION: &str = "OPTIONS, POST";
    /// An RPC under `/operations`, which can also be read.
    pub const OPERATIONS_RPC: &str = "GET, HEAD, OPTIONS, POST";
}

/// Query parameter overriding the default pretty-print setting.
pub const PRETTY_PRINT_PARAM: &str = "odl-pretty-print";

/// Everything routing needs to know about one request. Borrowed from the
/// HTTP layer for the duration of `prepare`.
pub struct PrepareContext<'a> {
    pub method: &'a Method,
    pub headers: &'a HeaderMap,
    pub query: QueryParameters,
    pub principal: Option<Principal>,
    /// Whether the transport will deliver a body.
    pub has_body: bool,
    /// `{scheme}://{authority}{base_path}/`, used for `Location`.
    pub base_uri: String,
    pub invariants: &'a Arc<EndpointInvariants>,
}

impl PrepareContext<'_> {
    pub fn default_encoding(&self) -> MessageEncoding {
        self.invariants.default_encoding
    }

    pub fn pretty_print(&self) -> PrettyPrint {
        match self.query.get(PRETTY_PRINT_PARAM) {
            Some("true") => PrettyPrint(true),
            Some("false") => PrettyPrint(false),
            _ => self.invariants.pretty_print,
        }
    }

    pub fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }

    /// Encoding of locally generated error bodies.
    pub fn error_encoding(&self) -> MessageEncoding {
        let default = self.default_encoding();
        negotiation::negotiate_output_or(self.headers, default, default)
    }

    /// Output encoding from `Accept`, or a finished 406.
    pub fn output_encoding(&self) -> Result<MessageEncoding, CompletedRequest> {
        negotiation::negotiate_output(self.headers, self.default_encoding())
            .map_err(|error| self.not_acceptable(&error))
    }

    /// Input encoding of a POST or PUT body. A request without a body uses
    /// the default encoding.
    pub fn input_encoding(&self) -> Result<MessageEncoding, CompletedRequest> {
        match negotiation::negotiate_input(self.headers, self.has_body) {
            InputEncoding::NoBody => Ok(self.default_encoding()),
            InputEncoding::Resolved(encoding) => Ok(encoding),
            InputEncoding::Unspecified => Err(self.unsupported_media_type(
                &UnsupportedMediaType {
                    found: None,
                    supported: media_type::ACCEPT_DATA,
                },
                ACCEPT,
            )),
            InputEncoding::Unrecognized(found) => Err(self.unsupported_media_type(
                &UnsupportedMediaType {
                    found: Some(found),
                    supported: media_type::ACCEPT_DATA,
                },
                ACCEPT,
            )),
        }
    }

    pub fn server_request(&self, encoding: MessageEncoding) -> ServerRequest {
        ServerRequest {
            principal: self.principal.clone(),
            query: self.query.clone(),
            pretty_print: self.pretty_print(),
            encoding,
        }
    }

    /// Bind `operation`; HEAD requests get the body-less variant.
    pub fn pending(&self, encoding: MessageEncoding, operation: Operation) -> PendingRequest {
        let pending = PendingRequest::new(
            self.invariants.clone(),
            self.base_uri.clone(),
            self.server_request(encoding),
            operation,
        );
        if self.is_head() {
            pending.without_content()
        } else {
            pending
        }
    }

    fn local_error(
        &self,
        status: StatusCode,
        error: YangError,
        encoding: MessageEncoding,
        headers: HeaderMap,
    ) -> CompletedRequest {
        CompletedRequest::new(transform::errors_response(
            status,
            &[error],
            encoding,
            self.pretty_print(),
            headers,
        ))
    }

    /// 400 for an unparseable data resource identifier.
    pub fn bad_request(&self, error: &ApiPathError) -> CompletedRequest {
        tracing::debug!(error = %error, "Malformed resource identifier");
        self.local_error(
            StatusCode::BAD_REQUEST,
            YangError::new(ErrorType::Protocol, ErrorTag::InvalidValue, error.to_string()),
            self.error_encoding(),
            HeaderMap::new(),
        )
    }

    /// 409 for a resource that exists but is in the wrong state.
    pub fn conflict(&self, message: String) -> CompletedRequest {
        self.local_error(
            StatusCode::CONFLICT,
            YangError::new(ErrorType::Protocol, ErrorTag::OperationFailed, message),
            self.error_encoding(),
            HeaderMap::new(),
        )
    }

    /// 406, listing what could have been served in `Accept`.
    pub fn not_acceptable(&self, error: &NotAcceptable) -> CompletedRequest {
        self.not_acceptable_types(&error.supported)
    }

    pub fn not_acceptable_types(&self, supported: &[&str]) -> CompletedRequest {
        let message = format!(
            "none of the acceptable media types is supported, supported types: {}",
            supported.join(", ")
        );
        self.local_error(
            StatusCode::NOT_ACCEPTABLE,
            YangError::new(ErrorType::Protocol, ErrorTag::InvalidValue, message),
            self.default_encoding(),
            transform::header(ACCEPT, &media_type::join(supported)),
        )
    }

    /// 415, listing supported body types in `header` (`Accept` or
    /// `Accept-Patch`).
    pub fn unsupported_media_type(
        &self,
        error: &UnsupportedMediaType,
        header: HeaderName,
    ) -> CompletedRequest {
        self.local_error(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            YangError::new(ErrorType::Protocol, ErrorTag::InvalidValue, error.to_string()),
            self.error_encoding(),
            transform::header(header, &media_type::join(error.supported)),
        )
    }

    /// 415 for a PATCH body.
    pub fn unsupported_patch(&self, error: &UnsupportedMediaType) -> CompletedRequest {
        self.unsupported_media_type(error, media_type::ACCEPT_PATCH)
    }

    /// Parse the raw remainder of a leaf resource, or a finished 400.
    pub fn api_path(&self, remaining: &str) -> Result<ApiPath, CompletedRequest> {
        ApiPath::parse_remainder(remaining).map_err(|error| self.bad_request(&error))
    }
}
