//! Backend domain errors and their mapping to HTTP status codes.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

/// RFC 6241 Appendix A `error-tag` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorTag {
    InUse,
    InvalidValue,
    TooBig,
    MissingAttribute,
    BadAttribute,
    UnknownAttribute,
    MissingElement,
    BadElement,
    UnknownElement,
    UnknownNamespace,
    AccessDenied,
    LockDenied,
    ResourceDenied,
    RollbackFailed,
    DataExists,
    DataMissing,
    OperationNotSupported,
    OperationFailed,
    PartialOperation,
    MalformedMessage,
}

impl ErrorTag {
    pub const ALL: [ErrorTag; 20] = [
        ErrorTag::InUse,
        ErrorTag::InvalidValue,
        ErrorTag::TooBig,
        ErrorTag::MissingAttribute,
        ErrorTag::BadAttribute,
        ErrorTag::UnknownAttribute,
        ErrorTag::MissingElement,
        ErrorTag::BadElement,
        ErrorTag::UnknownElement,
        ErrorTag::UnknownNamespace,
        ErrorTag::AccessDenied,
        ErrorTag::LockDenied,
        ErrorTag::ResourceDenied,
        ErrorTag::RollbackFailed,
        ErrorTag::DataExists,
        ErrorTag::DataMissing,
        ErrorTag::OperationNotSupported,
        ErrorTag::OperationFailed,
        ErrorTag::PartialOperation,
        ErrorTag::MalformedMessage,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorTag::InUse => "in-use",
            ErrorTag::InvalidValue => "invalid-value",
            ErrorTag::TooBig => "too-big",
            ErrorTag::MissingAttribute => "missing-attribute",
            ErrorTag::BadAttribute => "bad-attribute",
            ErrorTag::UnknownAttribute => "unknown-attribute",
            ErrorTag::MissingElement => "missing-element",
            ErrorTag::BadElement => "bad-element",
            ErrorTag::UnknownElement => "unknown-element",
            ErrorTag::UnknownNamespace => "unknown-namespace",
            ErrorTag::AccessDenied => "access-denied",
            ErrorTag::LockDenied => "lock-denied",
            ErrorTag::ResourceDenied => "resource-denied",
            ErrorTag::RollbackFailed => "rollback-failed",
            ErrorTag::DataExists => "data-exists",
            ErrorTag::DataMissing => "data-missing",
            ErrorTag::OperationNotSupported => "operation-not-supported",
            ErrorTag::OperationFailed => "operation-failed",
            ErrorTag::PartialOperation => "partial-operation",
            ErrorTag::MalformedMessage => "malformed-message",
        }
    }
}

impl fmt::Display for ErrorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| format!("unknown error-tag '{s}'"))
    }
}

/// RFC 6241 `error-type`, the layer an error originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    Transport,
    Rpc,
    Protocol,
    Application,
}

impl ErrorType {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorType::Transport => "transport",
            ErrorType::Rpc => "rpc",
            ErrorType::Protocol => "protocol",
            ErrorType::Application => "application",
        }
    }
}

/// One entry of an `ietf-restconf:errors` report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YangError {
    pub error_type: ErrorType,
    pub error_tag: ErrorTag,
    pub error_app_tag: Option<String>,
    pub error_path: Option<String>,
    pub error_message: Option<String>,
    pub error_info: Option<String>,
}

impl YangError {
    pub fn new(error_type: ErrorType, error_tag: ErrorTag, message: impl Into<String>) -> Self {
        Self {
            error_type,
            error_tag,
            error_app_tag: None,
            error_path: None,
            error_message: Some(message.into()),
            error_info: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.error_path = Some(path.into());
        self
    }
}

/// A failed backend operation. Never empty: the first error decides the
/// response status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    errors: Vec<YangError>,
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let first = self.first();
        write!(
            f,
            "{}: {}",
            first.error_tag,
            first.error_message.as_deref().unwrap_or("no message")
        )
    }
}

impl std::error::Error for ServerError {}

impl ServerError {
    pub fn new(error: YangError) -> Self {
        Self { errors: vec![error] }
    }

    /// Build from a list of errors; returns `None` for an empty list.
    pub fn from_errors(errors: Vec<YangError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self { errors })
        }
    }

    pub fn protocol(tag: ErrorTag, message: impl Into<String>) -> Self {
        Self::new(YangError::new(ErrorType::Protocol, tag, message))
    }

    pub fn application(tag: ErrorTag, message: impl Into<String>) -> Self {
        Self::new(YangError::new(ErrorType::Application, tag, message))
    }

    pub fn first(&self) -> &YangError {
        &self.errors[0]
    }

    pub fn errors(&self) -> &[YangError] {
        &self.errors
    }
}

/// Built-in error-tag to status tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorTagTable {
    /// RFC 8040 §7 as published.
    #[default]
    Rfc8040,
    /// RFC 8040 with errata 5565 applied: `data-missing` maps to 404.
    #[serde(rename = "errata-5565")]
    Errata5565,
}

/// Maps an [`ErrorTag`] to the HTTP status reported for it.
#[derive(Debug, Clone, Default)]
pub struct ErrorTagMapping {
    table: ErrorTagTable,
    overrides: HashMap<ErrorTag, StatusCode>,
}

impl ErrorTagMapping {
    pub fn new(table: ErrorTagTable, overrides: HashMap<ErrorTag, StatusCode>) -> Self {
        Self { table, overrides }
    }

    pub fn status_of(&self, tag: ErrorTag) -> StatusCode {
        if let Some(status) = self.overrides.get(&tag) {
            return *status;
        }
        match tag {
            ErrorTag::InUse
            | ErrorTag::LockDenied
            | ErrorTag::ResourceDenied
            | ErrorTag::DataExists => StatusCode::CONFLICT,
            ErrorTag::DataMissing => match self.table {
                ErrorTagTable::Rfc8040 => StatusCode::CONFLICT,
                ErrorTagTable::Errata5565 => StatusCode::NOT_FOUND,
            },
            ErrorTag::InvalidValue
            | ErrorTag::MissingAttribute
            | ErrorTag::BadAttribute
            | ErrorTag::UnknownAttribute
            | ErrorTag::MissingElement
            | ErrorTag::BadElement
            | ErrorTag::UnknownElement
            | ErrorTag::UnknownNamespace
            | ErrorTag::MalformedMessage => StatusCode::BAD_REQUEST,
            ErrorTag::TooBig => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorTag::AccessDenied => StatusCode::FORBIDDEN,
            ErrorTag::OperationNotSupported => StatusCode::NOT_IMPLEMENTED,
            ErrorTag::RollbackFailed | ErrorTag::OperationFailed | ErrorTag::PartialOperation => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn status_of_error(&self, error: &ServerError) -> StatusCode {
        self.status_of(error.first().error_tag)
    }
}
