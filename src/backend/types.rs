//! Request context and result types exchanged with the backend.

use std::fmt;

use axum::http::HeaderValue;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::negotiation::MessageEncoding;
use crate::routing::ApiPath;

use super::error::YangError;

/// Identity of the requester, as established in front of this layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal(pub String);

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether bodies are written with indentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrettyPrint(pub bool);

/// Decoded query parameters, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParameters(Vec<(String, String)>);

impl QueryParameters {
    pub fn parse(query: Option<&str>) -> Self {
        let pairs = query
            .map(|query| {
                url::form_urlencoded::parse(query.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();
        Self(pairs)
    }

    /// First value of `name`, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Everything the backend needs to know about the request besides the target
/// and the body.
#[derive(Debug, Clone)]
pub struct ServerRequest {
    pub principal: Option<Principal>,
    pub query: QueryParameters,
    pub pretty_print: PrettyPrint,
    /// Encoding any body produced for this request will be written in.
    pub encoding: MessageEncoding,
}

/// Failure to render a [`FormattableBody`].
#[derive(Debug, thiserror::Error)]
#[error("failed to format body: {0}")]
pub struct FormatError(pub String);

/// A document the backend produced that can be written in either encoding.
pub trait FormattableBody: Send + Sync + fmt::Debug {
    fn format(
        &self,
        encoding: MessageEncoding,
        pretty: PrettyPrint,
        out: &mut Vec<u8>,
    ) -> Result<(), FormatError>;
}

/// HTTP entity tag of a datastore resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTag {
    pub value: String,
    pub weak: bool,
}

impl EntityTag {
    pub fn header_value(&self) -> Option<HeaderValue> {
        let value = if self.weak {
            format!("W/\"{}\"", self.value)
        } else {
            format!("\"{}\"", self.value)
        };
        HeaderValue::from_str(&value).ok()
    }
}

/// `ETag` / `Last-Modified` metadata of a configuration resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationMetadata {
    pub entity_tag: Option<EntityTag>,
    pub last_modified: Option<DateTime<Utc>>,
}

pub struct DataGetResult {
    pub body: Box<dyn FormattableBody>,
    pub metadata: ConfigurationMetadata,
}

pub struct CreateResourceResult {
    /// Path of the created resource, relative to the datastore root.
    pub created_path: ApiPath,
    pub metadata: ConfigurationMetadata,
}

pub struct InvokeResult {
    pub output: Option<Box<dyn FormattableBody>>,
}

/// POST on a data resource either creates a child or invokes an action.
pub enum DataPostResult {
    Created(CreateResourceResult),
    Invoked(InvokeResult),
}

pub struct DataPutResult {
    /// `true` if the resource did not exist before.
    pub created: bool,
    pub metadata: ConfigurationMetadata,
}

pub struct DataPatchResult {
    pub metadata: ConfigurationMetadata,
}

/// Outcome of a single edit in a YANG Patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchEditStatus {
    pub edit_id: String,
    pub ok: bool,
    pub errors: Vec<YangError>,
}

/// RFC 8072 `yang-patch-status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchStatus {
    pub patch_id: String,
    pub ok: bool,
    pub global_errors: Vec<YangError>,
    pub edits: Vec<PatchEditStatus>,
}

pub struct DataYangPatchResult {
    pub status: PatchStatus,
    pub metadata: ConfigurationMetadata,
}

/// What kind of resource an OPTIONS request hit; decides the `Allow` set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionsResult {
    /// The datastore root.
    Datastore,
    /// A configuration data resource.
    Resource,
    /// A state (read-only) data resource.
    ReadOnly,
    /// An RPC.
    Rpc,
    /// A YANG 1.1 action.
    Action,
}

/// Source of a YANG module or submodule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSource(pub Bytes);
