//! Typed request bodies.
//!
//! A body is wrapped once its encoding is known. The pending request owns
//! the wrapper and lends it to the backend, so the underlying stream is
//! released as soon as the backend call returns, whatever its outcome.

use std::marker::PhantomData;

use axum::body::Body;
use bytes::Bytes;
use http_body_util::LengthLimitError;

use crate::negotiation::MessageEncoding;

use super::error::{ErrorTag, ServerError};

/// Marker for what a body is expected to contain.
pub trait BodyKind: Send + 'static {
    const NAME: &'static str;
}

/// A child resource to create (POST).
pub enum Child {}
/// A complete resource replacing or merging into the target (PUT, plain PATCH).
pub enum Resource {}
/// A YANG Patch edit list.
pub enum Patch {}
/// RPC or action input.
pub enum OperationInput {}

impl BodyKind for Child {
    const NAME: &'static str = "child";
}
impl BodyKind for Resource {
    const NAME: &'static str = "resource";
}
impl BodyKind for Patch {
    const NAME: &'static str = "patch";
}
impl BodyKind for OperationInput {
    const NAME: &'static str = "operation-input";
}

/// A request body stream in a known encoding.
pub struct TypedBody<K: BodyKind> {
    encoding: MessageEncoding,
    stream: Body,
    limit: usize,
    kind: PhantomData<fn() -> K>,
}

pub type ChildBody = TypedBody<Child>;
pub type ResourceBody = TypedBody<Resource>;
pub type PatchBody = TypedBody<Patch>;
pub type OperationInputBody = TypedBody<OperationInput>;

impl<K: BodyKind> TypedBody<K> {
    pub fn new(encoding: MessageEncoding, stream: Body, limit: usize) -> Self {
        Self {
            encoding,
            stream,
            limit,
            kind: PhantomData,
        }
    }

    pub fn encoding(&self) -> MessageEncoding {
        self.encoding
    }

    /// Read the whole body. The stream is consumed; a second call yields an
    /// empty buffer.
    pub async fn read_bytes(&mut self) -> Result<Bytes, ServerError> {
        let stream = std::mem::take(&mut self.stream);
        axum::body::to_bytes(stream, self.limit).await.map_err(|err| {
            tracing::debug!(kind = K::NAME, error = %err, "Failed to read request body");
            let tag = if exceeds_limit(&err) {
                ErrorTag::TooBig
            } else {
                ErrorTag::MalformedMessage
            };
            ServerError::protocol(tag, format!("failed to read {} body: {err}", K::NAME))
        })
    }
}

/// Whether a body read failed because a length limit was hit, here or in
/// the request body limit layer.
fn exceeds_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(error) = source {
        if error.is::<LengthLimitError>() {
            return true;
        }
        source = error.source();
    }
    false
}

impl<K: BodyKind> std::fmt::Debug for TypedBody<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedBody")
            .field("kind", &K::NAME)
            .field("encoding", &self.encoding)
            .finish()
    }
}
