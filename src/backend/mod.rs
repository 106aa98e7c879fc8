//! Backend datastore surface.
//!
//! # Data Flow
//! ```text
//! PendingRequest (bound operation + ServerRequest + typed body)
//!     → RestconfBackend::<operation>() (async, may run anywhere)
//!     → Result<typed result, ServerError>
//!     → pending::transform (status, headers, body)
//! ```
//!
//! # Design Decisions
//! - One trait method per bound operation; the ApiPath argument covers both
//!   the root (empty path) and nested forms
//! - Bodies are lent (`&mut`), never given away, so the caller controls
//!   when the stream is released
//! - Futures may be dropped at any await point when the client resets the
//!   stream or the request times out; implementations must be cancel-safe

pub mod body;
pub mod error;
pub mod memory;
pub mod types;

use async_trait::async_trait;

use crate::routing::ApiPath;

pub use body::{ChildBody, OperationInputBody, PatchBody, ResourceBody, TypedBody};
pub use error::{ErrorTag, ErrorTagMapping, ErrorTagTable, ErrorType, ServerError, YangError};
pub use memory::MemoryBackend;
pub use types::{
    ConfigurationMetadata, CreateResourceResult, DataGetResult, DataPatchResult, DataPostResult,
    DataPutResult, DataYangPatchResult, EntityTag, FormatError, FormattableBody, InvokeResult,
    ModuleSource, OptionsResult, PatchEditStatus, PatchStatus, PrettyPrint, Principal,
    QueryParameters, ServerRequest,
};

/// The datastore operations a RESTCONF endpoint forwards requests to.
#[async_trait]
pub trait RestconfBackend: Send + Sync + 'static {
    /// Read data at `path`; an empty path reads the whole datastore.
    async fn data_get(
        &self,
        request: &ServerRequest,
        path: &ApiPath,
    ) -> Result<DataGetResult, ServerError>;

    /// Classify the resource at `path` for an OPTIONS response.
    async fn data_options(
        &self,
        request: &ServerRequest,
        path: &ApiPath,
    ) -> Result<OptionsResult, ServerError>;

    /// Create a child of `path`, or invoke the action at `path`.
    async fn data_post(
        &self,
        request: &ServerRequest,
        path: &ApiPath,
        body: &mut ChildBody,
    ) -> Result<DataPostResult, ServerError>;

    /// Create or replace the resource at `path`.
    async fn data_put(
        &self,
        request: &ServerRequest,
        path: &ApiPath,
        body: &mut ResourceBody,
    ) -> Result<DataPutResult, ServerError>;

    /// Merge the body into the resource at `path`.
    async fn data_patch(
        &self,
        request: &ServerRequest,
        path: &ApiPath,
        body: &mut ResourceBody,
    ) -> Result<DataPatchResult, ServerError>;

    /// Apply a YANG Patch rooted at `path`.
    async fn data_yang_patch(
        &self,
        request: &ServerRequest,
        path: &ApiPath,
        body: &mut PatchBody,
    ) -> Result<DataYangPatchResult, ServerError>;

    /// Delete the resource at `path`, which is never empty.
    async fn data_delete(&self, request: &ServerRequest, path: &ApiPath) -> Result<(), ServerError>;

    /// List operations, or describe the one at `path`.
    async fn operations_get(
        &self,
        request: &ServerRequest,
        path: &ApiPath,
    ) -> Result<Box<dyn FormattableBody>, ServerError>;

    async fn operations_options(
        &self,
        request: &ServerRequest,
        path: &ApiPath,
    ) -> Result<OptionsResult, ServerError>;

    /// Invoke the RPC at `path`.
    async fn operations_post(
        &self,
        request: &ServerRequest,
        path: &ApiPath,
        body: &mut OperationInputBody,
    ) -> Result<InvokeResult, ServerError>;

    /// The `ietf-restconf:yang-library-version` leaf of the datastore, or of
    /// the mount point at `mount` when it is not empty.
    async fn yang_library_version_get(
        &self,
        request: &ServerRequest,
        mount: &ApiPath,
    ) -> Result<Box<dyn FormattableBody>, ServerError>;

    /// YANG source of a module or submodule.
    async fn modules_yang_get(
        &self,
        request: &ServerRequest,
        mount: &ApiPath,
        file_name: &str,
        revision: Option<&str>,
    ) -> Result<ModuleSource, ServerError>;

    /// YIN source of a module or submodule.
    async fn modules_yin_get(
        &self,
        request: &ServerRequest,
        mount: &ApiPath,
        file_name: &str,
        revision: Option<&str>,
    ) -> Result<ModuleSource, ServerError>;
}
