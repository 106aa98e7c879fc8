//! The API root and its fixed children.

use super::resource::PrepareContext;
use super::{data, modules, operations, streams, yang_library};
use crate::pending::PreparedRequest;

/// Fixed resources directly under the base path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiResource {
    Data,
    Operations,
    YangLibraryVersion,
    Modules,
    Streams,
    Subscriptions,
}

impl ApiResource {
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "data" => Some(Self::Data),
            "operations" => Some(Self::Operations),
            "yang-library-version" => Some(Self::YangLibraryVersion),
            "modules" => Some(Self::Modules),
            "streams" => Some(Self::Streams),
            "subscriptions" => Some(Self::Subscriptions),
            _ => None,
        }
    }

    /// Hand the raw, undecoded remainder (empty or starting with `/`) to
    /// the leaf resource.
    pub fn prepare(self, ctx: &PrepareContext<'_>, remaining: &str) -> PreparedRequest {
        match self {
            Self::Data => data::prepare(ctx, remaining),
            Self::Operations => operations::prepare(ctx, remaining),
            Self::YangLibraryVersion => yang_library::prepare(ctx, remaining),
            Self::Modules => modules::prepare(ctx, remaining),
            Self::Streams => streams::prepare_stream(ctx, remaining),
            Self::Subscriptions => streams::prepare_subscription(ctx, remaining),
        }
    }
}
