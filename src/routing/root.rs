//! Root of the resource tree.

use super::api::ApiResource;
use super::peeler::SegmentPeeler;
use super::resource::PrepareContext;
use super::well_known;
use crate::pending::{CompletedRequest, EndpointInvariants, PreparedRequest};

/// Static resource hierarchy, built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct ResourceTree {
    base_segments: Vec<String>,
}

impl ResourceTree {
    pub fn new(invariants: &EndpointInvariants) -> Self {
        Self {
            base_segments: invariants.base_segments().map(str::to_owned).collect(),
        }
    }

    /// Map one request to a final response or a bound operation. Never
    /// blocks and never calls the backend.
    pub fn prepare(&self, ctx: &PrepareContext<'_>, raw_path: &str) -> PreparedRequest {
        let Ok(mut peeler) = SegmentPeeler::new(raw_path) else {
            return CompletedRequest::not_found().into();
        };
        let Some(first) = peeler.next_segment() else {
            return CompletedRequest::not_found().into();
        };

        if first == well_known::SEGMENT {
            return well_known::prepare(ctx, peeler);
        }

        let mut expected = self.base_segments.iter();
        let Some(root) = expected.next() else {
            return CompletedRequest::not_found().into();
        };
        if first != root.as_str() {
            return CompletedRequest::not_found().into();
        }
        for segment in expected {
            match peeler.next_segment() {
                Some(actual) if actual == segment.as_str() => {}
                _ => return CompletedRequest::not_found().into(),
            }
        }

        let resource = match peeler.next_segment() {
            Some(name) => ApiResource::from_segment(&name),
            None => None,
        };
        match resource {
            Some(resource) => resource.prepare(ctx, peeler.remaining()),
            None => CompletedRequest::not_found().into(),
        }
    }
}
