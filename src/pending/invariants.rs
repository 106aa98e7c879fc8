//! Per-endpoint settings shared by every request.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;

use crate::backend::{ErrorTag, ErrorTagMapping, PrettyPrint, RestconfBackend};
use crate::config::RestconfConfig;
use crate::negotiation::MessageEncoding;
use crate::streams::StreamRegistry;

/// Event-stream delivery settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SseSettings {
    /// Idle time before a heartbeat; zero disables heartbeats.
    pub heartbeat_interval: Duration,
    /// Longest `data:` field; zero disables fragmenting.
    pub maximum_fragment_length: usize,
    pub channel_capacity: usize,
}

/// Immutable after startup; cloned behind an `Arc` into every request.
pub struct EndpointInvariants {
    pub backend: Arc<dyn RestconfBackend>,
    pub registry: Arc<StreamRegistry>,
    pub default_encoding: MessageEncoding,
    pub pretty_print: PrettyPrint,
    pub error_tags: ErrorTagMapping,
    /// Absolute, without trailing slash, e.g. `/restconf`.
    pub base_path: String,
    pub sse: SseSettings,
    pub max_body_size: usize,
}

impl std::fmt::Debug for EndpointInvariants {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointInvariants")
            .field("default_encoding", &self.default_encoding)
            .field("pretty_print", &self.pretty_print)
            .field("base_path", &self.base_path)
            .field("sse", &self.sse)
            .finish_non_exhaustive()
    }
}

impl EndpointInvariants {
    /// Build from a validated configuration.
    pub fn from_config(
        config: &RestconfConfig,
        backend: Arc<dyn RestconfBackend>,
        registry: Arc<StreamRegistry>,
    ) -> Self {
        let overrides = config
            .endpoint
            .error_tag_overrides
            .iter()
            .filter_map(|(tag, status)| {
                let tag = tag.parse::<ErrorTag>().ok()?;
                StatusCode::from_u16(*status).ok().map(|status| (tag, status))
            })
            .collect();
        Self {
            backend,
            registry,
            default_encoding: config.endpoint.default_encoding,
            pretty_print: PrettyPrint(config.endpoint.pretty_print),
            error_tags: ErrorTagMapping::new(config.endpoint.error_tag_mapping, overrides),
            base_path: config.endpoint.base_path.trim_end_matches('/').to_owned(),
            sse: SseSettings {
                heartbeat_interval: Duration::from_millis(config.sse.heartbeat_interval_ms),
                maximum_fragment_length: config.sse.maximum_fragment_length,
                channel_capacity: config.sse.channel_capacity,
            },
            max_body_size: config.security.max_body_size,
        }
    }

    /// Segments of the base path.
    pub fn base_segments(&self) -> impl Iterator<Item = &str> {
        self.base_path.split('/').filter(|segment| !segment.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    #[test]
    fn test_from_config() {
        let mut config = RestconfConfig::default();
        config.endpoint.base_path = "/rests/api".into();
        config.endpoint.error_tag_overrides.insert("data-missing".into(), 404);
        config.sse.heartbeat_interval_ms = 250;

        let invariants = EndpointInvariants::from_config(
            &config,
            Arc::new(MemoryBackend::new()),
            Arc::new(StreamRegistry::new()),
        );
        assert_eq!(invariants.base_segments().collect::<Vec<_>>(), vec!["rests", "api"]);
        assert_eq!(invariants.sse.heartbeat_interval, Duration::from_millis(250));
        assert_eq!(
            invariants.error_tags.status_of(ErrorTag::DataMissing),
            StatusCode::NOT_FOUND
        );
    }
}
