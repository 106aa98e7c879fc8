//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::backend::ErrorTagTable;
use crate::negotiation::MessageEncoding;

/// Root configuration for the RESTCONF server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RestconfConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// RESTCONF endpoint behaviour.
    pub endpoint: EndpointConfig,

    /// Event stream delivery.
    pub sse: SseConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request limits.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8181").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8181".to_string(),
            tls: None,
            max_connections: 10_000,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Absolute path the API root is served under, e.g. "/restconf".
    pub base_path: String,

    /// Encoding used when the client expresses no preference.
    pub default_encoding: MessageEncoding,

    /// Pretty-print response bodies unless `odl-pretty-print` says otherwise.
    pub pretty_print: bool,

    /// Built-in error-tag to status table.
    pub error_tag_mapping: ErrorTagTable,

    /// Per-tag status overrides, keyed by error-tag name.
    pub error_tag_overrides: HashMap<String, u16>,

    /// Header carrying the authenticated user, set by a fronting proxy.
    pub principal_header: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_path: "/restconf".to_string(),
            default_encoding: MessageEncoding::Json,
            pretty_print: false,
            error_tag_mapping: ErrorTagTable::default(),
            error_tag_overrides: HashMap::new(),
            principal_header: "x-remote-user".to_string(),
        }
    }
}

/// Server-sent events configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SseConfig {
    /// Idle time before a keep-alive comment, in milliseconds (0 = off).
    pub heartbeat_interval_ms: u64,

    /// Maximum `data:` line length in bytes (0 = unlimited).
    pub maximum_fragment_length: usize,

    /// Messages buffered per subscriber before new ones are dropped.
    pub channel_capacity: usize,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 10_000,
            maximum_fragment_length: 0,
            channel_capacity: 256,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub log_json: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
