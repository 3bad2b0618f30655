//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the tunnel.
//! All types derive Serde traits for deserialization from config files, and
//! every section has defaults so a minimal config (or none at all) works.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the tunnel binary.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TunnelConfig {
    /// Server-mode settings.
    pub server: ServerConfig,

    /// Client-mode settings.
    pub client: ClientConfig,

    /// Protocol timing knobs shared by both modes.
    pub timeouts: TimeoutConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Server-mode configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address for the upload/download endpoints (e.g. "0.0.0.0:8080").
    pub bind_address: String,

    /// Shared secret clients must present as a bearer token.
    pub secret: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            secret: String::new(),
        }
    }
}

/// Client-mode configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Local bind address for the tunnel entry listener.
    pub bind_address: String,

    /// Upload endpoint URL on the tunnel server.
    pub upload_url: String,

    /// Download endpoint URL on the tunnel server.
    pub download_url: String,

    /// Destination address the server dials per tunneled connection
    /// (host:port).
    pub target_address: String,

    /// Shared secret presented on every request.
    pub secret: String,

    /// Maximum concurrent local connections (backpressure).
    pub max_connections: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:1080".to_string(),
            upload_url: String::new(),
            download_url: String::new(),
            target_address: String::new(),
            secret: String::new(),
            max_connections: 1024,
        }
    }
}

/// Timing configuration for the tunnel protocol.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Destination dial timeout in seconds (sequence-0 uploads).
    pub dial_secs: u64,

    /// Idle threshold in seconds, also the reaper sweep period. Must sit
    /// under the idle-timeout ceiling of whatever intermediary fronts the
    /// server (~100s for common CDNs).
    pub idle_secs: u64,

    /// How long a download request waits for its racing sequence-0 upload
    /// to create the session, in seconds.
    pub session_wait_secs: u64,

    /// Head start the client gives the sequence-0 upload before issuing
    /// the download request, in milliseconds.
    pub download_delay_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            dial_secs: 5,
            idle_secs: 90,
            session_wait_secs: 10,
            download_delay_ms: 500,
        }
    }
}

impl TimeoutConfig {
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_secs)
    }

    pub fn idle_threshold(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }

    pub fn session_wait(&self) -> Duration {
        Duration::from_secs(self.session_wait_secs)
    }

    pub fn download_delay(&self) -> Duration {
        Duration::from_millis(self.download_delay_ms)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level fallback when RUST_LOG is unset (trace, debug, info, warn,
    /// error).
    pub log_level: String,

    /// Enable the Prometheus metrics exporter.
    pub metrics_enabled: bool,

    /// Metrics exporter bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
