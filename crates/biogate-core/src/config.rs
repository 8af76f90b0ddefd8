//! Gateway configuration.
//!
//! Device host/port are read from environment variables once at startup
//! and are immutable for the process lifetime. Everything else has a
//! sensible default overridable through the builder setters.

use std::time::Duration;

/// Environment variable names.
pub mod env_vars {
    /// Device IP address.
    pub const DEVICE_IP: &str = "MB20_DEVICE_IP";
    /// Device TCP port.
    pub const DEVICE_PORT: &str = "MB20_DEVICE_PORT";
    /// Listen address for the HTTP API.
    pub const GATEWAY_ADDR: &str = "MB20_GATEWAY_ADDR";
}

/// Default configuration values.
pub mod defaults {
    pub const DEVICE_IP: &str = "192.168.1.101";
    pub const DEVICE_PORT: u16 = 4370;
    pub const GATEWAY_ADDR: &str = "0.0.0.0:8080";
    /// Per-exchange timeout budget in milliseconds.
    pub const PROTOCOL_TIMEOUT_MS: u64 = 3000;
    /// Health probe interval in seconds.
    pub const PROBE_INTERVAL_SECS: u64 = 5;
    /// Consecutive probe failures before the link is forced down.
    pub const FAILURE_THRESHOLD: u32 = 3;
    /// Window for suppressing resent pushes, in milliseconds.
    pub const DEDUP_WINDOW_MS: u64 = 2000;
    /// Per-subscriber backlog capacity.
    pub const BACKLOG_CAPACITY: usize = 256;
}

/// Configuration for one gateway instance.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Device host (IP or hostname).
    pub device_host: String,
    /// Device TCP port.
    pub device_port: u16,
    /// Timeout budget for connect/send/probe operations.
    pub protocol_timeout: Duration,
    /// Health probe interval.
    pub probe_interval: Duration,
    /// Consecutive probe failures before forcing the link down.
    pub failure_threshold: u32,
    /// Duplicate push suppression window.
    pub dedup_window: Duration,
    /// Bounded backlog capacity per subscriber.
    pub backlog_capacity: usize,
    /// HTTP API listen address.
    pub listen_addr: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            device_host: defaults::DEVICE_IP.to_string(),
            device_port: defaults::DEVICE_PORT,
            protocol_timeout: Duration::from_millis(defaults::PROTOCOL_TIMEOUT_MS),
            probe_interval: Duration::from_secs(defaults::PROBE_INTERVAL_SECS),
            failure_threshold: defaults::FAILURE_THRESHOLD,
            dedup_window: Duration::from_millis(defaults::DEDUP_WINDOW_MS),
            backlog_capacity: defaults::BACKLOG_CAPACITY,
            listen_addr: defaults::GATEWAY_ADDR.to_string(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(host) = std::env::var(env_vars::DEVICE_IP) {
            if !host.trim().is_empty() {
                config.device_host = host;
            }
        }
        if let Some(port) = std::env::var(env_vars::DEVICE_PORT)
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.device_port = port;
        }
        if let Ok(addr) = std::env::var(env_vars::GATEWAY_ADDR) {
            if !addr.trim().is_empty() {
                config.listen_addr = addr;
            }
        }
        config
    }

    /// Set the device endpoint.
    pub fn with_device(mut self, host: impl Into<String>, port: u16) -> Self {
        self.device_host = host.into();
        self.device_port = port;
        self
    }

    /// Set the per-exchange timeout budget.
    pub fn with_protocol_timeout(mut self, timeout: Duration) -> Self {
        self.protocol_timeout = timeout;
        self
    }

    /// Set the health probe interval.
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    /// Set the consecutive probe failure threshold.
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set the duplicate push suppression window.
    pub fn with_dedup_window(mut self, window: Duration) -> Self {
        self.dedup_window = window;
        self
    }

    /// Set the per-subscriber backlog capacity.
    pub fn with_backlog_capacity(mut self, capacity: usize) -> Self {
        self.backlog_capacity = capacity;
        self
    }
}
