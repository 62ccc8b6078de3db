//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy
//! host. All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration loaded from a settings file.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Settings {
    /// Process-wide defaults merged under every proxy's options.
    pub defaults: ProxyDefaults,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Named proxy instances.
    pub proxies: BTreeMap<String, ProxyOptions>,
}

/// Process-wide defaults for new proxies.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProxyDefaults {
    /// Port the proxy listens on.
    #[serde(alias = "listenPort")]
    pub listen_port: u16,

    /// Backend host every transaction connects to.
    #[serde(alias = "hostAddress")]
    pub host_address: String,

    /// Backend port.
    #[serde(alias = "hostPort")]
    pub host_port: u16,

    /// Start the proxy as soon as it is created.
    #[serde(alias = "autoStart")]
    pub auto_start: bool,

    /// Interface the listener binds to.
    #[serde(alias = "listenAddress")]
    pub listen_address: String,

    /// Maximum concurrent transactions per proxy (backpressure).
    #[serde(alias = "maxConnections")]
    pub max_connections: usize,

    /// Optional deadlines; unset means unbounded.
    pub timeouts: TimeoutConfig,
}

impl Default for ProxyDefaults {
    fn default() -> Self {
        Self {
            listen_port: 3000,
            host_address: "localhost".to_string(),
            host_port: 80,
            auto_start: false,
            listen_address: "0.0.0.0".to_string(),
            max_connections: 10_000,
            timeouts: TimeoutConfig::default(),
        }
    }
}

/// Per-proxy options. Anything left out falls back to [`ProxyDefaults`].
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ProxyOptions {
    #[serde(alias = "listenPort")]
    pub listen_port: Option<u16>,

    #[serde(alias = "hostAddress")]
    pub host_address: Option<String>,

    #[serde(alias = "hostPort")]
    pub host_port: Option<u16>,

    #[serde(alias = "autoStart")]
    pub auto_start: Option<bool>,

    #[serde(alias = "listenAddress")]
    pub listen_address: Option<String>,

    #[serde(alias = "maxConnections")]
    pub max_connections: Option<usize>,

    pub timeouts: Option<TimeoutConfig>,
}

impl ProxyOptions {
    /// Resolve these options against `defaults`.
    pub fn merge(&self, defaults: &ProxyDefaults) -> ProxyConfig {
        ProxyConfig {
            listen_port: self.listen_port.unwrap_or(defaults.listen_port),
            host_address: self
                .host_address
                .clone()
                .unwrap_or_else(|| defaults.host_address.clone()),
            host_port: self.host_port.unwrap_or(defaults.host_port),
            auto_start: self.auto_start.unwrap_or(defaults.auto_start),
            listen_address: self
                .listen_address
                .clone()
                .unwrap_or_else(|| defaults.listen_address.clone()),
            max_connections: self.max_connections.unwrap_or(defaults.max_connections),
            timeouts: self
                .timeouts
                .clone()
                .unwrap_or_else(|| defaults.timeouts.clone()),
        }
    }
}

/// Fully resolved configuration of one proxy.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProxyConfig {
    pub listen_port: u16,
    pub host_address: String,
    pub host_port: u16,
    pub auto_start: bool,
    pub listen_address: String,
    pub max_connections: usize,
    pub timeouts: TimeoutConfig,
}

impl ProxyConfig {
    /// `host:port` of the backend.
    pub fn backend_address(&self) -> String {
        format!("{}:{}", self.host_address, self.host_port)
    }

    /// `address:port` the listener binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listen_address, self.listen_port)
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        ProxyOptions::default().merge(&ProxyDefaults::default())
    }
}

/// Deadlines for backend connect and per-message read/write.
///
/// Every field is optional; an unset deadline keeps the unbounded blocking
/// behaviour.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Backend connection establishment, in seconds.
    pub connect_secs: Option<u64>,

    /// Reading one whole message, in seconds.
    pub read_secs: Option<u64>,

    /// Writing one whole message, in seconds.
    pub write_secs: Option<u64>,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Option<Duration> {
        self.connect_secs.map(Duration::from_secs)
    }

    pub fn read(&self) -> Option<Duration> {
        self.read_secs.map(Duration::from_secs)
    }

    pub fn write(&self) -> Option<Duration> {
        self.write_secs.map(Duration::from_secs)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ProxyConfig::default();
        assert_eq!(config.listen_port, 3000);
        assert_eq!(config.host_address, "localhost");
        assert_eq!(config.host_port, 80);
        assert!(!config.auto_start);
        assert_eq!(config.timeouts.read(), None);
    }

    #[test]
    fn options_override_defaults() {
        let defaults = ProxyDefaults {
            host_port: 8080,
            ..ProxyDefaults::default()
        };
        let options = ProxyOptions {
            listen_port: Some(4000),
            host_address: Some("example.com".into()),
            ..ProxyOptions::default()
        };

        let config = options.merge(&defaults);
        assert_eq!(config.listen_port, 4000);
        assert_eq!(config.host_address, "example.com");
        assert_eq!(config.host_port, 8080);
        assert_eq!(config.backend_address(), "example.com:8080");
        assert_eq!(config.bind_address(), "0.0.0.0:4000");
    }

    #[test]
    fn parses_toml_with_camel_case_aliases() {
        let settings: Settings = toml::from_str(
            r#"
            [defaults]
            hostAddress = "upstream.local"

            [defaults.timeouts]
            read_secs = 30

            [proxies.api]
            listenPort = 4000
            autoStart = true

            [proxies.web]
            listen_port = 4001
            host_port = 8080
            "#,
        )
        .unwrap();

        assert_eq!(settings.proxies.len(), 2);
        let api = settings.proxies["api"].merge(&settings.defaults);
        assert_eq!(api.listen_port, 4000);
        assert!(api.auto_start);
        assert_eq!(api.host_address, "upstream.local");
        assert_eq!(api.timeouts.read(), Some(Duration::from_secs(30)));

        let web = settings.proxies["web"].merge(&settings.defaults);
        assert_eq!(web.host_port, 8080);
        assert!(!web.auto_start);
    }
}
