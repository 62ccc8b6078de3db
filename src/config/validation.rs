//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ports, limits, deadlines)
//! - Detect proxies competing for the same listen socket
//!
//! Every error is collected; validation never stops at the first one.

use std::collections::HashMap;

use crate::config::schema::{ProxyConfig, Settings};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending key.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a whole settings file.
pub fn validate_settings(settings: &Settings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut bound: HashMap<(String, u16), &str> = HashMap::new();

    for (name, options) in &settings.proxies {
        let config = options.merge(&settings.defaults);
        collect_proxy_errors(&format!("proxies.{}", name), &config, &mut errors);

        if config.listen_port == 0 {
            continue;
        }
        let key = (config.listen_address.clone(), config.listen_port);
        if let Some(other) = bound.insert(key, name) {
            errors.push(ValidationError::new(
                format!("proxies.{}.listen_port", name),
                format!("port {} already used by proxy `{}`", config.listen_port, other),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate one resolved proxy configuration.
pub fn validate_proxy_config(name: &str, config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    collect_proxy_errors(name, config, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn collect_proxy_errors(prefix: &str, config: &ProxyConfig, errors: &mut Vec<ValidationError>) {
    if config.host_address.trim().is_empty() {
        errors.push(ValidationError::new(
            format!("{}.host_address", prefix),
            "must not be empty",
        ));
    }
    if config.host_port == 0 {
        errors.push(ValidationError::new(format!("{}.host_port", prefix), "must be non-zero"));
    }
    if config.listen_address.trim().is_empty() {
        errors.push(ValidationError::new(
            format!("{}.listen_address", prefix),
            "must not be empty",
        ));
    }
    if config.max_connections == 0 {
        errors.push(ValidationError::new(
            format!("{}.max_connections", prefix),
            "must be at least 1",
        ));
    }

    let timeouts = [
        ("connect_secs", config.timeouts.connect_secs),
        ("read_secs", config.timeouts.read_secs),
        ("write_secs", config.timeouts.write_secs),
    ];
    for (key, value) in timeouts {
        if value == Some(0) {
            errors.push(ValidationError::new(
                format!("{}.timeouts.{}", prefix, key),
                "must be greater than zero when set",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ProxyOptions;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_proxy_config("p", &ProxyConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = ProxyConfig::default();
        config.host_address = " ".into();
        config.host_port = 0;
        config.max_connections = 0;
        config.timeouts.read_secs = Some(0);

        let errors = validate_proxy_config("p", &config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert_eq!(errors[0].to_string(), "p.host_address: must not be empty");
    }

    #[test]
    fn rejects_shared_listen_port() {
        let mut settings = Settings::default();
        for name in ["a", "b"] {
            settings.proxies.insert(
                name.into(),
                ProxyOptions {
                    listen_port: Some(4000),
                    ..ProxyOptions::default()
                },
            );
        }

        let errors = validate_settings(&settings).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "proxies.b.listen_port");
    }

    #[test]
    fn ephemeral_ports_may_repeat() {
        let mut settings = Settings::default();
        for name in ["a", "b"] {
            settings.proxies.insert(
                name.into(),
                ProxyOptions {
                    listen_port: Some(0),
                    ..ProxyOptions::default()
                },
            );
        }
        assert!(validate_settings(&settings).is_ok());
    }
}
