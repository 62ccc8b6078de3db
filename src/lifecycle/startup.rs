//! Boot proxies from loaded settings.
//!
//! # Design Decisions
//! - Configuration errors (duplicate name, invalid options) abort the boot
//! - A proxy whose auto-start cannot bind stays registered; the failure is
//!   reported and the remaining proxies are still created
//! - Proxies are created in name order

use crate::config::Settings;
use crate::proxy::{Proxy, ProxyError, Registry};

/// Outcome of [`boot`].
#[derive(Debug, Default)]
pub struct Booted {
    /// Every proxy created, in name order.
    pub proxies: Vec<Proxy>,
    /// Auto-start failures by proxy name.
    pub start_failures: Vec<(String, ProxyError)>,
}

/// Install `settings.defaults` on `registry` and create every configured proxy.
pub async fn boot(registry: &Registry, settings: &Settings) -> Result<Booted, ProxyError> {
    let defaults = settings.defaults.clone();
    registry.configure(|current| *current = defaults.clone());

    let mut booted = Booted::default();
    for (name, options) in &settings.proxies {
        match registry.create(name, options.clone()).await {
            Ok(proxy) => booted.proxies.push(proxy),
            Err(e @ ProxyError::Bind { .. }) => {
                tracing::error!(proxy = %name, error = %e, "Auto-start failed");
                booted.proxies.extend(registry.get(name));
                booted.start_failures.push((name.clone(), e));
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(
        proxies = booted.proxies.len(),
        start_failures = booted.start_failures.len(),
        "Boot complete"
    );
    Ok(booted)
}
