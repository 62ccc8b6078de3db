//! Name → proxy map with bulk lifecycle control.
//!
//! # Responsibilities
//! - Enforce unique proxy names
//! - Merge per-proxy options over the registry's defaults
//! - Start/stop every proxy independently of the others
//!
//! The map is safe for concurrent `create`/`get`; the duplicate check and
//! insert happen under the same shard lock.

use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::config::{validate_proxy_config, ProxyDefaults, ProxyOptions};
use crate::proxy::error::ProxyError;
use crate::proxy::instance::Proxy;

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// Registry of named proxies. Clones share the same map.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    proxies: DashMap<String, Proxy>,
    defaults: ArcSwap<ProxyDefaults>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(defaults: ProxyDefaults) -> Self {
        let registry = Self::new();
        registry.inner.defaults.store(Arc::new(defaults));
        registry
    }

    /// The process-wide registry.
    pub fn global() -> &'static Registry {
        GLOBAL.get_or_init(Registry::new)
    }

    /// Current defaults used by [`Registry::create`].
    pub fn defaults(&self) -> ProxyDefaults {
        (**self.inner.defaults.load()).clone()
    }

    /// Adjust the defaults for proxies created from now on.
    pub fn configure<F>(&self, mut f: F)
    where
        F: FnMut(&mut ProxyDefaults),
    {
        self.inner.defaults.rcu(|current| {
            let mut next = (**current).clone();
            f(&mut next);
            next
        });
    }

    /// Register a new proxy, starting it when `auto_start` resolves to true.
    ///
    /// Fails with [`ProxyError::DuplicateName`] without touching the
    /// existing proxy, whatever `options` holds. If auto-start fails the
    /// proxy stays registered, stopped, and the bind error is returned.
    pub async fn create(&self, name: &str, options: ProxyOptions) -> Result<Proxy, ProxyError> {
        let proxy = match self.inner.proxies.entry(name.to_string()) {
            Entry::Occupied(_) => {
                tracing::warn!(proxy = %name, "Duplicate proxy name rejected");
                return Err(ProxyError::DuplicateName(name.to_string()));
            }
            Entry::Vacant(slot) => {
                let config = options.merge(&self.inner.defaults.load());
                validate_proxy_config(name, &config).map_err(|errors| ProxyError::InvalidConfig {
                    name: name.to_string(),
                    errors,
                })?;
                let proxy = Proxy::new(name, config);
                slot.insert(proxy.clone());
                proxy
            }
        };

        tracing::info!(
            proxy = %name,
            listen_port = proxy.config().listen_port,
            backend = %proxy.config().backend_address(),
            "Proxy registered"
        );

        if proxy.config().auto_start {
            proxy.start().await?;
        }
        Ok(proxy)
    }

    pub fn get(&self, name: &str) -> Option<Proxy> {
        self.inner.proxies.get(name).map(|entry| entry.value().clone())
    }

    /// Stop and unregister a proxy.
    pub async fn remove(&self, name: &str) -> Result<Proxy, ProxyError> {
        let (_, proxy) = self
            .inner
            .proxies
            .remove(name)
            .ok_or_else(|| ProxyError::NotFound(name.to_string()))?;
        proxy.stop().await;
        tracing::info!(proxy = %name, "Proxy removed");
        Ok(proxy)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.proxies.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Snapshot of every registered proxy, sorted by name.
    pub fn proxies(&self) -> Vec<Proxy> {
        let mut proxies: Vec<Proxy> = self.inner.proxies.iter().map(|e| e.value().clone()).collect();
        proxies.sort_by(|a, b| a.name().cmp(b.name()));
        proxies
    }

    pub fn len(&self) -> usize {
        self.inner.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.proxies.is_empty()
    }

    /// Start every proxy. Each is attempted regardless of earlier failures;
    /// the failures are returned by name.
    pub async fn start_all(&self) -> Vec<(String, ProxyError)> {
        let mut failures = Vec::new();
        for proxy in self.proxies() {
            if let Err(e) = proxy.start().await {
                tracing::error!(proxy = %proxy.name(), error = %e, "Proxy failed to start");
                failures.push((proxy.name().to_string(), e));
            }
        }
        failures
    }

    /// Stop every proxy.
    pub async fn stop_all(&self) {
        for proxy in self.proxies() {
            proxy.stop().await;
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("proxies", &self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::instance::ProxyState;

    fn loopback(port: u16) -> ProxyOptions {
        ProxyOptions {
            listen_address: Some("127.0.0.1".into()),
            listen_port: Some(port),
            ..ProxyOptions::default()
        }
    }

    #[tokio::test]
    async fn create_merges_defaults() {
        let registry = Registry::with_defaults(ProxyDefaults {
            host_address: "upstream".into(),
            host_port: 8080,
            ..ProxyDefaults::default()
        });
        let proxy = registry.create("api", loopback(0)).await.unwrap();

        assert_eq!(proxy.config().host_address, "upstream");
        assert_eq!(proxy.config().host_port, 8080);
        assert_eq!(proxy.state().await, ProxyState::Stopped);
        assert!(registry.get("api").is_some());
        assert!(registry.get("web").is_none());
    }

    #[tokio::test]
    async fn duplicate_name_leaves_first_untouched() {
        let registry = Registry::new();
        let first = registry
            .create(
                "api",
                ProxyOptions {
                    host_address: Some("first".into()),
                    ..loopback(0)
                },
            )
            .await
            .unwrap();
        first.start().await.unwrap();
        let addr = first.local_addr().await;

        let err = registry
            .create(
                "api",
                ProxyOptions {
                    host_address: Some("second".into()),
                    auto_start: Some(true),
                    ..loopback(0)
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::DuplicateName(ref n) if n == "api"));

        let stored = registry.get("api").unwrap();
        assert_eq!(stored.config().host_address, "first");
        assert_eq!(stored.local_addr().await, addr);
        assert_eq!(registry.len(), 1);
        registry.stop_all().await;
    }

    #[tokio::test]
    async fn duplicate_name_wins_over_invalid_options() {
        let registry = Registry::new();
        registry.create("api", loopback(0)).await.unwrap();

        let err = registry
            .create(
                "api",
                ProxyOptions {
                    host_port: Some(0),
                    ..loopback(0)
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::DuplicateName(ref n) if n == "api"));
        assert_eq!(registry.get("api").unwrap().config().host_port, 80);
    }

    #[tokio::test]
    async fn auto_start_runs_immediately() {
        let registry = Registry::new();
        let proxy = registry
            .create(
                "api",
                ProxyOptions {
                    auto_start: Some(true),
                    ..loopback(0)
                },
            )
            .await
            .unwrap();
        assert!(proxy.is_running().await);
        registry.stop_all().await;
        assert!(!proxy.is_running().await);
    }

    #[tokio::test]
    async fn configure_changes_later_defaults() {
        let registry = Registry::new();
        registry.configure(|defaults| defaults.host_port = 9000);
        let proxy = registry.create("api", loopback(0)).await.unwrap();
        assert_eq!(proxy.config().host_port, 9000);
        assert_eq!(registry.defaults().host_port, 9000);
    }

    #[tokio::test]
    async fn invalid_options_are_rejected() {
        let registry = Registry::new();
        let err = registry
            .create(
                "api",
                ProxyOptions {
                    host_port: Some(0),
                    ..loopback(0)
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::InvalidConfig { .. }));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn start_all_attempts_every_proxy() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let taken_port = taken.local_addr().unwrap().port();

        let registry = Registry::new();
        registry.create("a", loopback(0)).await.unwrap();
        registry.create("b", loopback(taken_port)).await.unwrap();
        registry.create("c", loopback(0)).await.unwrap();

        let failures = registry.start_all().await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "b");
        assert!(registry.get("a").unwrap().is_running().await);
        assert!(registry.get("c").unwrap().is_running().await);

        registry.stop_all().await;
        for proxy in registry.proxies() {
            assert!(!proxy.is_running().await);
        }
    }

    #[tokio::test]
    async fn remove_stops_and_unregisters() {
        let registry = Registry::new();
        let proxy = registry.create("api", loopback(0)).await.unwrap();
        proxy.start().await.unwrap();

        let removed = registry.remove("api").await.unwrap();
        assert!(!removed.is_running().await);
        assert!(registry.get("api").is_none());
        assert!(matches!(registry.remove("api").await, Err(ProxyError::NotFound(_))));
    }

    #[tokio::test]
    async fn concurrent_creates_admit_one_winner() {
        let registry = Registry::new();
        let attempts: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.create("shared", loopback(0)).await.is_ok() })
            })
            .collect();

        let mut winners = 0;
        for attempt in attempts {
            if attempt.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(registry.names(), vec!["shared".to_string()]);
    }

    #[test]
    fn global_is_shared() {
        assert!(std::ptr::eq(Registry::global(), Registry::global()));
    }
}
