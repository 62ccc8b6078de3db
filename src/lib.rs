//! HTTP/1.x intercepting forward proxy library.
//!
//! A host process registers named proxies in a [`Registry`]. Each proxy
//! listens on a TCP port and forwards every accepted connection's single
//! request/response exchange to one configured backend, calling
//! registered observers so they can inspect or rewrite the request before
//! it is forwarded and the response before it is returned.
//!
//! ```no_run
//! use intercept_proxy::{ProxyOptions, Registry, Transaction};
//!
//! # async fn demo() -> Result<(), intercept_proxy::ProxyError> {
//! let registry = Registry::new();
//! let proxy = registry
//!     .create(
//!         "api",
//!         ProxyOptions {
//!             listen_port: Some(4000),
//!             host_address: Some("127.0.0.1".into()),
//!             host_port: Some(8080),
//!             ..ProxyOptions::default()
//!         },
//!     )
//!     .await?;
//!
//! proxy.on_request(|txn: &mut Transaction| txn.request.set_header("X-Intercepted", "1"));
//! proxy.on_response(|txn: &mut Transaction| {
//!     txn.response.set_start_line("HTTP/1.1 503 Service Unavailable");
//! });
//! proxy.start().await?;
//! # Ok(())
//! # }
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod proxy;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::{ProxyConfig, ProxyDefaults, ProxyOptions, Settings};
pub use http::{Message, MessageKind};
pub use proxy::{Observer, Phase, Proxy, ProxyError, ProxyState, Registry, Transaction, TransactionState};
