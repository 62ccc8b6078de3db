//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! settings file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → Settings { defaults, observability, proxies }
//!     → ProxyOptions::merge(defaults) → ProxyConfig per proxy
//! ```
//!
//! # Design Decisions
//! - Config is immutable once a proxy is created
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{ObservabilityConfig, ProxyConfig, ProxyDefaults, ProxyOptions, Settings, TimeoutConfig};
pub use validation::{validate_proxy_config, validate_settings, ValidationError};
