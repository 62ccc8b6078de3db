//! Errors surfaced by proxy and registry operations.
//!
//! Per-exchange failures never appear here; they end the owning
//! transaction (see `TransactionError`).

use crate::config::ValidationError;
use crate::net::ListenerError;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// A proxy with this name is already registered.
    #[error("a proxy named `{0}` is already registered")]
    DuplicateName(String),

    #[error("no proxy named `{0}` is registered")]
    NotFound(String),

    #[error("invalid configuration for proxy `{name}`: {}", .errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    InvalidConfig {
        name: String,
        errors: Vec<ValidationError>,
    },

    #[error("proxy `{name}` could not start: {source}")]
    Bind {
        name: String,
        #[source]
        source: ListenerError,
    },
}
