//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load settings → configure registry defaults → create proxies
//!
//! Shutdown (shutdown.rs):
//!     stop() → signal accept loop → listener dropped
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → host stops every proxy
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
pub use startup::{boot, Booted};
