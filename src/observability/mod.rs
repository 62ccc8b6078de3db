//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Proxy / Transaction events:
//!     → logging.rs (tracing subscriber, per-transaction spans)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout log lines
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
