//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Transaction I/O:
//!     → timeouts.rs (optional connect/read/write deadline)
//!     → on expiry: transaction fails, sockets closed
//! ```
//!
//! # Design Decisions
//! - No deadline unless one is configured; reads block as long as the peer does
//! - A deadline fails only the transaction that hit it

pub mod timeouts;
