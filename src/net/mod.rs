//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, connection permits)
//!     → connection.rs (transaction id, in-flight tracking)
//!     → Hand off to a Transaction task
//! ```
//!
//! # Design Decisions
//! - Bounded accept prevents resource exhaustion
//! - Each transaction tracked so shutdown can drain in-flight work

pub mod connection;
pub mod listener;

pub use connection::{TransactionGuard, TransactionId, TransactionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError};
