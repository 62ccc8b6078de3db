//! Intercepting proxy subsystem.
//!
//! # Data Flow
//! ```text
//! Registry::create(name, options)
//!     → instance.rs (Proxy: bind listener, accept loop)
//!     → transaction.rs (one task per accepted connection)
//!         → connect backend
//!         → read request → observers(Request) → write to backend
//!         → read response → observers(Response) → write to client
//!         → close both sockets
//! ```
//!
//! # Design Decisions
//! - One tokio task per connection; a failing transaction never reaches
//!   the accept loop or its siblings
//! - Observers are plain synchronous callbacks with exclusive access to
//!   the transaction while they run
//! - Stopping a proxy only closes its listener

pub mod error;
pub mod instance;
pub mod observer;
pub mod registry;
pub mod transaction;

pub use error::ProxyError;
pub use instance::{Proxy, ProxyState};
pub use observer::{Observer, ParsePhaseError, Phase};
pub use registry::Registry;
pub use transaction::{Transaction, TransactionError, TransactionState, ACCEPT_ENCODING};
