//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap backend connect and message read/write with an optional deadline
//! - Leave the operation unbounded when no deadline is configured
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors

use std::future::Future;
use std::time::Duration;

use tokio::time::error::Elapsed;

/// Run `future` under `limit`, or to completion when `limit` is `None`.
pub async fn within<F>(limit: Option<Duration>, future: F) -> Result<F::Output, Elapsed>
where
    F: Future,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, future).await,
        None => Ok(future.await),
    }
}
