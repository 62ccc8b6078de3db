//! Per-proxy bookkeeping of running transactions.
//!
//! Each accepted connection gets a [`TransactionId`] for log correlation and
//! a [`TransactionGuard`] that keeps it counted as in flight. The guard
//! publishes the `intercept_active_transactions` gauge when taken and when
//! dropped, so the gauge stays correct when a transaction task unwinds.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::observability::metrics;

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique transaction number, shown as `txn-N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(u64);

impl TransactionId {
    pub fn next() -> Self {
        Self(NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}

/// In-flight transaction count for one proxy. Clones share the count.
#[derive(Debug, Clone)]
pub struct TransactionTracker {
    proxy: Arc<str>,
    state: Arc<TrackerState>,
}

#[derive(Debug, Default)]
struct TrackerState {
    in_flight: AtomicU64,
    idle: Notify,
}

impl TransactionTracker {
    /// Tracker whose gauge is labelled with `proxy`.
    pub fn new(proxy: &str) -> Self {
        Self {
            proxy: Arc::from(proxy),
            state: Arc::default(),
        }
    }

    /// Count a new transaction until the returned guard drops.
    pub fn track(&self) -> TransactionGuard {
        let in_flight = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::record_active_transactions(&self.proxy, in_flight);
        TransactionGuard {
            tracker: self.clone(),
            id: TransactionId::next(),
        }
    }

    pub fn active_count(&self) -> u64 {
        self.state.in_flight.load(Ordering::SeqCst)
    }

    /// Resolve once no transaction is in flight.
    pub async fn wait_until_idle(&self) {
        loop {
            let idle = self.state.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();
            if self.active_count() == 0 {
                return;
            }
            idle.await;
        }
    }
}

/// Keeps one transaction counted as in flight.
#[derive(Debug)]
pub struct TransactionGuard {
    tracker: TransactionTracker,
    id: TransactionId,
}

impl TransactionGuard {
    pub fn id(&self) -> TransactionId {
        self.id
    }
}

impl Drop for TransactionGuard {
    fn drop(&mut self) {
        let state = &self.tracker.state;
        let remaining = state.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::record_active_transactions(&self.tracker.proxy, remaining);
        if remaining == 0 {
            state.idle.notify_waiters();
        }
        tracing::trace!(transaction_id = %self.id, remaining, "Transaction released");
    }
}
