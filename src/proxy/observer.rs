//! Interception callbacks.
//!
//! Observers run synchronously inside the transaction task, in registration
//! order, between reading a message and forwarding it. Each phase keeps a
//! copy-on-write list so registration never blocks or reorders a
//! notification already in progress; an observer registered during a
//! notification is first called on the next one.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::proxy::transaction::Transaction;

/// Interception point within a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// After the client request is read and normalized, before it is sent to the backend.
    Request,
    /// After the backend response is read, before it is sent to the client.
    Response,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Request => f.write_str("request"),
            Phase::Response => f.write_str("response"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown phase `{0}` (expected `request` or `response`)")]
pub struct ParsePhaseError(String);

impl FromStr for Phase {
    type Err = ParsePhaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "request" => Ok(Phase::Request),
            "response" => Ok(Phase::Response),
            _ => Err(ParsePhaseError(s.to_string())),
        }
    }
}

/// A callback that may inspect and mutate a transaction's messages.
pub trait Observer: Send + Sync + 'static {
    fn observe(&self, transaction: &mut Transaction);
}

impl<F> Observer for F
where
    F: Fn(&mut Transaction) + Send + Sync + 'static,
{
    fn observe(&self, transaction: &mut Transaction) {
        self(transaction)
    }
}

type ObserverList = ArcSwap<Vec<Arc<dyn Observer>>>;

/// Ordered observer lists for both phases.
pub(crate) struct Observers {
    request: ObserverList,
    response: ObserverList,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self {
            request: ArcSwap::from_pointee(Vec::new()),
            response: ArcSwap::from_pointee(Vec::new()),
        }
    }

    fn list(&self, phase: Phase) -> &ObserverList {
        match phase {
            Phase::Request => &self.request,
            Phase::Response => &self.response,
        }
    }

    /// Append an observer to the end of `phase`'s list.
    pub(crate) fn register(&self, phase: Phase, observer: Arc<dyn Observer>) {
        self.list(phase).rcu(|current| {
            let mut next = (**current).clone();
            next.push(Arc::clone(&observer));
            next
        });
    }

    /// Call every observer registered for `phase`, in order.
    pub(crate) fn notify(&self, phase: Phase, transaction: &mut Transaction) {
        let snapshot = self.list(phase).load_full();
        for observer in snapshot.iter() {
            observer.observe(transaction);
        }
    }

    pub(crate) fn len(&self, phase: Phase) -> usize {
        self.list(phase).load().len()
    }
}
