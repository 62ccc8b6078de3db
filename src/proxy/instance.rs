//! A named proxy instance: listener lifecycle, accept loop and observers.
//!
//! # Lifecycle
//! ```text
//! Stopped ──start()──▶ Running ──stop()──▶ Stopped
//! ```
//! `start` on a running proxy and `stop` on a stopped one are no-ops.
//! Stopping closes the listener only; transactions already accepted run
//! to completion on their own tasks.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::ProxyConfig;
use crate::lifecycle::Shutdown;
use crate::net::{ConnectionPermit, Listener, TransactionTracker};
use crate::proxy::error::ProxyError;
use crate::proxy::observer::{Observer, Observers, Phase};
use crate::proxy::transaction::Transaction;

/// Delay before retrying after a failed accept (e.g. descriptor exhaustion).
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Whether a proxy is accepting connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    Stopped,
    Running,
}

/// Handle to a proxy instance. Clones share the same instance.
#[derive(Clone)]
pub struct Proxy {
    inner: Arc<ProxyInner>,
}

struct ProxyInner {
    name: String,
    config: ProxyConfig,
    observers: Observers,
    tracker: TransactionTracker,
    runtime: Mutex<Runtime>,
}

enum Runtime {
    Stopped,
    Running(RunningListener),
}

struct RunningListener {
    local_addr: SocketAddr,
    shutdown: Shutdown,
    accept_task: JoinHandle<()>,
}

impl Proxy {
    /// Create a stopped proxy.
    pub fn new(name: impl Into<String>, config: ProxyConfig) -> Self {
        let name = name.into();
        Self {
            inner: Arc::new(ProxyInner {
                tracker: TransactionTracker::new(&name),
                name,
                config,
                observers: Observers::new(),
                runtime: Mutex::new(Runtime::Stopped),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.inner.config
    }

    pub async fn state(&self) -> ProxyState {
        match *self.inner.runtime.lock().await {
            Runtime::Stopped => ProxyState::Stopped,
            Runtime::Running(_) => ProxyState::Running,
        }
    }

    pub async fn is_running(&self) -> bool {
        self.state().await == ProxyState::Running
    }

    /// Address the listener is bound to, while running.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        match &*self.inner.runtime.lock().await {
            Runtime::Running(running) => Some(running.local_addr),
            Runtime::Stopped => None,
        }
    }

    /// Bind the listener and start accepting. No-op if already running.
    pub async fn start(&self) -> Result<(), ProxyError> {
        let mut runtime = self.inner.runtime.lock().await;
        if matches!(*runtime, Runtime::Running(_)) {
            tracing::debug!(proxy = %self.name(), "Proxy already running");
            return Ok(());
        }

        let bind_error = |source| ProxyError::Bind {
            name: self.name().to_string(),
            source,
        };
        let listener = Listener::bind(self.config()).await.map_err(bind_error)?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| bind_error(crate::net::ListenerError::Bind(self.config().bind_address(), e)))?;

        let shutdown = Shutdown::new();
        let accept_task = tokio::spawn(accept_loop(self.clone(), listener, shutdown.subscribe()));

        tracing::info!(
            proxy = %self.name(),
            address = %local_addr,
            backend = %self.config().backend_address(),
            "Proxy started"
        );

        *runtime = Runtime::Running(RunningListener {
            local_addr,
            shutdown,
            accept_task,
        });
        Ok(())
    }

    /// Close the listener. No-op if already stopped.
    pub async fn stop(&self) {
        let mut runtime = self.inner.runtime.lock().await;
        let running = match std::mem::replace(&mut *runtime, Runtime::Stopped) {
            Runtime::Running(running) => running,
            Runtime::Stopped => return,
        };

        running.shutdown.trigger();
        if let Err(e) = running.accept_task.await {
            tracing::error!(proxy = %self.name(), error = %e, "Accept loop terminated abnormally");
        }

        tracing::info!(
            proxy = %self.name(),
            in_flight = self.active_transactions(),
            "Proxy stopped"
        );
    }

    /// Register an observer for `phase`. Safe while running.
    pub fn on<O: Observer>(&self, phase: Phase, observer: O) {
        self.inner.observers.register(phase, Arc::new(observer));
        tracing::debug!(
            proxy = %self.name(),
            phase = %phase,
            count = self.inner.observers.len(phase),
            "Observer registered"
        );
    }

    pub fn on_request<O: Observer>(&self, observer: O) {
        self.on(Phase::Request, observer);
    }

    pub fn on_response<O: Observer>(&self, observer: O) {
        self.on(Phase::Response, observer);
    }

    /// Call every `phase` observer with `transaction`, in registration order.
    pub fn notify(&self, phase: Phase, transaction: &mut Transaction) {
        self.inner.observers.notify(phase, transaction);
    }

    pub fn observer_count(&self, phase: Phase) -> usize {
        self.inner.observers.len(phase)
    }

    /// Transactions currently in flight.
    pub fn active_transactions(&self) -> u64 {
        self.inner.tracker.active_count()
    }

    /// Wait until every in-flight transaction has finished.
    pub async fn wait_until_idle(&self) {
        self.inner.tracker.wait_until_idle().await;
    }

    fn spawn_transaction(&self, stream: TcpStream, peer_addr: SocketAddr, permit: ConnectionPermit) {
        let guard = self.inner.tracker.track();
        let id = guard.id();

        let span = tracing::info_span!(
            "transaction",
            proxy = %self.name(),
            transaction_id = %id,
            peer_addr = %peer_addr
        );
        let transaction = Transaction::new(self.clone(), id, stream, peer_addr);

        // Both are released on unwind too.
        tokio::spawn(
            async move {
                let _guard = guard;
                let _permit = permit;
                transaction.run().await;
            }
            .instrument(span),
        );
    }
}

impl std::fmt::Debug for Proxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proxy")
            .field("name", &self.inner.name)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

async fn accept_loop(proxy: Proxy, listener: Listener, mut shutdown: broadcast::Receiver<()>) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer_addr, permit)) => proxy.spawn_transaction(stream, peer_addr, permit),
                Err(e) => {
                    tracing::warn!(proxy = %proxy.name(), error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            },
        }
    }
    tracing::debug!(proxy = %proxy.name(), "Accept loop exited");
}
