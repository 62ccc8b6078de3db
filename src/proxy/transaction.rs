//! One request/response exchange.
//!
//! # State machine
//! ```text
//! Created → InRequest → InResponse → Finished
//!    └──────────┴────────────┴──────→ Failed
//! ```
//! - `InRequest`: connect backend, read client request, normalize `host`
//!   and `accept-encoding`, notify request observers, write to backend
//! - `InResponse`: read backend response, notify response observers,
//!   write to client
//! - `Finished`/`Failed`: both sockets shut down and released
//!
//! Steps never overlap. An error fails this transaction only.

use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::http::{read_message, write_message, CodecError, Message, MessageKind};
use crate::net::TransactionId;
use crate::observability::metrics;
use crate::proxy::instance::Proxy;
use crate::proxy::observer::Phase;
use crate::resilience::timeouts::within;

/// Value forced onto every forwarded request's `accept-encoding` header.
pub const ACCEPT_ENCODING: &str = "deflate,sdch";

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Created,
    InRequest,
    InResponse,
    Finished,
    Failed,
}

/// Errors that end a transaction in the `Failed` state.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("failed to connect to backend {address}: {source}")]
    Connection {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("backend socket is not connected")]
    NotConnected,
}

impl TransactionError {
    fn timeout(operation: &'static str, after: Option<Duration>) -> Self {
        TransactionError::Timeout {
            operation,
            after: after.unwrap_or_default(),
        }
    }
}

/// A single proxied exchange, handed to observers by mutable reference.
///
/// `request` and `response` are the messages being forwarded; changes made
/// by an observer are what goes on the wire. The sockets are private to
/// the transaction.
pub struct Transaction {
    id: TransactionId,
    proxy: Proxy,
    peer_addr: SocketAddr,
    state: TransactionState,
    /// Client request; populated once the `request` phase begins.
    pub request: Message,
    /// Backend response; populated once the `response` phase begins.
    pub response: Message,
    client: BufReader<TcpStream>,
    backend: Option<BufReader<TcpStream>>,
}

impl Transaction {
    pub(crate) fn new(proxy: Proxy, id: TransactionId, client: TcpStream, peer_addr: SocketAddr) -> Self {
        Self {
            id,
            proxy,
            peer_addr,
            state: TransactionState::Created,
            request: Message::default(),
            response: Message::new(MessageKind::Response, ""),
            client: BufReader::new(client),
            backend: None,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// The proxy this transaction belongs to.
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    /// Address of the connected client.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn in_request(&self) -> bool {
        self.state == TransactionState::InRequest
    }

    pub fn in_response(&self) -> bool {
        self.state == TransactionState::InResponse
    }

    /// Drive the exchange to completion and release both sockets.
    pub(crate) async fn run(mut self) -> TransactionState {
        let started = Instant::now();
        let result = self.exchange().await;
        self.close().await;

        match result {
            Ok(()) => {
                self.state = TransactionState::Finished;
                tracing::debug!(
                    request = %self.request.start_line(),
                    response = %self.response.start_line(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Transaction finished"
                );
                metrics::record_transaction(self.proxy.name(), "finished", started);
            }
            Err(e) => {
                let failed_in = self.state;
                self.state = TransactionState::Failed;
                match &e {
                    TransactionError::Codec(CodecError::ConnectionClosed)
                        if failed_in == TransactionState::InRequest =>
                    {
                        tracing::debug!("Client closed before sending a request");
                    }
                    TransactionError::Codec(CodecError::UnsupportedEncoding(encoding)) => {
                        metrics::record_unsupported_encoding(self.proxy.name());
                        tracing::warn!(
                            state = ?failed_in,
                            encoding = %encoding,
                            "Body not forwarded: unsupported transfer-encoding"
                        );
                    }
                    _ => tracing::warn!(state = ?failed_in, error = %e, "Transaction failed"),
                }
                metrics::record_transaction(self.proxy.name(), "failed", started);
            }
        }

        self.state
    }

    async fn exchange(&mut self) -> Result<(), TransactionError> {
        let timeouts = self.proxy.config().timeouts.clone();
        let (read_limit, write_limit) = (timeouts.read(), timeouts.write());

        self.state = TransactionState::InRequest;
        self.connect_backend(timeouts.connect()).await?;

        let mut request = within(read_limit, read_message(&mut self.client, MessageKind::Request))
            .await
            .map_err(|_| TransactionError::timeout("request read", read_limit))??;
        request.set_header("host", self.proxy.config().host_address.clone());
        request.set_header("accept-encoding", ACCEPT_ENCODING);
        self.request = request;
        tracing::debug!(request = %self.request.start_line(), "Request read");

        let proxy = self.proxy.clone();
        proxy.notify(Phase::Request, self);

        let backend = self.backend.as_mut().ok_or(TransactionError::NotConnected)?;
        within(write_limit, write_message(backend, &self.request))
            .await
            .map_err(|_| TransactionError::timeout("request write", write_limit))??;

        self.state = TransactionState::InResponse;
        let backend = self.backend.as_mut().ok_or(TransactionError::NotConnected)?;
        self.response = within(read_limit, read_message(backend, MessageKind::Response))
            .await
            .map_err(|_| TransactionError::timeout("response read", read_limit))??;
        tracing::debug!(response = %self.response.start_line(), "Response read");

        proxy.notify(Phase::Response, self);

        within(write_limit, write_message(&mut self.client, &self.response))
            .await
            .map_err(|_| TransactionError::timeout("response write", write_limit))??;

        Ok(())
    }

    async fn connect_backend(&mut self, limit: Option<Duration>) -> Result<(), TransactionError> {
        let address = self.proxy.config().backend_address();
        let stream = within(limit, TcpStream::connect(address.as_str()))
            .await
            .map_err(|_| TransactionError::timeout("backend connect", limit))?
            .map_err(|source| TransactionError::Connection {
                address: address.clone(),
                source,
            })?;

        tracing::debug!(backend = %address, "Backend connected");
        self.backend = Some(BufReader::new(stream));
        Ok(())
    }

    /// Shut down both sockets. Safe to call more than once; the
    /// descriptors themselves are released when the transaction drops.
    async fn close(&mut self) {
        if let Err(e) = self.client.get_mut().shutdown().await {
            tracing::trace!(error = %e, "Client shutdown");
        }
        if let Some(mut backend) = self.backend.take() {
            if let Err(e) = backend.get_mut().shutdown().await {
                tracing::trace!(error = %e, "Backend shutdown");
            }
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("proxy", &self.proxy.name())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
