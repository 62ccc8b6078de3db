//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use intercept_proxy::{Proxy, ProxyOptions, Registry};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// Request as seen by a mock backend.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub request_line: String,
    /// Header names lower-cased.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Start a mock backend that records each request and answers with
/// `response` verbatim before closing the connection.
pub async fn start_mock_backend(response: &'static [u8]) -> (SocketAddr, mpsc::UnboundedReceiver<CapturedRequest>) {
    start_delayed_backend(response, Duration::ZERO).await
}

/// Like [`start_mock_backend`], but waits `delay` before answering.
pub async fn start_delayed_backend(
    response: &'static [u8],
    delay: Duration,
) -> (SocketAddr, mpsc::UnboundedReceiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut socket = BufReader::new(socket);
                if let Some(captured) = capture_request(&mut socket).await {
                    let _ = tx.send(captured);
                }
                tokio::time::sleep(delay).await;
                let _ = socket.get_mut().write_all(response).await;
                let _ = socket.get_mut().shutdown().await;
            });
        }
    });

    (addr, rx)
}

async fn capture_request(socket: &mut BufReader<TcpStream>) -> Option<CapturedRequest> {
    let mut request_line = String::new();
    socket.read_line(&mut request_line).await.ok()?;
    let request_line = request_line.trim_end().to_string();

    let mut headers = HashMap::new();
    loop {
        let mut line = String::new();
        if socket.read_line(&mut line).await.ok()? == 0 {
            return None;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        let (name, value) = line.split_once(':')?;
        headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
    }

    let length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let mut body = vec![0; length];
    socket.read_exact(&mut body).await.ok()?;

    Some(CapturedRequest {
        request_line,
        headers,
        body,
    })
}

/// A port on 127.0.0.1 with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Create and start a loopback proxy forwarding to `backend`.
pub async fn start_proxy(registry: &Registry, name: &str, backend: SocketAddr) -> (Proxy, SocketAddr) {
    let proxy = registry
        .create(
            name,
            ProxyOptions {
                listen_address: Some("127.0.0.1".into()),
                listen_port: Some(0),
                host_address: Some(backend.ip().to_string()),
                host_port: Some(backend.port()),
                ..ProxyOptions::default()
            },
        )
        .await
        .unwrap();
    proxy.start().await.unwrap();
    let addr = proxy.local_addr().await.unwrap();
    (proxy, addr)
}

/// Send raw bytes to the proxy and collect everything it writes back
/// until it closes the connection. A reset counts as the end of output.
pub async fn exchange(proxy: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut client = TcpStream::connect(proxy).await.unwrap();
    client.write_all(request).await.unwrap();
    let mut received = Vec::new();
    let _ = with_timeout(client.read_to_end(&mut received)).await;
    received
}

/// Fail the test rather than hang when a future never completes.
pub async fn with_timeout<F: std::future::Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out")
}
