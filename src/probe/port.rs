//! TCP reachability probe
//!
//! One connect attempt per call, bounded by a timeout. Every outcome is
//! reduced to a bool; the stream is dropped (closed) before returning.

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Attempt a single TCP connection to `host:port`
///
/// Returns `true` only if the connection is established within `timeout`.
/// Refusal, resolution errors and timeout all yield `false`.
pub async fn probe_port(host: &str, port: u16, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_stream)) => true,
        Ok(Err(e)) => {
            debug!(%host, port, error = %e, "port probe failed");
            false
        }
        Err(_) => {
            debug!(%host, port, ?timeout, "port probe timed out");
            false
        }
    }
}

/// Source of port reachability signals
///
/// `TcpPortProber` connects for real; tests substitute `MockPortProber`.
#[async_trait]
pub trait PortProber: Send + Sync {
    /// Check if `host:port` accepts a TCP connection within `timeout`
    async fn probe(&self, host: &str, port: u16, timeout: Duration) -> bool;
}

/// Production prober backed by [`probe_port`]
pub struct TcpPortProber;

#[async_trait]
impl PortProber for TcpPortProber {
    async fn probe(&self, host: &str, port: u16, timeout: Duration) -> bool {
        probe_port(host, port, timeout).await
    }
}

/// Mock prober: a port is reachable iff it was listed at construction
#[cfg(test)]
pub struct MockPortProber {
    reachable: std::sync::Mutex<std::collections::HashSet<u16>>,
    call_count: std::sync::atomic::AtomicU32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
impl MockPortProber {
    /// Create a mock where only `reachable` ports accept connections
    pub fn new(reachable: &[u16]) -> Self {
        Self {
            reachable: std::sync::Mutex::new(reachable.iter().copied().collect()),
            call_count: std::sync::atomic::AtomicU32::new(0),
        }
    }

    pub fn set_reachable(&self, port: u16, reachable: bool) {
        let mut ports = self.reachable.lock().unwrap();
        if reachable {
            ports.insert(port);
        } else {
            ports.remove(&port);
        }
    }

    /// Number of probes issued so far
    pub fn calls(&self) -> u32 {
        self.call_count.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
#[async_trait]
impl PortProber for MockPortProber {
    async fn probe(&self, _host: &str, port: u16, _timeout: Duration) -> bool {
        self.call_count
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.reachable.lock().unwrap().contains(&port)
    }
}
