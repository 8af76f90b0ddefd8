//! Persistent connection to one biometric terminal.
//!
//! The link owns a single TCP stream and an explicit [`ConnectionState`].
//! Every operation is bounded by the endpoint's timeout budget and the
//! stream is dropped on every close path. Reconnection is the health
//! monitor's responsibility; the link never retries on its own to avoid
//! hidden retry storms.

use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use biogate_core::error::{GatewayError, Result};
use biogate_core::event::ConnectionState;

/// Upper bound on a single response frame, in bytes.
const MAX_FRAME_LEN: usize = 64 * 1024;

/// Immutable address and timeout budget of one device.
#[derive(Debug, Clone)]
pub struct DeviceEndpoint {
    /// Device host (IP or hostname).
    pub host: String,
    /// Device TCP port.
    pub port: u16,
    /// Timeout budget for connect, send and probe.
    pub timeout: std::time::Duration,
}

impl DeviceEndpoint {
    /// Create a new endpoint.
    pub fn new(host: impl Into<String>, port: u16, timeout: std::time::Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    /// Test reachability with a fresh, scoped connection attempt.
    ///
    /// The probe connection is closed immediately and never touches the
    /// persistent stream of a [`DeviceLink`].
    pub async fn probe(&self) -> bool {
        matches!(
            tokio::time::timeout(
                self.timeout,
                TcpStream::connect((self.host.as_str(), self.port)),
            )
            .await,
            Ok(Ok(_))
        )
    }
}

/// Request/response link to one device.
///
/// State transitions:
/// - `Disconnected` → `Connecting` → `Connected` on a successful
///   [`connect`](DeviceLink::connect), back to `Disconnected` on failure.
/// - `Connected` → `Degraded` on a failed [`send`](DeviceLink::send);
///   `Degraded` → `Connected` on a successful one.
/// - Any state → `Disconnected` on [`close`](DeviceLink::close).
pub struct DeviceLink {
    endpoint: DeviceEndpoint,
    state: ConnectionState,
    stream: Option<BufReader<TcpStream>>,
    last_transition: DateTime<Utc>,
}

impl DeviceLink {
    /// Create a link in the `Disconnected` state.
    pub fn new(endpoint: DeviceEndpoint) -> Self {
        Self {
            endpoint,
            state: ConnectionState::Disconnected,
            stream: None,
            last_transition: Utc::now(),
        }
    }

    /// Get the configured endpoint.
    pub fn endpoint(&self) -> &DeviceEndpoint {
        &self.endpoint
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Get the time of the last state transition.
    pub fn last_transition(&self) -> DateTime<Utc> {
        self.last_transition
    }

    /// Attempt to establish the connection, bounded by the timeout budget.
    ///
    /// Returns the resulting state: `Connected` on success,
    /// `Disconnected` on failure or timeout.
    pub async fn connect(&mut self) -> ConnectionState {
        self.transition(ConnectionState::Connecting);
        let attempt = tokio::time::timeout(
            self.endpoint.timeout,
            TcpStream::connect((self.endpoint.host.as_str(), self.endpoint.port)),
        )
        .await;

        match attempt {
            Ok(Ok(stream)) => {
                self.stream = Some(BufReader::new(stream));
                self.transition(ConnectionState::Connected);
            }
            Ok(Err(err)) => {
                tracing::warn!(
                    host = %self.endpoint.host,
                    port = self.endpoint.port,
                    error = %err,
                    "device connection failed"
                );
                self.stream = None;
                self.transition(ConnectionState::Disconnected);
            }
            Err(_) => {
                tracing::warn!(
                    host = %self.endpoint.host,
                    port = self.endpoint.port,
                    timeout = ?self.endpoint.timeout,
                    "device connection timed out"
                );
                self.stream = None;
                self.transition(ConnectionState::Disconnected);
            }
        }
        self.state
    }

    /// Perform one request/response exchange over the active connection.
    ///
    /// Fails with `LinkDown` unless the state is `Connected` or
    /// `Degraded`, `Timeout` if no full response frame arrives within the
    /// budget, and `Protocol` if the peer closes mid-response or the
    /// frame exceeds the size bound. A failure degrades the link; a
    /// success from `Degraded` restores `Connected`.
    pub async fn send(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        if !self.state.is_usable() {
            return Err(GatewayError::LinkDown);
        }
        let budget = self.endpoint.timeout;
        let stream = self.stream.as_mut().ok_or(GatewayError::LinkDown)?;
        let outcome = tokio::time::timeout(budget, exchange(stream, payload)).await;

        match outcome {
            Ok(Ok(frame)) => {
                if self.state == ConnectionState::Degraded {
                    self.transition(ConnectionState::Connected);
                }
                Ok(frame)
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "device exchange failed");
                self.transition(ConnectionState::Degraded);
                Err(err)
            }
            Err(_) => {
                tracing::warn!(timeout = ?budget, "device exchange timed out");
                self.transition(ConnectionState::Degraded);
                Err(GatewayError::Timeout(budget))
            }
        }
    }

    /// Release the connection deterministically.
    pub fn close(&mut self) {
        self.stream = None;
        if self.state != ConnectionState::Disconnected {
            self.transition(ConnectionState::Disconnected);
        }
    }

    fn transition(&mut self, to: ConnectionState) {
        if self.state != to {
            tracing::debug!(from = %self.state, to = %to, "link state transition");
            self.state = to;
            self.last_transition = Utc::now();
        }
    }
}

/// Write one newline-terminated request and read one response frame.
async fn exchange(stream: &mut BufReader<TcpStream>, payload: &[u8]) -> Result<Vec<u8>> {
    stream.get_mut().write_all(payload).await?;
    if !payload.ends_with(b"\n") {
        stream.get_mut().write_all(b"\n").await?;
    }
    stream.get_mut().flush().await?;

    let mut frame = Vec::new();
    let n = stream
        .take(MAX_FRAME_LEN as u64 + 1)
        .read_until(b'\n', &mut frame)
        .await?;
    if n == 0 {
        return Err(GatewayError::Protocol(
            "connection closed before response".to_string(),
        ));
    }
    if frame.last() != Some(&b'\n') {
        return Err(GatewayError::Protocol(
            "unterminated response frame".to_string(),
        ));
    }
    frame.pop();
    Ok(frame)
}
