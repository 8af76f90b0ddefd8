//! Error types for the gateway.

use std::time::Duration;

use thiserror::Error;

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors that can occur while talking to the device.
///
/// `LinkDown` and `Timeout` are transient and safe to retry after a
/// reconnect; `Protocol` and `InvalidCommand` are not retryable without
/// fixing the input; `DeviceRejected` is surfaced to the caller verbatim.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No active device connection.
    #[error("link down: no active device connection")]
    LinkDown,

    /// Operation exceeded its timeout budget.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Malformed or truncated device response.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Command rejected before reaching the wire.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Device explicitly refused the command.
    #[error("device rejected command (code {code}): {message}")]
    DeviceRejected { code: u16, message: String },

    /// Payload serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport-level IO failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while validating a raw device push.
///
/// Ingest errors are logged and acknowledged-but-discarded; they are
/// never surfaced to the device as a protocol-level failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    /// Push body is not a JSON object we understand.
    #[error("malformed push payload: {0}")]
    MalformedPayload(String),

    /// Push has no user id, or an empty one.
    #[error("missing or empty user id")]
    MissingUserId,

    /// Timestamp field did not parse.
    #[error("unparseable timestamp: {0}")]
    BadTimestamp(String),

    /// Timestamp is implausibly far in the future (device clock drift).
    #[error("timestamp too far in the future")]
    FutureTimestamp,

    /// Identical push seen within the dedup window.
    #[error("duplicate push within dedup window")]
    Duplicate,
}
