//! Domain events produced by the gateway.
//!
//! Everything a dashboard subscriber can observe flows through
//! [`GatewayEvent`]. Events are immutable once created and are cloned
//! into each subscriber's backlog by the event bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the device verified the person behind a punch.
///
/// Unknown device codes map to [`VerifyMethod::Unknown`] rather than
/// failing ingestion; a dashboard must still show the punch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyMethod {
    Fingerprint,
    Face,
    Password,
    Card,
    Unknown,
}

impl VerifyMethod {
    /// Map a raw device verify code to a method.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => VerifyMethod::Fingerprint,
            2 => VerifyMethod::Face,
            3 => VerifyMethod::Password,
            4 => VerifyMethod::Card,
            _ => VerifyMethod::Unknown,
        }
    }

    /// Get the method name.
    pub fn type_name(&self) -> &'static str {
        match self {
            VerifyMethod::Fingerprint => "fingerprint",
            VerifyMethod::Face => "face",
            VerifyMethod::Password => "password",
            VerifyMethod::Card => "card",
            VerifyMethod::Unknown => "unknown",
        }
    }
}

/// A single attendance punch, normalized from a device push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEvent {
    /// User identifier as registered on the device.
    pub user_id: String,
    /// Punch time, UTC-normalized from the device clock.
    pub timestamp: DateTime<Utc>,
    /// Verification method used for the punch.
    pub method: VerifyMethod,
    /// Raw device status code, kept for diagnostics.
    pub raw_status: u8,
}

/// Connection lifecycle state of a device link.
///
/// Only one state is active at a time. `Degraded` means the device is
/// reachable but the last command exchange failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Degraded,
}

impl ConnectionState {
    /// Whether the link can carry a command exchange in this state.
    pub fn is_usable(&self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Degraded)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Degraded => "degraded",
        };
        write!(f, "{}", name)
    }
}

/// Terminal outcome of a submitted device command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandOutcome {
    /// Device acknowledged the command.
    Success,
    /// Device explicitly refused, or the response was unintelligible.
    DeviceRejected,
    /// No response within the timeout budget.
    Timeout,
    /// No active connection; nothing was sent.
    LinkDown,
}

/// Result of a submitted command, correlated 1:1 via `command_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Correlation id generated at translation time.
    pub command_id: String,
    /// Terminal outcome.
    pub outcome: CommandOutcome,
    /// Raw device message, preserved for diagnostics.
    pub device_message: Option<String>,
    /// Completion timestamp.
    pub completed_at: DateTime<Utc>,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success(command_id: impl Into<String>, device_message: Option<String>) -> Self {
        Self {
            command_id: command_id.into(),
            outcome: CommandOutcome::Success,
            device_message,
            completed_at: Utc::now(),
        }
    }

    /// Create a failed result with the given outcome.
    pub fn failed(
        command_id: impl Into<String>,
        outcome: CommandOutcome,
        device_message: Option<String>,
    ) -> Self {
        Self {
            command_id: command_id.into(),
            outcome,
            device_message,
            completed_at: Utc::now(),
        }
    }

    /// Whether the command succeeded.
    pub fn is_success(&self) -> bool {
        self.outcome == CommandOutcome::Success
    }
}

/// Bus-level event envelope.
///
/// Ordering within a single subscriber's stream matches publish order.
/// `Overflow` is synthetic: the bus inserts it when a backlog dropped
/// events under pressure so consumers can detect the gap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// A normalized attendance punch.
    Attendance(AttendanceEvent),
    /// The device link transitioned between connection states.
    ConnectivityChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    /// A submitted command reached a terminal outcome.
    CommandCompleted(CommandResult),
    /// Backlog overflow marker: `dropped` events were discarded before
    /// this point in the stream.
    Overflow { dropped: u64 },
}

impl GatewayEvent {
    /// Get the event type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            GatewayEvent::Attendance(_) => "attendance",
            GatewayEvent::ConnectivityChanged { .. } => "connectivity_changed",
            GatewayEvent::CommandCompleted(_) => "command_completed",
            GatewayEvent::Overflow { .. } => "overflow",
        }
    }

    /// Whether this is the synthetic overflow marker.
    pub fn is_overflow(&self) -> bool {
        matches!(self, GatewayEvent::Overflow { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_method_from_code() {
        assert_eq!(VerifyMethod::from_code(1), VerifyMethod::Fingerprint);
        assert_eq!(VerifyMethod::from_code(2), VerifyMethod::Face);
        assert_eq!(VerifyMethod::from_code(3), VerifyMethod::Password);
        assert_eq!(VerifyMethod::from_code(4), VerifyMethod::Card);
        assert_eq!(VerifyMethod::from_code(99), VerifyMethod::Unknown);
    }

    #[test]
    fn test_connection_state_usable() {
        assert!(ConnectionState::Connected.is_usable());
        assert!(ConnectionState::Degraded.is_usable());
        assert!(!ConnectionState::Disconnected.is_usable());
        assert!(!ConnectionState::Connecting.is_usable());
    }

    #[test]
    fn test_command_result_helpers() {
        let ok = CommandResult::success("cmd-1", None);
        assert!(ok.is_success());

        let down = CommandResult::failed("cmd-2", CommandOutcome::LinkDown, None);
        assert!(!down.is_success());
        assert_eq!(down.outcome, CommandOutcome::LinkDown);
    }

    #[test]
    fn test_event_serialization_tagged() {
        let event = GatewayEvent::ConnectivityChanged {
            from: ConnectionState::Connected,
            to: ConnectionState::Disconnected,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "connectivity_changed");
        assert_eq!(json["from"], "connected");
        assert_eq!(json["to"], "disconnected");
    }

    #[test]
    fn test_attendance_event_camel_case() {
        let event = AttendanceEvent {
            user_id: "42".to_string(),
            timestamp: Utc::now(),
            method: VerifyMethod::Face,
            raw_status: 0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["userId"], "42");
        assert_eq!(json["method"], "face");
    }
}
