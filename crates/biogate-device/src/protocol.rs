//! Wire protocol translation for device commands.
//!
//! Commands are newline-terminated JSON objects carrying a generated
//! correlation id, so results can be matched to submissions even if
//! responses ever arrive out of order. The protocol is request/response
//! with a single outstanding command per link, so the id is a safety
//! property rather than a demand.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use biogate_core::error::{GatewayError, Result};

/// Verify mask bits accepted by the device.
pub const VERIFY_FINGERPRINT: u8 = 0x01;
pub const VERIFY_FACE: u8 = 0x02;
pub const VERIFY_PASSWORD: u8 = 0x04;
pub const VERIFY_CARD: u8 = 0x08;

/// Default verify mask: fingerprint + face.
pub const DEFAULT_VERIFY_MASK: u8 = VERIFY_FINGERPRINT | VERIFY_FACE;

/// Highest privilege level the device accepts.
pub const MAX_PRIVILEGE: u8 = 3;

/// Enrollment request for one user.
#[derive(Debug, Clone)]
pub struct EnrollCommand {
    /// User identifier on the device.
    pub user_id: String,
    /// Display name shown on the device.
    pub display_name: String,
    /// Privilege level, 0 (user) to [`MAX_PRIVILEGE`] (admin).
    pub privilege: u8,
    /// Bitmask of verify methods to enroll.
    pub verify_mask: u8,
}

impl EnrollCommand {
    /// Build an enrollment with default name, privilege and verify mask.
    pub fn with_defaults(user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self {
            display_name: format!("User{}", user_id),
            user_id,
            privilege: 0,
            verify_mask: DEFAULT_VERIFY_MASK,
        }
    }
}

/// A translated command ready for the wire.
#[derive(Debug, Clone)]
pub struct WireCommand {
    /// Correlation id embedded in the payload.
    pub command_id: String,
    /// Newline-terminated JSON payload.
    pub payload: Vec<u8>,
}

impl WireCommand {
    fn from_body(command_id: String, body: serde_json::Value) -> Result<Self> {
        let mut payload = serde_json::to_vec(&body)?;
        payload.push(b'\n');
        Ok(Self {
            command_id,
            payload,
        })
    }
}

/// Translate an enrollment into a wire payload.
///
/// Total over all valid inputs; invalid privilege levels and empty user
/// ids are rejected with `InvalidCommand` before reaching the wire.
pub fn translate(command: &EnrollCommand) -> Result<WireCommand> {
    if command.user_id.trim().is_empty() {
        return Err(GatewayError::InvalidCommand(
            "user id must not be empty".to_string(),
        ));
    }
    if command.privilege > MAX_PRIVILEGE {
        return Err(GatewayError::InvalidCommand(format!(
            "privilege {} exceeds maximum {}",
            command.privilege, MAX_PRIVILEGE
        )));
    }
    let id = Uuid::new_v4().to_string();
    let body = serde_json::json!({
        "cmd": "enrolluser",
        "id": id,
        "userid": command.user_id,
        "name": command.display_name,
        "privilege": command.privilege,
        "verify": command.verify_mask,
    });
    WireCommand::from_body(id, body)
}

/// Build a delete-user wire payload.
pub fn delete_user(user_id: &str) -> Result<WireCommand> {
    if user_id.trim().is_empty() {
        return Err(GatewayError::InvalidCommand(
            "user id must not be empty".to_string(),
        ));
    }
    let id = Uuid::new_v4().to_string();
    let body = serde_json::json!({
        "cmd": "deleteuser",
        "id": id,
        "userid": user_id,
    });
    WireCommand::from_body(id, body)
}

/// Build a sync-time wire payload carrying the gateway clock.
pub fn sync_time(now: DateTime<Utc>) -> Result<WireCommand> {
    let id = Uuid::new_v4().to_string();
    let body = serde_json::json!({
        "cmd": "synctime",
        "id": id,
        "time": now.to_rfc3339(),
    });
    WireCommand::from_body(id, body)
}

/// Parsed device response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceReply {
    /// Well-formed acknowledgement.
    Ack {
        command_id: Option<String>,
        message: Option<String>,
    },
    /// Well-formed rejection with a device error code.
    Rejected {
        command_id: Option<String>,
        code: u16,
        message: String,
    },
}

#[derive(Debug, Deserialize)]
struct RawReply {
    id: Option<String>,
    result: String,
    code: Option<u16>,
    message: Option<String>,
}

/// Parse a raw response frame.
///
/// Malformed or truncated bytes yield `Protocol`; the raw text is kept
/// in the error for diagnostics.
pub fn parse_response(bytes: &[u8]) -> Result<DeviceReply> {
    let raw: RawReply = serde_json::from_slice(bytes).map_err(|err| {
        GatewayError::Protocol(format!(
            "malformed device response ({}): {}",
            err,
            String::from_utf8_lossy(bytes)
        ))
    })?;
    match raw.result.as_str() {
        "ok" => Ok(DeviceReply::Ack {
            command_id: raw.id,
            message: raw.message,
        }),
        "err" | "error" => Ok(DeviceReply::Rejected {
            command_id: raw.id,
            code: raw.code.unwrap_or(0),
            message: raw
                .message
                .unwrap_or_else(|| "command rejected".to_string()),
        }),
        other => Err(GatewayError::Protocol(format!(
            "unknown result kind: {}",
            other
        ))),
    }
}
