//! REST handlers for the gateway API.
//!
//! Dashboard-facing endpoints always return a structured success/failure
//! body. The device-facing push endpoint answers with a coarse ack and
//! never leaks internal detail; the device cannot act on anything
//! subtler than 200-vs-500.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use biogate_device::protocol::EnrollCommand;

use crate::AppState;

/// Acknowledgement body for the device push endpoint.
#[derive(Debug, Serialize)]
pub struct PushAck {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Response body for the enrollment endpoint.
#[derive(Debug, Serialize)]
pub struct EnrollResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Request body for the enrollment endpoint.
#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    #[serde(alias = "userId")]
    pub user_id: String,
}

/// Status body derived from the gateway's link snapshot.
#[derive(Debug, Serialize)]
pub struct DeviceStatusResponse {
    pub connected: bool,
    pub ip: String,
    pub port: u16,
}

/// Liveness probe.
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Inbound push endpoint called by the device.
pub async fn attendance_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<PushAck>) {
    match state.gateway.ingest_push(&body).await {
        Ok(event) => {
            tracing::info!(user_id = %event.user_id, "attendance recorded");
            (
                StatusCode::OK,
                Json(PushAck {
                    success: true,
                    message: Some("Attendance recorded".to_string()),
                }),
            )
        }
        // Devices resend on ambiguous acks; a duplicate is still a
        // successful delivery from the device's point of view.
        Err(biogate_core::error::IngestError::Duplicate) => (
            StatusCode::OK,
            Json(PushAck {
                success: true,
                message: Some("Duplicate push ignored".to_string()),
            }),
        ),
        Err(err) => {
            tracing::warn!(error = %err, "attendance push rejected");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(PushAck {
                    success: false,
                    message: Some("Failed to process attendance".to_string()),
                }),
            )
        }
    }
}

/// Dashboard enrollment endpoint; builds a default enrollment for the
/// given user id.
pub async fn enroll_handler(
    State(state): State<AppState>,
    Json(request): Json<EnrollRequest>,
) -> (StatusCode, Json<EnrollResponse>) {
    let command = EnrollCommand::with_defaults(request.user_id);
    let result = state.gateway.submit_enroll(command).await;

    if result.is_success() {
        (
            StatusCode::OK,
            Json(EnrollResponse {
                success: true,
                error: None,
            }),
        )
    } else {
        let mut error = format!("{:?}", result.outcome);
        if let Some(message) = result.device_message {
            error = format!("{}: {}", error, message);
        }
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(EnrollResponse {
                success: false,
                error: Some(error),
            }),
        )
    }
}

/// Device status endpoint; unreachability is reported as
/// `connected: false`, never as a failed request.
pub async fn device_status_handler(
    State(state): State<AppState>,
) -> Json<DeviceStatusResponse> {
    let status = state.gateway.status().await;
    Json(DeviceStatusResponse {
        connected: status.connected,
        ip: status.host,
        port: status.port,
    })
}
