//! HTTP/WebSocket surface of the biogate gateway.
//!
//! Routes:
//! - `POST /api/attendance`: device push endpoint, coarse ack body.
//! - `POST /api/enroll`: dashboard enrollment with defaulted fields.
//! - `GET /api/device-status`: link snapshot, never fails on an
//!   unreachable device.
//! - `GET /api/events/ws`: live event stream per dashboard client.
//! - `GET /api/health`: liveness.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use biogate_gateway::Gateway;

pub mod handlers;
pub mod ws;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The gateway instance this server fronts.
    pub gateway: Arc<Gateway>,
}

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health_handler))
        .route("/api/attendance", post(handlers::attendance_handler))
        .route("/api/enroll", post(handlers::enroll_handler))
        .route("/api/device-status", get(handlers::device_status_handler))
        .route("/api/events/ws", get(ws::event_ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
