//! Gateway facade composing link, translator, bus and monitor.
//!
//! The facade is the single owner of cross-component sequencing: device
//! operations (connect, send, close) are serialized through one tokio
//! mutex per gateway instance, so only one command is in flight per
//! device while ingestion and health probing proceed concurrently.
//! Every device failure is recovered into a [`CommandResult`]; nothing
//! here is fatal to the process.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use biogate_core::bus::{EventBus, SubscriberId, Subscription};
use biogate_core::config::GatewayConfig;
use biogate_core::error::{GatewayError, IngestError};
use biogate_core::event::{
    AttendanceEvent, CommandOutcome, CommandResult, ConnectionState, GatewayEvent,
};
use biogate_device::health::HealthMonitor;
use biogate_device::link::{DeviceEndpoint, DeviceLink};
use biogate_device::protocol::{self, DeviceReply, EnrollCommand, WireCommand};

use crate::ingest::Ingestor;

/// Snapshot of the device link for the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct LinkStatus {
    /// Current connection state.
    pub state: ConnectionState,
    /// Convenience flag: state is `Connected` or `Degraded`.
    pub connected: bool,
    /// Device host.
    pub host: String,
    /// Device port.
    pub port: u16,
    /// Time of the last state transition.
    pub last_transition: DateTime<Utc>,
}

/// One device integration gateway instance.
///
/// All state is owned by the instance; multiple gateways for different
/// devices can coexist in one process without cross-talk.
pub struct Gateway {
    config: GatewayConfig,
    link: Arc<Mutex<DeviceLink>>,
    bus: Arc<EventBus>,
    ingestor: Ingestor,
    monitor: HealthMonitor,
}

impl Gateway {
    /// Create a gateway from configuration. The link starts disconnected;
    /// call [`start`](Gateway::start) to bring it up.
    pub fn new(config: GatewayConfig) -> Self {
        let endpoint = DeviceEndpoint::new(
            config.device_host.clone(),
            config.device_port,
            config.protocol_timeout,
        );
        Self {
            link: Arc::new(Mutex::new(DeviceLink::new(endpoint))),
            bus: Arc::new(EventBus::with_capacity(config.backlog_capacity)),
            ingestor: Ingestor::new(config.dedup_window),
            monitor: HealthMonitor::new(),
            config,
        }
    }

    /// Attempt the initial connection and start health probing.
    pub async fn start(&self) {
        {
            let mut link = self.link.lock().await;
            let state = link.connect().await;
            tracing::info!(
                host = %link.endpoint().host,
                port = link.endpoint().port,
                state = %state,
                "gateway started"
            );
        }
        self.monitor
            .start(self.link.clone(), self.bus.clone(), &self.config)
            .await;
    }

    /// Stop probing and release the device connection.
    pub async fn shutdown(&self) {
        self.monitor.stop().await;
        self.link.lock().await.close();
        tracing::info!("gateway shut down");
    }

    /// Submit an enrollment command and wait for its terminal result.
    pub async fn submit_enroll(&self, command: EnrollCommand) -> CommandResult {
        self.submit(protocol::translate(&command)).await
    }

    /// Submit a delete-user command.
    pub async fn delete_user(&self, user_id: &str) -> CommandResult {
        self.submit(protocol::delete_user(user_id)).await
    }

    /// Push the gateway clock to the device.
    pub async fn sync_time(&self) -> CommandResult {
        self.submit(protocol::sync_time(Utc::now())).await
    }

    /// Validate a raw device push and publish it exactly once.
    ///
    /// Duplicates within the dedup window are reported as
    /// [`IngestError::Duplicate`] and not published.
    pub async fn ingest_push(&self, raw: &[u8]) -> Result<AttendanceEvent, IngestError> {
        let event = self.ingestor.ingest(raw)?;
        tracing::debug!(
            user_id = %event.user_id,
            method = event.method.type_name(),
            "attendance accepted"
        );
        self.bus.publish(GatewayEvent::Attendance(event.clone()));
        Ok(event)
    }

    /// Create a live event subscription.
    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe()
    }

    /// Remove a subscription. Idempotent.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.bus.unsubscribe(id);
    }

    /// Get a snapshot of the device link.
    pub async fn status(&self) -> LinkStatus {
        let link = self.link.lock().await;
        LinkStatus {
            state: link.state(),
            connected: link.state().is_usable(),
            host: link.endpoint().host.clone(),
            port: link.endpoint().port,
            last_transition: link.last_transition(),
        }
    }

    /// Get the event bus shared by this gateway.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Drive one translated command through the link and recover every
    /// failure into a [`CommandResult`].
    async fn submit(
        &self,
        wire: Result<WireCommand, GatewayError>,
    ) -> CommandResult {
        let result = match wire {
            Err(err) => {
                // Rejected before reaching the wire; a fresh id keeps the
                // result correlatable.
                tracing::warn!(error = %err, "command rejected before submission");
                CommandResult::failed(
                    Uuid::new_v4().to_string(),
                    CommandOutcome::DeviceRejected,
                    Some(err.to_string()),
                )
            }
            Ok(wire) => self.exchange(wire).await,
        };
        self.bus
            .publish(GatewayEvent::CommandCompleted(result.clone()));
        result
    }

    async fn exchange(&self, wire: WireCommand) -> CommandResult {
        // Device operations queue FIFO behind this lock; each holder is
        // bounded by the link's timeout budget.
        let mut link = self.link.lock().await;
        if !link.state().is_usable() {
            return CommandResult::failed(wire.command_id, CommandOutcome::LinkDown, None);
        }

        let sent = link.send(&wire.payload).await;
        drop(link);

        match sent {
            Ok(frame) => {
                match protocol::parse_response(&frame) {
                    Ok(DeviceReply::Ack { message, .. }) => {
                        CommandResult::success(wire.command_id, message)
                    }
                    Ok(DeviceReply::Rejected { code, message, .. }) => CommandResult::failed(
                        wire.command_id,
                        CommandOutcome::DeviceRejected,
                        Some(format!("code {}: {}", code, message)),
                    ),
                    // Malformed response frames surface as rejections with
                    // the raw text preserved for diagnostics.
                    Err(err) => CommandResult::failed(
                        wire.command_id,
                        CommandOutcome::DeviceRejected,
                        Some(err.to_string()),
                    ),
                }
            }
            Err(GatewayError::Timeout(_)) => {
                CommandResult::failed(wire.command_id, CommandOutcome::Timeout, None)
            }
            Err(GatewayError::LinkDown) => {
                CommandResult::failed(wire.command_id, CommandOutcome::LinkDown, None)
            }
            Err(err) => CommandResult::failed(
                wire.command_id,
                CommandOutcome::LinkDown,
                Some(err.to_string()),
            ),
        }
    }
}
