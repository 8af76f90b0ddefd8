//! End-to-end gateway tests against fake TCP devices.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use biogate_core::config::GatewayConfig;
use biogate_core::error::IngestError;
use biogate_core::event::{CommandOutcome, ConnectionState, GatewayEvent};
use biogate_device::protocol::EnrollCommand;
use biogate_gateway::Gateway;

/// Fake device echoing the request id back inside the given result kind.
async fn spawn_device(result: &'static str) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (reader, mut writer) = socket.split();
                let mut lines = BufReader::new(reader).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let request: serde_json::Value =
                        serde_json::from_str(&line).unwrap_or_default();
                    let reply = serde_json::json!({
                        "id": request["id"],
                        "result": result,
                        "code": 5,
                        "message": "device says no",
                    });
                    if writer.write_all(reply.to_string().as_bytes()).await.is_err() {
                        break;
                    }
                    if writer.write_all(b"\n").await.is_err() {
                        break;
                    }
                }
            });
        }
    });
    addr
}

fn config_for(addr: std::net::SocketAddr) -> GatewayConfig {
    GatewayConfig::default()
        .with_device(addr.ip().to_string(), addr.port())
        .with_protocol_timeout(Duration::from_millis(500))
        .with_probe_interval(Duration::from_millis(50))
}

#[tokio::test]
async fn test_enroll_success_end_to_end() {
    let addr = spawn_device("ok").await;
    let gateway = Gateway::new(config_for(addr));
    gateway.start().await;

    let sub = gateway.subscribe();
    let result = gateway
        .submit_enroll(EnrollCommand::with_defaults("42"))
        .await;
    assert_eq!(result.outcome, CommandOutcome::Success);

    // Completion is also published to subscribers.
    let events = sub.drain(Duration::from_millis(500)).await;
    assert!(events.iter().any(|e| matches!(
        e,
        GatewayEvent::CommandCompleted(r) if r.command_id == result.command_id
    )));

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_enroll_rejection_preserves_device_message() {
    let addr = spawn_device("err").await;
    let gateway = Gateway::new(config_for(addr));
    gateway.start().await;

    let result = gateway
        .submit_enroll(EnrollCommand::with_defaults("42"))
        .await;
    assert_eq!(result.outcome, CommandOutcome::DeviceRejected);
    let message = result.device_message.unwrap();
    assert!(message.contains("code 5"));
    assert!(message.contains("device says no"));

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_enroll_while_disconnected_is_link_down() {
    // Never started, so the link stays disconnected and no bytes go out.
    let config = GatewayConfig::default()
        .with_device("127.0.0.1", 1)
        .with_protocol_timeout(Duration::from_millis(100));
    let gateway = Gateway::new(config);

    let result = gateway
        .submit_enroll(EnrollCommand::with_defaults("42"))
        .await;
    assert_eq!(result.outcome, CommandOutcome::LinkDown);
}

#[tokio::test]
async fn test_invalid_command_rejected_before_wire() {
    let config = GatewayConfig::default().with_device("127.0.0.1", 1);
    let gateway = Gateway::new(config);

    let command = EnrollCommand {
        privilege: 99,
        ..EnrollCommand::with_defaults("42")
    };
    let result = gateway.submit_enroll(command).await;
    assert_eq!(result.outcome, CommandOutcome::DeviceRejected);
    assert!(result.device_message.unwrap().contains("privilege"));
}

#[tokio::test]
async fn test_commands_serialize_fifo_over_one_link() {
    let addr = spawn_device("ok").await;
    let gateway = Arc::new(Gateway::new(config_for(addr)));
    gateway.start().await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let gateway = gateway.clone();
        handles.push(tokio::spawn(async move {
            gateway
                .submit_enroll(EnrollCommand::with_defaults(format!("{}", i)))
                .await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().outcome, CommandOutcome::Success);
    }

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_push_published_once_and_deduped() {
    let gateway = Gateway::new(GatewayConfig::default().with_device("127.0.0.1", 1));
    let sub = gateway.subscribe();

    let body = serde_json::json!({
        "userId": "42",
        "timestamp": "2024-05-01T08:30:00Z",
        "verifyMethod": 2,
    })
    .to_string()
    .into_bytes();

    let event = gateway.ingest_push(&body).await.unwrap();
    assert_eq!(event.user_id, "42");

    // Identical resend inside the window is acknowledged but dropped.
    assert_eq!(
        gateway.ingest_push(&body).await.unwrap_err(),
        IngestError::Duplicate
    );

    let events = sub.drain(Duration::from_millis(200)).await;
    let punches: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, GatewayEvent::Attendance(_)))
        .collect();
    assert_eq!(punches.len(), 1);
}

#[tokio::test]
async fn test_invalid_push_never_publishes() {
    let gateway = Gateway::new(GatewayConfig::default().with_device("127.0.0.1", 1));
    let sub = gateway.subscribe();

    let body = serde_json::json!({"timestamp": "2024-05-01T08:30:00Z"})
        .to_string()
        .into_bytes();
    assert!(gateway.ingest_push(&body).await.is_err());

    assert!(sub.drain(Duration::from_millis(100)).await.is_empty());
}

#[tokio::test]
async fn test_status_reports_unreachable_device() {
    // TEST-NET-1 address: never reachable, must never hang past the budget.
    let config = GatewayConfig::default()
        .with_device("192.0.2.1", 4370)
        .with_protocol_timeout(Duration::from_millis(300));
    let gateway = Gateway::new(config);

    let start = tokio::time::Instant::now();
    gateway.start().await;
    let status = gateway.status().await;
    assert!(start.elapsed() < Duration::from_secs(2));

    assert!(!status.connected);
    assert_eq!(status.state, ConnectionState::Disconnected);
    assert_eq!(status.host, "192.0.2.1");
    assert_eq!(status.port, 4370);

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_delete_user_and_sync_time() {
    let addr = spawn_device("ok").await;
    let gateway = Gateway::new(config_for(addr));
    gateway.start().await;

    assert_eq!(
        gateway.delete_user("42").await.outcome,
        CommandOutcome::Success
    );
    assert_eq!(gateway.sync_time().await.outcome, CommandOutcome::Success);
    assert_eq!(
        gateway.delete_user("").await.outcome,
        CommandOutcome::DeviceRejected
    );

    gateway.shutdown().await;
}
