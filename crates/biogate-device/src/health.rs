//! Periodic device reachability monitoring.
//!
//! The monitor probes the device on a fixed interval and publishes a
//! [`GatewayEvent::ConnectivityChanged`] only on an actual state
//! transition. Probe failures never escape the monitor task; they are
//! normalized into state transitions. Consecutive failures beyond a
//! threshold force the link down even from `Degraded`, so a half-alive
//! link cannot stay stuck retrying forever.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use biogate_core::bus::EventBus;
use biogate_core::config::GatewayConfig;
use biogate_core::event::{ConnectionState, GatewayEvent};

use crate::link::DeviceLink;

/// What the monitor should do with the link after a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeAction {
    /// Leave the link alone.
    None,
    /// Device reachable while disconnected: reconnect.
    Reconnect,
    /// Failure threshold reached: force the link down.
    ForceClose,
}

/// Pure probe bookkeeping, separated from the task loop for testing.
pub struct ProbeTracker {
    observed: ConnectionState,
    consecutive_failures: u32,
    threshold: u32,
}

impl ProbeTracker {
    /// Create a tracker with the given failure threshold.
    pub fn new(initial: ConnectionState, threshold: u32) -> Self {
        Self {
            observed: initial,
            consecutive_failures: 0,
            threshold: threshold.max(1),
        }
    }

    /// Record one probe result against the current link state.
    pub fn record(&mut self, reachable: bool, state: ConnectionState) -> ProbeAction {
        if reachable {
            self.consecutive_failures = 0;
            if state == ConnectionState::Disconnected {
                ProbeAction::Reconnect
            } else {
                ProbeAction::None
            }
        } else {
            self.consecutive_failures += 1;
            if self.consecutive_failures >= self.threshold
                && state != ConnectionState::Disconnected
            {
                ProbeAction::ForceClose
            } else {
                ProbeAction::None
            }
        }
    }

    /// Compare the link state against the last observed one; returns the
    /// transition if it changed.
    pub fn observe(&mut self, state: ConnectionState) -> Option<(ConnectionState, ConnectionState)> {
        if state != self.observed {
            let from = std::mem::replace(&mut self.observed, state);
            Some((from, state))
        } else {
            None
        }
    }

    /// Current consecutive failure count.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

/// Background task probing one device link.
pub struct HealthMonitor {
    running: Arc<RwLock<bool>>,
    handle: RwLock<Option<JoinHandle<()>>>,
}

impl HealthMonitor {
    /// Create a stopped monitor.
    pub fn new() -> Self {
        Self {
            running: Arc::new(RwLock::new(false)),
            handle: RwLock::new(None),
        }
    }

    /// Start probing. No-op if already running.
    pub async fn start(
        &self,
        link: Arc<Mutex<DeviceLink>>,
        bus: Arc<EventBus>,
        config: &GatewayConfig,
    ) {
        let mut running = self.running.write().await;
        if *running {
            return;
        }
        *running = true;
        drop(running);

        let running_flag = self.running.clone();
        let interval = config.probe_interval;
        let threshold = config.failure_threshold;

        let handle = tokio::spawn(async move {
            let initial = link.lock().await.state();
            let mut tracker = ProbeTracker::new(initial, threshold);
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if !*running_flag.read().await {
                    break;
                }

                // Probe outside the link lock so command submission is
                // never blocked behind a slow reachability dial.
                let endpoint = link.lock().await.endpoint().clone();
                let reachable = endpoint.probe().await;

                let state = {
                    let mut link = link.lock().await;
                    match tracker.record(reachable, link.state()) {
                        ProbeAction::Reconnect => {
                            link.connect().await;
                        }
                        ProbeAction::ForceClose => {
                            tracing::warn!(
                                failures = tracker.consecutive_failures(),
                                "probe failure threshold reached, forcing link down"
                            );
                            link.close();
                        }
                        ProbeAction::None => {}
                    }
                    link.state()
                };

                if let Some((from, to)) = tracker.observe(state) {
                    tracing::info!(from = %from, to = %to, "device connectivity changed");
                    bus.publish(GatewayEvent::ConnectivityChanged { from, to });
                }
            }
        });

        *self.handle.write().await = Some(handle);
    }

    /// Stop probing deterministically; no timer or task is leaked.
    pub async fn stop(&self) {
        *self.running.write().await = false;
        if let Some(handle) = self.handle.write().await.take() {
            handle.abort();
            let _ = handle.await;
        }
    }

    /// Whether the probe task is running.
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}
