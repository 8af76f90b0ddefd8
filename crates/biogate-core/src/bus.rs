//! Event bus with bounded per-subscriber backlogs.
//!
//! The bus distributes [`GatewayEvent`]s to all active subscriptions.
//! Each subscription owns an independent bounded backlog so one slow
//! dashboard client can never stall ingestion: `publish` appends under a
//! short lock and returns immediately. When a backlog is full the oldest
//! event is dropped and a single synthetic [`GatewayEvent::Overflow`]
//! marker is emitted at the gap on the next drain, carrying the dropped
//! count. Attendance events are best-effort telemetry for a live
//! dashboard, not a durable ledger; losing old events under pressure is
//! acceptable while losing liveness is not.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::event::GatewayEvent;

/// Default per-subscriber backlog capacity.
pub const DEFAULT_BACKLOG_CAPACITY: usize = 256;

/// Unique subscriber identifier.
pub type SubscriberId = Uuid;

/// Backlog state for one subscriber.
struct Backlog {
    queue: VecDeque<GatewayEvent>,
    /// Events dropped since the last drain; folded into one overflow
    /// marker at the gap position.
    dropped: u64,
}

/// State shared between the bus and a subscription handle.
struct SubscriptionShared {
    backlog: Mutex<Backlog>,
    notify: Notify,
    closed: AtomicBool,
}

type SubscriptionTable = DashMap<SubscriberId, Arc<SubscriptionShared>>;

/// In-process publish/subscribe hub.
pub struct EventBus {
    subs: Arc<SubscriptionTable>,
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus with default backlog capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BACKLOG_CAPACITY)
    }

    /// Create a new event bus with the given per-subscriber capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subs: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Publish an event to every active subscription.
    ///
    /// Never blocks on slow subscribers: full backlogs drop their oldest
    /// event atomically with the append. Returns the number of backlogs
    /// the event was delivered to; with no subscribers the event is
    /// discarded.
    pub fn publish(&self, event: GatewayEvent) -> usize {
        let mut delivered = 0;
        for entry in self.subs.iter() {
            let shared = entry.value();
            {
                let mut backlog = shared.backlog.lock();
                if backlog.queue.len() >= self.capacity {
                    backlog.queue.pop_front();
                    backlog.dropped += 1;
                }
                backlog.queue.push_back(event.clone());
            }
            shared.notify.notify_one();
            delivered += 1;
        }
        tracing::trace!(event = event.type_name(), delivered, "published event");
        delivered
    }

    /// Create a new subscription with an empty backlog.
    pub fn subscribe(&self) -> Subscription {
        let id = Uuid::new_v4();
        let shared = Arc::new(SubscriptionShared {
            backlog: Mutex::new(Backlog {
                queue: VecDeque::with_capacity(self.capacity.min(64)),
                dropped: 0,
            }),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        });
        self.subs.insert(id, shared.clone());
        tracing::debug!(subscriber = %id, "subscriber attached");
        Subscription {
            id,
            shared,
            table: Arc::downgrade(&self.subs),
        }
    }

    /// Remove a subscription. Idempotent.
    pub fn unsubscribe(&self, id: SubscriberId) {
        if let Some((_, shared)) = self.subs.remove(&id) {
            shared.closed.store(true, Ordering::Release);
            shared.notify.notify_one();
            tracing::debug!(subscriber = %id, "subscriber detached");
        }
    }

    /// Get the number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subs.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to one subscriber's backlog.
///
/// Dropping the handle detaches the subscription from the bus.
pub struct Subscription {
    id: SubscriberId,
    shared: Arc<SubscriptionShared>,
    table: Weak<SubscriptionTable>,
}

impl Subscription {
    /// Get the subscriber id.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Whether the subscription is still attached to the bus.
    pub fn is_active(&self) -> bool {
        !self.shared.closed.load(Ordering::Acquire)
    }

    /// Drain all buffered events, waiting up to `wait` for the first one.
    ///
    /// Returns every event currently in the backlog, preceded by an
    /// [`GatewayEvent::Overflow`] marker if events were dropped since the
    /// previous drain. Returns an empty vec once the deadline elapses or
    /// the subscription is closed; never blocks indefinitely.
    pub async fn drain(&self, wait: Duration) -> Vec<GatewayEvent> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let batch = self.take_batch();
            if !batch.is_empty() {
                return batch;
            }
            if self.shared.closed.load(Ordering::Acquire) {
                return Vec::new();
            }
            if tokio::time::timeout_at(deadline, self.shared.notify.notified())
                .await
                .is_err()
            {
                // Deadline elapsed; one final sweep for events that raced in.
                return self.take_batch();
            }
        }
    }

    /// Take everything buffered right now, without waiting.
    pub fn try_drain(&self) -> Vec<GatewayEvent> {
        self.take_batch()
    }

    fn take_batch(&self) -> Vec<GatewayEvent> {
        let mut backlog = self.shared.backlog.lock();
        if backlog.queue.is_empty() && backlog.dropped == 0 {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(backlog.queue.len() + 1);
        if backlog.dropped > 0 {
            out.push(GatewayEvent::Overflow {
                dropped: backlog.dropped,
            });
            backlog.dropped = 0;
        }
        out.extend(backlog.queue.drain(..));
        out
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
        if let Some(table) = self.table.upgrade() {
            table.remove(&self.id);
        }
    }
}
