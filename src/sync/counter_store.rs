use indexmap::IndexMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    dto::ws::WireMessage,
    sync::events::{EventHub, SessionEvent},
    transport::TransportHandle,
};

/// Two-tier score cache.
///
/// `confirmed` always holds the last authoritative relay snapshot;
/// `pending` accumulates optimistic local deltas that have been sent but not
/// yet echoed back. Reads overlay pending on confirmed; every incoming
/// snapshot replaces confirmed and wipes pending.
#[derive(Debug, Default)]
struct ScoreCaches {
    confirmed: IndexMap<String, i64>,
    pending: IndexMap<String, i64>,
}

impl ScoreCaches {
    fn effective(&self) -> IndexMap<String, i64> {
        let mut view = self.confirmed.clone();
        for (id, delta) in &self.pending {
            *view.entry(id.clone()).or_insert(0) += delta;
        }
        view
    }
}

/// Per-session score cache mirroring the relay's authoritative counters.
pub struct CounterStore {
    caches: Mutex<ScoreCaches>,
    transport: TransportHandle,
    events: EventHub,
}

impl CounterStore {
    /// Build a store bound to a transport and an event hub.
    pub fn new(transport: TransportHandle, events: EventHub) -> Self {
        Self {
            caches: Mutex::new(ScoreCaches::default()),
            transport,
            events,
        }
    }

    /// Request a score change for `id`.
    ///
    /// Fails silently (logged, not returned) while disconnected: no command
    /// is sent and the local cache is left untouched.
    pub async fn increment(&self, id: &str, delta: i64) {
        if !self.transport.is_connected() {
            warn!(counter = %id, delta, "cannot change score while disconnected");
            return;
        }
        self.transport.send(WireMessage::Increment {
            counter_id: id.to_string(),
            value: delta,
        });
        let mut caches = self.caches.lock().await;
        *caches.pending.entry(id.to_string()).or_insert(0) += delta;
    }

    /// Request a clamped score decrease for `id` (the relay floors at zero).
    pub async fn decrement(&self, id: &str, amount: i64) {
        if !self.transport.is_connected() {
            warn!(counter = %id, amount, "cannot change score while disconnected");
            return;
        }
        self.transport.send(WireMessage::SubtractCounter {
            counter_id: id.to_string(),
            value: amount,
        });
        let mut caches = self.caches.lock().await;
        let entry = caches.pending.entry(id.to_string()).or_insert(0);
        *entry -= amount;
    }

    /// Ask the relay to zero every score.
    ///
    /// The local cache is left alone until the authoritative zeroed
    /// snapshot arrives.
    pub async fn reset_all(&self) {
        if !self.transport.is_connected() {
            warn!("cannot reset scores while disconnected");
            return;
        }
        self.transport.send(WireMessage::ResetCounters);
    }

    /// Replace the confirmed tier with an authoritative snapshot.
    ///
    /// Idempotent; always fires [`SessionEvent::ScoresUpdated`], even when
    /// the values did not change.
    pub async fn apply_snapshot(&self, values: IndexMap<String, i64>) {
        {
            let mut caches = self.caches.lock().await;
            caches.confirmed = values.clone();
            caches.pending.clear();
        }
        debug!(count = values.len(), "applied score snapshot");
        self.events.broadcast(SessionEvent::ScoresUpdated { values });
    }

    /// Effective score for `id`; unknown ids read as zero.
    pub async fn value(&self, id: &str) -> i64 {
        let caches = self.caches.lock().await;
        caches.confirmed.get(id).copied().unwrap_or(0)
            + caches.pending.get(id).copied().unwrap_or(0)
    }

    /// Effective view of every known score, in snapshot order.
    pub async fn snapshot(&self) -> IndexMap<String, i64> {
        self.caches.lock().await.effective()
    }
}
