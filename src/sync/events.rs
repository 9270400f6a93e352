use indexmap::IndexMap;
use tokio::sync::broadcast;

use crate::sync::match_flow::Winner;

/// Notifications emitted by the sync core for display layers to consume.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Transport connectivity flipped.
    ConnectionChanged {
        /// New connectivity state.
        connected: bool,
    },
    /// An authoritative score snapshot was applied.
    ScoresUpdated {
        /// The full replacement values.
        values: IndexMap<String, i64>,
    },
    /// Periodic countdown observation.
    TimerTick {
        /// Remaining time to display.
        remaining_ms: u64,
    },
    /// The countdown crossed zero (once per cycle).
    TimerEnded,
    /// A new match began on this client.
    MatchStarted {
        /// Best-of-N round count.
        max_rounds: u32,
        /// Round length in seconds.
        duration_secs: u64,
    },
    /// A round began; `round` is known for locally driven rounds and absent
    /// for the informational `round-start` relay notice.
    RoundStarted {
        /// 1-based round number when known.
        round: Option<u32>,
    },
    /// A round finished and was scored.
    RoundEnded {
        /// 1-based round number.
        round: u32,
        /// Outcome of the round.
        winner: Winner,
        /// Non-tie round wins per competitor so far.
        standings: IndexMap<String, u32>,
        /// True when the match is decided and no further round may start.
        match_decided: bool,
    },
    /// The match concluded, either locally or announced by a peer.
    MatchEnded {
        /// Overall match outcome.
        winner: Winner,
        /// Total points per competitor across all rounds.
        total_scores: IndexMap<String, i64>,
    },
}

/// Broadcast hub fanning session events out to any number of subscribers.
///
/// Sends never fail; events emitted while nobody listens are dropped.
#[derive(Debug, Clone)]
pub struct EventHub {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventHub {
    /// Construct a hub backed by a Tokio broadcast channel of `capacity`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: SessionEvent) {
        let _ = self.sender.send(event);
    }
}
