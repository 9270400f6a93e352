//! Pure relay logic: the single source of truth for scores and the cached
//! countdown state, independent of any socket plumbing.

use indexmap::IndexMap;

use crate::dto::ws::{WireMessage, sanitize_ms, sanitize_secs};

/// Countdown state as the relay caches it between broadcasts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerWireState {
    /// Whether the last authoritative command left the countdown running.
    pub is_running: bool,
    /// Epoch milliseconds of the announced start instant (0 when stopped).
    pub start_time_ms: u64,
    /// Frozen remaining milliseconds while stopped.
    pub paused_remaining_ms: u64,
    /// Countdown length in seconds.
    pub duration_secs: u64,
}

impl TimerWireState {
    /// Stopped-at-full-duration state.
    pub fn reset(duration_secs: u64) -> Self {
        Self {
            is_running: false,
            start_time_ms: 0,
            paused_remaining_ms: duration_secs * 1_000,
            duration_secs,
        }
    }

    /// Render the cached state as a `timer-sync` frame.
    pub fn to_sync_frame(&self) -> WireMessage {
        WireMessage::TimerSync {
            is_running: self.is_running,
            start_time: Some(self.start_time_ms as f64),
            paused_time_remaining: Some(self.paused_remaining_ms as f64),
            duration: Some(self.duration_secs as f64),
        }
    }
}

/// Final match result extracted from a `game-over` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Winner name, `"Tie"`, or `"None"`.
    pub winner: String,
    /// Aggregate scores per competitor.
    pub scores: IndexMap<String, i64>,
}

/// What the socket layer must do after a frame has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayAction {
    /// Fan the frame out to every connected client (sender included).
    Broadcast(WireMessage),
    /// Answer the sending client only.
    Reply(WireMessage),
    /// Hand the result to the history store (failures are non-fatal).
    Persist(MatchResult),
}

/// Authoritative per-session scoreboard state.
///
/// Clients only ever see scores through the snapshots this core broadcasts;
/// their local caches are overwritten wholesale on every `counters` frame.
#[derive(Debug, Clone)]
pub struct RelayCore {
    counters: IndexMap<String, i64>,
    timer: TimerWireState,
}

impl RelayCore {
    /// Build a core with the given countdown default and pre-seeded
    /// competitor ids (all at zero).
    pub fn new(default_duration_secs: u64, competitors: &[String]) -> Self {
        let counters = competitors
            .iter()
            .map(|name| (name.clone(), 0))
            .collect();
        Self {
            counters,
            timer: TimerWireState::reset(default_duration_secs),
        }
    }

    /// Frames pushed to a client right after it connects.
    pub fn greeting(&self) -> Vec<WireMessage> {
        vec![
            WireMessage::Counters {
                values: self.counters.clone(),
            },
            self.timer.to_sync_frame(),
        ]
    }

    /// Current authoritative score values.
    pub fn counters(&self) -> &IndexMap<String, i64> {
        &self.counters
    }

    /// Cached countdown state.
    pub fn timer(&self) -> &TimerWireState {
        &self.timer
    }

    /// Apply one inbound frame and describe the required follow-up.
    ///
    /// Unknown and client-bound frame types are ignored; `now_ms` is the
    /// relay's own clock, used only for fallback values.
    pub fn apply(&mut self, message: WireMessage, now_ms: u64) -> Vec<RelayAction> {
        match message {
            WireMessage::Increment { counter_id, value } => {
                *self.counters.entry(counter_id).or_insert(0) += value;
                vec![self.counters_broadcast()]
            }
            WireMessage::SubtractCounter { counter_id, value } => {
                let entry = self.counters.entry(counter_id).or_insert(0);
                *entry = (*entry - value).max(0);
                vec![self.counters_broadcast()]
            }
            WireMessage::ResetCounters => {
                for score in self.counters.values_mut() {
                    *score = 0;
                }
                vec![self.counters_broadcast()]
            }
            WireMessage::Ping => vec![RelayAction::Reply(WireMessage::Pong)],
            WireMessage::TimerStart {
                start_time,
                duration,
                elapsed_time,
                ..
            } => {
                let duration_secs =
                    sanitize_secs(duration).unwrap_or(self.timer.duration_secs);
                let start_time_ms = sanitize_ms(start_time).unwrap_or(now_ms);
                self.timer = TimerWireState {
                    is_running: true,
                    start_time_ms,
                    paused_remaining_ms: 0,
                    duration_secs,
                };
                vec![RelayAction::Broadcast(WireMessage::TimerStart {
                    start_time: Some(start_time_ms as f64),
                    duration: Some(duration_secs as f64),
                    elapsed_time: Some(sanitize_ms(elapsed_time).unwrap_or(0) as f64),
                    paused_time_remaining: None,
                })]
            }
            WireMessage::TimerPause {
                paused_time_remaining,
                paused_time,
            } => {
                let remaining = sanitize_ms(paused_time_remaining)
                    .or(sanitize_ms(paused_time))
                    .unwrap_or_else(|| self.fallback_remaining(now_ms));
                self.timer.is_running = false;
                self.timer.start_time_ms = 0;
                self.timer.paused_remaining_ms = remaining;
                vec![RelayAction::Broadcast(WireMessage::TimerPause {
                    paused_time_remaining: Some(remaining as f64),
                    paused_time: None,
                })]
            }
            WireMessage::TimerReset { duration } => {
                let duration_secs =
                    sanitize_secs(duration).unwrap_or(self.timer.duration_secs);
                self.timer = TimerWireState::reset(duration_secs);
                vec![RelayAction::Broadcast(WireMessage::TimerReset {
                    duration: Some(duration_secs as f64),
                })]
            }
            WireMessage::TimerSyncRequest => {
                vec![RelayAction::Reply(self.timer.to_sync_frame())]
            }
            WireMessage::RoundStart => vec![RelayAction::Broadcast(WireMessage::RoundStart)],
            WireMessage::GameOver {
                game_winner,
                scores,
            } => vec![RelayAction::Persist(MatchResult {
                winner: game_winner,
                scores,
            })],
            WireMessage::Counters { .. }
            | WireMessage::TimerSync { .. }
            | WireMessage::Pong
            | WireMessage::Unknown => Vec::new(),
        }
    }

    /// Remaining time when a pause frame carried no usable value: derive it
    /// from the cached start instant, else fall back to the full duration.
    fn fallback_remaining(&self, now_ms: u64) -> u64 {
        let duration_ms = self.timer.duration_secs * 1_000;
        if self.timer.is_running && self.timer.start_time_ms > 0 {
            duration_ms.saturating_sub(now_ms.saturating_sub(self.timer.start_time_ms))
        } else {
            duration_ms
        }
    }

    fn counters_broadcast(&self) -> RelayAction {
        RelayAction::Broadcast(WireMessage::Counters {
            values: self.counters.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core() -> RelayCore {
        RelayCore::new(60, &["Chung".to_string(), "Hong".to_string()])
    }

    fn broadcast_values(actions: &[RelayAction]) -> IndexMap<String, i64> {
        match actions {
            [RelayAction::Broadcast(WireMessage::Counters { values })] => values.clone(),
            other => panic!("expected a counters broadcast, got {other:?}"),
        }
    }

    #[test]
    fn greeting_carries_seeded_counters_and_timer_state() {
        let core = core();
        let frames = core.greeting();
        assert_eq!(frames.len(), 2);
        match &frames[0] {
            WireMessage::Counters { values } => {
                assert_eq!(values.get("Chung"), Some(&0));
                assert_eq!(values.get("Hong"), Some(&0));
            }
            other => panic!("expected counters, got {other:?}"),
        }
        match &frames[1] {
            WireMessage::TimerSync {
                is_running,
                duration,
                ..
            } => {
                assert!(!is_running);
                assert_eq!(*duration, Some(60.0));
            }
            other => panic!("expected timer-sync, got {other:?}"),
        }
    }

    #[test]
    fn increment_creates_unknown_counters_at_zero() {
        let mut core = core();
        let actions = core.apply(
            WireMessage::Increment {
                counter_id: "Blue".into(),
                value: 3,
            },
            0,
        );
        assert_eq!(broadcast_values(&actions).get("Blue"), Some(&3));
    }

    #[test]
    fn increment_accepts_negative_corrections() {
        let mut core = core();
        core.apply(
            WireMessage::Increment {
                counter_id: "Chung".into(),
                value: 2,
            },
            0,
        );
        let actions = core.apply(
            WireMessage::Increment {
                counter_id: "Chung".into(),
                value: -1,
            },
            0,
        );
        assert_eq!(broadcast_values(&actions).get("Chung"), Some(&1));
    }

    #[test]
    fn subtract_clamps_at_zero() {
        let mut core = core();
        core.apply(
            WireMessage::Increment {
                counter_id: "Hong".into(),
                value: 1,
            },
            0,
        );
        let actions = core.apply(
            WireMessage::SubtractCounter {
                counter_id: "Hong".into(),
                value: 5,
            },
            0,
        );
        assert_eq!(broadcast_values(&actions).get("Hong"), Some(&0));
    }

    #[test]
    fn reset_zeroes_every_known_counter() {
        let mut core = core();
        core.apply(
            WireMessage::Increment {
                counter_id: "Chung".into(),
                value: 4,
            },
            0,
        );
        let actions = core.apply(WireMessage::ResetCounters, 0);
        let values = broadcast_values(&actions);
        assert_eq!(values.get("Chung"), Some(&0));
        assert_eq!(values.get("Hong"), Some(&0));
    }

    #[test]
    fn timer_start_falls_back_to_cached_duration_and_relay_now() {
        let mut core = core();
        let actions = core.apply(
            WireMessage::TimerStart {
                start_time: Some(f64::NAN),
                duration: None,
                elapsed_time: None,
                paused_time_remaining: None,
            },
            777_000,
        );
        match &actions[..] {
            [RelayAction::Broadcast(WireMessage::TimerStart {
                start_time,
                duration,
                ..
            })] => {
                assert_eq!(*start_time, Some(777_000.0));
                assert_eq!(*duration, Some(60.0));
            }
            other => panic!("expected normalized timer-start, got {other:?}"),
        }
        assert!(core.timer().is_running);
    }

    #[test]
    fn pause_without_value_derives_remaining_from_start_instant() {
        let mut core = core();
        core.apply(
            WireMessage::TimerStart {
                start_time: Some(100_000.0),
                duration: Some(60.0),
                elapsed_time: None,
                paused_time_remaining: None,
            },
            100_000,
        );
        let actions = core.apply(
            WireMessage::TimerPause {
                paused_time_remaining: None,
                paused_time: None,
            },
            125_000,
        );
        match &actions[..] {
            [RelayAction::Broadcast(WireMessage::TimerPause {
                paused_time_remaining,
                ..
            })] => assert_eq!(*paused_time_remaining, Some(35_000.0)),
            other => panic!("expected timer-pause, got {other:?}"),
        }
    }

    #[test]
    fn pause_with_no_usable_state_freezes_at_full_duration() {
        let mut core = core();
        let actions = core.apply(
            WireMessage::TimerPause {
                paused_time_remaining: Some(f64::NAN),
                paused_time: None,
            },
            5_000,
        );
        match &actions[..] {
            [RelayAction::Broadcast(WireMessage::TimerPause {
                paused_time_remaining,
                ..
            })] => assert_eq!(*paused_time_remaining, Some(60_000.0)),
            other => panic!("expected timer-pause, got {other:?}"),
        }
    }

    #[test]
    fn sync_request_is_answered_to_the_sender_only() {
        let mut core = core();
        let actions = core.apply(WireMessage::TimerSyncRequest, 0);
        assert_eq!(
            actions,
            vec![RelayAction::Reply(core.timer().to_sync_frame())]
        );
    }

    #[test]
    fn game_over_is_persisted_not_rebroadcast() {
        let mut core = core();
        let mut scores = IndexMap::new();
        scores.insert("Chung".to_string(), 7);
        let actions = core.apply(
            WireMessage::GameOver {
                game_winner: "Chung".into(),
                scores: scores.clone(),
            },
            0,
        );
        assert_eq!(
            actions,
            vec![RelayAction::Persist(MatchResult {
                winner: "Chung".into(),
                scores,
            })]
        );
    }

    #[test]
    fn unknown_frames_are_ignored() {
        let mut core = core();
        assert!(core.apply(WireMessage::Unknown, 0).is_empty());
        assert!(core.apply(WireMessage::Pong, 0).is_empty());
    }
}
