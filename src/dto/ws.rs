use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Wire envelope exchanged between scoreboard clients and the relay.
///
/// Every frame is a JSON object with a mandatory `type` tag. Field names keep
/// the mixed casing of the historical protocol (`counterId`, `startTime`,
/// `game_winner`); receivers must tolerate unknown types.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum WireMessage {
    /// Request a score change for one competitor (value may be negative).
    #[serde(rename = "increment")]
    Increment {
        #[serde(rename = "counterId")]
        counter_id: String,
        #[serde(default = "default_delta")]
        value: i64,
    },
    /// Request a clamped score decrease for one competitor.
    #[serde(rename = "subtract-counter")]
    SubtractCounter {
        #[serde(rename = "counterId")]
        counter_id: String,
        #[serde(default = "default_delta")]
        value: i64,
    },
    /// Zero every score on the relay.
    #[serde(rename = "reset-counters")]
    ResetCounters,
    /// Authoritative score snapshot; fully replaces the receiver's cache.
    #[serde(rename = "counters")]
    Counters { values: IndexMap<String, i64> },
    /// Liveness keep-alive.
    #[serde(rename = "ping")]
    Ping,
    /// Relay response to a ping.
    #[serde(rename = "pong")]
    Pong,
    /// Begin or resume the shared countdown.
    ///
    /// Time fields travel as raw JSON numbers and are validated on receipt;
    /// an absent or non-finite value falls back to the receiver's last-known
    /// state rather than failing the whole frame.
    #[serde(rename = "timer-start")]
    TimerStart {
        #[serde(rename = "startTime")]
        start_time: Option<f64>,
        /// Countdown length in seconds.
        duration: Option<f64>,
        #[serde(rename = "elapsedTime", skip_serializing_if = "Option::is_none")]
        elapsed_time: Option<f64>,
        #[serde(
            rename = "pausedTimeRemaining",
            skip_serializing_if = "Option::is_none"
        )]
        paused_time_remaining: Option<f64>,
    },
    /// Freeze the shared countdown.
    #[serde(rename = "timer-pause")]
    TimerPause {
        #[serde(rename = "pausedTimeRemaining")]
        paused_time_remaining: Option<f64>,
        /// Legacy alias some senders use instead of `pausedTimeRemaining`.
        #[serde(rename = "pausedTime", skip_serializing_if = "Option::is_none")]
        paused_time: Option<f64>,
    },
    /// Return the countdown to full duration, stopped.
    #[serde(rename = "timer-reset")]
    TimerReset {
        #[serde(skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
    },
    /// Full countdown state, pushed after a sync request or on connect.
    #[serde(rename = "timer-sync")]
    TimerSync {
        #[serde(rename = "isRunning")]
        is_running: bool,
        #[serde(rename = "startTime")]
        start_time: Option<f64>,
        #[serde(rename = "pausedTimeRemaining")]
        paused_time_remaining: Option<f64>,
        duration: Option<f64>,
    },
    /// Ask the relay for its cached countdown state (used after reconnect).
    #[serde(rename = "timer-sync-request")]
    TimerSyncRequest,
    /// Informational round-advance notice; receivers need no state change.
    #[serde(rename = "round-start")]
    RoundStart,
    /// Final match result, persisted by the relay's history store.
    #[serde(rename = "game-over")]
    GameOver {
        game_winner: String,
        scores: IndexMap<String, i64>,
    },
    /// Catch-all for message types this build does not understand.
    #[serde(other)]
    Unknown,
}

fn default_delta() -> i64 {
    1
}

/// Interpret an optional wire number as epoch/duration milliseconds.
///
/// Rejects non-finite and negative values so a malformed frame can never
/// poison timer arithmetic; callers supply their own fallback.
pub fn sanitize_ms(value: Option<f64>) -> Option<u64> {
    value
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as u64)
}

/// Interpret an optional wire number as a duration in whole seconds.
pub fn sanitize_secs(value: Option<f64>) -> Option<u64> {
    sanitize_ms(value)
}
