//! Pure wall-clock arithmetic for the shared countdown.
//!
//! Every client evaluates the sender's absolute timestamps against its own
//! clock; the protocol tolerates (and does not correct) clock skew between
//! peers, which is acceptable for same-room deployments.

use std::time::{SystemTime, UNIX_EPOCH};

/// Countdown position expressed in wall-clock terms.
///
/// Exactly one of `start_wall_clock` (while running) or `paused_remaining_ms`
/// (while paused or reset) is authoritative for computing remaining time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerState {
    /// Whether the countdown is currently running.
    pub running: bool,
    /// Full countdown length in milliseconds.
    pub duration_ms: u64,
    /// Epoch milliseconds of the (possibly back-dated) start instant.
    pub start_wall_clock: Option<u64>,
    /// Frozen remaining time while paused.
    pub paused_remaining_ms: Option<u64>,
}

/// Remaining countdown time at `now_ms`, clamped to zero.
pub fn remaining_ms(state: &TimerState, now_ms: u64) -> u64 {
    if state.running {
        match state.start_wall_clock {
            Some(start) => state
                .duration_ms
                .saturating_sub(elapsed_since_start(start, now_ms)),
            None => state.duration_ms,
        }
    } else {
        state.paused_remaining_ms.unwrap_or(state.duration_ms)
    }
}

/// Milliseconds elapsed since `start_wall_clock`, clamped to zero for
/// timestamps that lie in the receiver's future (skewed sender clocks).
pub fn elapsed_since_start(start_wall_clock: u64, now_ms: u64) -> u64 {
    now_ms.saturating_sub(start_wall_clock)
}

/// Source of epoch-millisecond timestamps.
///
/// Injected everywhere a component needs "now" so tests can drive time
/// manually while production uses the system clock.
pub trait WallClock: Send + Sync {
    /// Current wall-clock time in epoch milliseconds.
    fn now_ms(&self) -> u64;
}

/// [`WallClock`] backed by [`SystemTime`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(duration_ms: u64, start: u64) -> TimerState {
        TimerState {
            running: true,
            duration_ms,
            start_wall_clock: Some(start),
            paused_remaining_ms: None,
        }
    }

    #[test]
    fn running_timer_counts_down_against_local_now() {
        let state = running(60_000, 1_000);
        assert_eq!(remaining_ms(&state, 1_000), 60_000);
        assert_eq!(remaining_ms(&state, 31_000), 30_000);
        assert_eq!(remaining_ms(&state, 61_000), 0);
    }

    #[test]
    fn expired_timer_clamps_to_zero() {
        let state = running(60_000, 1_000);
        assert_eq!(remaining_ms(&state, 500_000), 0);
    }

    #[test]
    fn start_timestamp_in_the_future_reads_as_full_duration() {
        // A skewed sender can stamp a start instant ahead of our clock.
        let state = running(60_000, 10_000);
        assert_eq!(remaining_ms(&state, 5_000), 60_000);
    }

    #[test]
    fn paused_timer_reports_frozen_remaining() {
        let state = TimerState {
            running: false,
            duration_ms: 60_000,
            start_wall_clock: None,
            paused_remaining_ms: Some(42_500),
        };
        assert_eq!(remaining_ms(&state, 999_999), 42_500);
    }

    #[test]
    fn reset_timer_reports_full_duration() {
        let state = TimerState {
            running: false,
            duration_ms: 60_000,
            start_wall_clock: None,
            paused_remaining_ms: None,
        };
        assert_eq!(remaining_ms(&state, 123), 60_000);
    }
}
