//! Pure countdown state machine shared by every scoreboard client.
//!
//! All transitions are synchronous and take `now` as a parameter; the async
//! tick loop and the network broadcasts live in
//! [`timer_engine`](crate::sync::timer_engine). Remote appliers mirror the
//! corresponding local transitions but must never trigger a re-broadcast.

use crate::sync::clock::{self, TimerState};

/// The three externally observable countdown phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownPhase {
    /// Remaining time equals the full duration; nothing is ticking.
    Reset,
    /// Counting down from a wall-clock start instant.
    Running,
    /// Frozen at a remaining-time value (also the terminal state of a cycle).
    Paused,
}

/// Result of a periodic tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    /// Remaining time to display.
    pub remaining_ms: u64,
    /// True exactly once per cycle, on the tick that crosses zero.
    pub just_ended: bool,
}

/// Result of a pause request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseOutcome {
    /// Countdown frozen with time still on the clock; broadcast a pause.
    Paused {
        /// Remaining time at the pause instant.
        remaining_ms: u64,
    },
    /// The pause landed exactly on the zero-crossing; the cycle ended and no
    /// extra broadcast is needed (every peer reaches zero on its own clock).
    Ended,
    /// The countdown was not running; nothing changed.
    NotRunning,
}

/// Countdown state machine: `Reset` ⇄ `Running` ⇄ `Paused`.
///
/// The `end_fired` guard makes the end-of-cycle notification fire at most
/// once per `Running` → zero transition even when a pause request races the
/// zero-crossing tick.
#[derive(Debug, Clone)]
pub struct Countdown {
    duration_ms: u64,
    phase: CountdownPhase,
    start_wall_clock: Option<u64>,
    paused_remaining_ms: Option<u64>,
    /// Duration change requested while running, applied at the next reset.
    pending_duration_ms: Option<u64>,
    end_fired: bool,
}

impl Countdown {
    /// Create a countdown in the `Reset` phase with the given duration.
    pub fn new(duration_secs: u64) -> Self {
        Self {
            duration_ms: duration_secs * 1_000,
            phase: CountdownPhase::Reset,
            start_wall_clock: None,
            paused_remaining_ms: None,
            pending_duration_ms: None,
            end_fired: false,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> CountdownPhase {
        self.phase
    }

    /// Configured duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Wall-clock view of the countdown, suitable for clock arithmetic and
    /// for building sync frames.
    pub fn state(&self) -> TimerState {
        TimerState {
            running: self.phase == CountdownPhase::Running,
            duration_ms: self.duration_ms,
            start_wall_clock: self.start_wall_clock,
            paused_remaining_ms: self.paused_remaining_ms,
        }
    }

    /// Remaining time at `now_ms`.
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        clock::remaining_ms(&self.state(), now_ms)
    }

    /// Change the countdown duration (seconds).
    ///
    /// While running the change is deferred and applied at the next reset;
    /// returns `false` in that case so callers can log the deferral.
    pub fn set_duration_secs(&mut self, duration_secs: u64) -> bool {
        let duration_ms = duration_secs * 1_000;
        if self.phase == CountdownPhase::Running {
            self.pending_duration_ms = Some(duration_ms);
            return false;
        }
        self.duration_ms = duration_ms;
        self.pending_duration_ms = None;
        if self.phase == CountdownPhase::Reset {
            self.paused_remaining_ms = None;
        }
        true
    }

    /// Start or resume the countdown.
    ///
    /// Returns `false` when already running. The start instant is back-dated
    /// by the time already consumed, so a resumed countdown continues where
    /// it paused.
    pub fn start(&mut self, now_ms: u64) -> bool {
        if self.phase == CountdownPhase::Running {
            return false;
        }
        let remaining = self.paused_remaining_ms.unwrap_or(self.duration_ms);
        let consumed = self.duration_ms.saturating_sub(remaining);
        self.start_wall_clock = Some(now_ms.saturating_sub(consumed));
        self.paused_remaining_ms = None;
        self.phase = CountdownPhase::Running;
        self.end_fired = false;
        true
    }

    /// Freeze the countdown at its current remaining time.
    pub fn pause(&mut self, now_ms: u64) -> PauseOutcome {
        if self.phase != CountdownPhase::Running {
            return PauseOutcome::NotRunning;
        }
        let remaining = self.remaining_ms(now_ms);
        self.phase = CountdownPhase::Paused;
        self.start_wall_clock = None;
        self.paused_remaining_ms = Some(remaining);
        if remaining == 0 {
            self.end_fired = true;
            return PauseOutcome::Ended;
        }
        PauseOutcome::Paused {
            remaining_ms: remaining,
        }
    }

    /// Return to full duration, stopped. Applies any deferred duration.
    pub fn reset(&mut self) {
        if let Some(pending) = self.pending_duration_ms.take() {
            self.duration_ms = pending;
        }
        self.phase = CountdownPhase::Reset;
        self.start_wall_clock = None;
        self.paused_remaining_ms = None;
        self.end_fired = false;
    }

    /// Advance the countdown by one observation at `now_ms`.
    ///
    /// On the zero-crossing the countdown freezes itself (terminal pause for
    /// the cycle) and reports `just_ended` exactly once.
    pub fn tick(&mut self, now_ms: u64) -> TickOutcome {
        let remaining = self.remaining_ms(now_ms);
        if self.phase != CountdownPhase::Running {
            return TickOutcome {
                remaining_ms: remaining,
                just_ended: false,
            };
        }
        if remaining == 0 {
            self.phase = CountdownPhase::Paused;
            self.start_wall_clock = None;
            self.paused_remaining_ms = Some(0);
            let first_crossing = !self.end_fired;
            self.end_fired = true;
            return TickOutcome {
                remaining_ms: 0,
                just_ended: first_crossing,
            };
        }
        TickOutcome {
            remaining_ms: remaining,
            just_ended: false,
        }
    }

    /// Mirror a remote `timer-start`.
    ///
    /// Invalid or missing numbers fall back to the last-known duration and to
    /// the receiver's own `now`. A start instant that is already expired is
    /// accepted as-is; the next tick reports zero and ends the cycle.
    pub fn apply_remote_start(
        &mut self,
        start_time_ms: Option<u64>,
        duration_secs: Option<u64>,
        now_ms: u64,
    ) {
        if let Some(duration) = duration_secs {
            self.duration_ms = duration * 1_000;
            self.pending_duration_ms = None;
        }
        self.start_wall_clock = Some(start_time_ms.unwrap_or(now_ms));
        self.paused_remaining_ms = None;
        self.phase = CountdownPhase::Running;
        self.end_fired = false;
    }

    /// Mirror a remote `timer-pause`.
    ///
    /// Fallback chain for the frozen value: supplied field, then the locally
    /// computed remaining time, then the full duration.
    pub fn apply_remote_pause(&mut self, paused_remaining_ms: Option<u64>, now_ms: u64) {
        let remaining = paused_remaining_ms.unwrap_or_else(|| self.remaining_ms(now_ms));
        self.phase = CountdownPhase::Paused;
        self.start_wall_clock = None;
        self.paused_remaining_ms = Some(remaining.min(self.duration_ms));
    }

    /// Mirror a remote `timer-reset`, optionally adopting a new duration.
    pub fn apply_remote_reset(&mut self, duration_secs: Option<u64>) {
        self.reset();
        if let Some(duration) = duration_secs {
            self.duration_ms = duration * 1_000;
        }
    }

    /// Mirror a full `timer-sync` frame.
    pub fn apply_remote_sync(
        &mut self,
        is_running: bool,
        start_time_ms: Option<u64>,
        paused_remaining_ms: Option<u64>,
        duration_secs: Option<u64>,
        now_ms: u64,
    ) {
        if is_running {
            self.apply_remote_start(start_time_ms, duration_secs, now_ms);
        } else {
            if let Some(duration) = duration_secs {
                self.duration_ms = duration * 1_000;
                self.pending_duration_ms = None;
            }
            self.apply_remote_pause(paused_remaining_ms, now_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_reset_at_full_duration() {
        let countdown = Countdown::new(60);
        assert_eq!(countdown.phase(), CountdownPhase::Reset);
        assert_eq!(countdown.remaining_ms(12_345), 60_000);
    }

    #[test]
    fn start_then_pause_freezes_elapsed_time() {
        let mut countdown = Countdown::new(60);
        assert!(countdown.start(10_000));
        match countdown.pause(25_000) {
            PauseOutcome::Paused { remaining_ms } => assert_eq!(remaining_ms, 45_000),
            other => panic!("expected paused outcome, got {other:?}"),
        }
        assert_eq!(countdown.remaining_ms(99_999), 45_000);
    }

    #[test]
    fn resume_continues_from_paused_remaining() {
        let mut countdown = Countdown::new(60);
        countdown.start(0);
        countdown.pause(20_000);
        assert!(countdown.start(100_000));
        // 40s left; 5s later the display should read 35s.
        assert_eq!(countdown.remaining_ms(105_000), 35_000);
    }

    #[test]
    fn reset_restores_full_duration_from_any_phase() {
        let mut countdown = Countdown::new(60);
        countdown.reset();
        assert_eq!(countdown.remaining_ms(0), 60_000);

        countdown.start(0);
        countdown.reset();
        assert_eq!(countdown.phase(), CountdownPhase::Reset);
        assert_eq!(countdown.remaining_ms(30_000), 60_000);

        countdown.start(0);
        countdown.pause(10_000);
        countdown.reset();
        assert_eq!(countdown.remaining_ms(30_000), 60_000);
    }

    #[test]
    fn tick_crosses_zero_exactly_once() {
        let mut countdown = Countdown::new(1);
        countdown.start(0);
        let first = countdown.tick(1_500);
        assert!(first.just_ended);
        assert_eq!(first.remaining_ms, 0);
        let second = countdown.tick(2_000);
        assert!(!second.just_ended);
        assert_eq!(countdown.phase(), CountdownPhase::Paused);
    }

    #[test]
    fn pause_racing_the_zero_crossing_ends_once() {
        let mut countdown = Countdown::new(1);
        countdown.start(0);
        // Pause lands exactly when the clock runs out.
        assert_eq!(countdown.pause(1_000), PauseOutcome::Ended);
        // A late tick observes zero but must not end the cycle again.
        let tick = countdown.tick(1_100);
        assert!(!tick.just_ended);
    }

    #[test]
    fn tick_then_stale_pause_does_not_double_end() {
        let mut countdown = Countdown::new(1);
        countdown.start(0);
        assert!(countdown.tick(1_000).just_ended);
        assert_eq!(countdown.pause(1_050), PauseOutcome::NotRunning);
    }

    #[test]
    fn new_cycle_rearms_the_end_notification() {
        let mut countdown = Countdown::new(1);
        countdown.start(0);
        assert!(countdown.tick(1_000).just_ended);
        countdown.reset();
        countdown.start(5_000);
        assert!(countdown.tick(6_200).just_ended);
    }

    #[test]
    fn set_duration_defers_while_running() {
        let mut countdown = Countdown::new(60);
        countdown.start(0);
        assert!(!countdown.set_duration_secs(90));
        // Unchanged mid-flight.
        assert_eq!(countdown.duration_ms(), 60_000);
        countdown.reset();
        assert_eq!(countdown.duration_ms(), 90_000);
        assert_eq!(countdown.remaining_ms(0), 90_000);
    }

    #[test]
    fn set_duration_applies_immediately_when_stopped() {
        let mut countdown = Countdown::new(60);
        assert!(countdown.set_duration_secs(120));
        assert_eq!(countdown.remaining_ms(0), 120_000);
    }

    #[test]
    fn remote_start_already_expired_ends_on_next_tick() {
        let mut countdown = Countdown::new(60);
        // Sender started more than a full duration ago.
        countdown.apply_remote_start(Some(0), Some(60), 100_000);
        let tick = countdown.tick(100_100);
        assert_eq!(tick.remaining_ms, 0);
        assert!(tick.just_ended);
    }

    #[test]
    fn remote_start_without_timestamp_uses_local_now() {
        let mut countdown = Countdown::new(60);
        countdown.apply_remote_start(None, None, 50_000);
        assert_eq!(countdown.remaining_ms(50_000), 60_000);
    }

    #[test]
    fn remote_pause_falls_back_to_local_remaining() {
        let mut countdown = Countdown::new(60);
        countdown.apply_remote_start(Some(0), Some(60), 0);
        // Bad frame: no usable pausedTimeRemaining.
        countdown.apply_remote_pause(None, 15_000);
        assert_eq!(countdown.remaining_ms(999_999), 45_000);
    }

    #[test]
    fn remote_pause_clamps_to_duration() {
        let mut countdown = Countdown::new(60);
        countdown.apply_remote_pause(Some(90_000), 0);
        assert_eq!(countdown.remaining_ms(0), 60_000);
    }

    #[test]
    fn remote_sync_mirrors_running_and_paused_branches() {
        let mut countdown = Countdown::new(60);
        countdown.apply_remote_sync(true, Some(1_000), None, Some(30), 2_000);
        assert_eq!(countdown.phase(), CountdownPhase::Running);
        assert_eq!(countdown.remaining_ms(2_000), 29_000);

        countdown.apply_remote_sync(false, None, Some(12_000), Some(30), 5_000);
        assert_eq!(countdown.phase(), CountdownPhase::Paused);
        assert_eq!(countdown.remaining_ms(999), 12_000);
    }
}
