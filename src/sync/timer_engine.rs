use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, warn};

use crate::{
    dto::ws::WireMessage,
    sync::{
        clock::WallClock,
        countdown::{Countdown, CountdownPhase, PauseOutcome},
        events::{EventHub, SessionEvent},
    },
    transport::TransportHandle,
};

/// Async shell around the pure [`Countdown`] state machine.
///
/// Owns the periodic tick task (one per running cycle, always aborted before
/// a new one is spawned), broadcasts locally initiated transitions over the
/// transport, and mirrors remote transitions without re-broadcasting them.
/// Local control keeps working while the transport is disconnected; the
/// handle simply drops the frames.
pub struct TimerEngine {
    core: Mutex<Countdown>,
    clock: Arc<dyn WallClock>,
    transport: TransportHandle,
    events: EventHub,
    end_signal: mpsc::UnboundedSender<()>,
    tick_task: Mutex<Option<JoinHandle<()>>>,
    tick_interval: Duration,
}

impl TimerEngine {
    /// Build an engine in the reset phase.
    ///
    /// The returned receiver yields one unit per ended countdown cycle; the
    /// session loop forwards it to the round coordinator.
    pub fn new(
        duration_secs: u64,
        tick_interval: Duration,
        clock: Arc<dyn WallClock>,
        transport: TransportHandle,
        events: EventHub,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<()>) {
        let (end_signal, end_rx) = mpsc::unbounded_channel();
        let engine = Arc::new(Self {
            core: Mutex::new(Countdown::new(duration_secs)),
            clock,
            transport,
            events,
            end_signal,
            tick_task: Mutex::new(None),
            tick_interval,
        });
        (engine, end_rx)
    }

    /// Current phase.
    pub async fn phase(&self) -> CountdownPhase {
        self.core.lock().await.phase()
    }

    /// Remaining time right now, against the engine's own clock.
    pub async fn remaining_ms(&self) -> u64 {
        let now = self.clock.now_ms();
        self.core.lock().await.remaining_ms(now)
    }

    /// Configured duration in seconds.
    pub async fn duration_secs(&self) -> u64 {
        self.core.lock().await.duration_ms() / 1_000
    }

    /// Change the countdown duration; deferred until the next reset while
    /// running.
    pub async fn set_duration(&self, duration_secs: u64) {
        let applied = self.core.lock().await.set_duration_secs(duration_secs);
        if !applied {
            debug!(duration_secs, "duration change deferred until next reset");
        }
    }

    /// Start or resume the countdown and broadcast `timer-start`.
    pub async fn start(self: &Arc<Self>) {
        let now = self.clock.now_ms();
        let state = {
            let mut core = self.core.lock().await;
            if !core.start(now) {
                warn!("timer already running; start ignored");
                return;
            }
            core.state()
        };
        self.respawn_tick().await;

        let start_wall_clock = state.start_wall_clock.unwrap_or(now);
        self.transport.send(WireMessage::TimerStart {
            start_time: Some(start_wall_clock as f64),
            duration: Some((state.duration_ms / 1_000) as f64),
            elapsed_time: Some(now.saturating_sub(start_wall_clock) as f64),
            paused_time_remaining: None,
        });
    }

    /// Freeze the countdown and broadcast `timer-pause`.
    pub async fn pause(&self) {
        let now = self.clock.now_ms();
        let outcome = self.core.lock().await.pause(now);
        match outcome {
            PauseOutcome::Paused { remaining_ms } => {
                self.stop_tick().await;
                self.events
                    .broadcast(SessionEvent::TimerTick { remaining_ms });
                self.transport.send(WireMessage::TimerPause {
                    paused_time_remaining: Some(remaining_ms as f64),
                    paused_time: None,
                });
            }
            PauseOutcome::Ended => {
                // Zero-crossing: every peer reaches zero on its own clock, so
                // nothing extra goes on the wire.
                self.stop_tick().await;
                self.notify_cycle_end();
            }
            PauseOutcome::NotRunning => debug!("timer not running; pause ignored"),
        }
    }

    /// Return to full duration, stopped, and broadcast `timer-reset`.
    pub async fn reset(&self) {
        let duration_ms = {
            let mut core = self.core.lock().await;
            core.reset();
            core.duration_ms()
        };
        self.stop_tick().await;
        self.events.broadcast(SessionEvent::TimerTick {
            remaining_ms: duration_ms,
        });
        self.transport.send(WireMessage::TimerReset {
            duration: Some((duration_ms / 1_000) as f64),
        });
    }

    /// Mirror a remote `timer-start`; never re-broadcast.
    pub async fn apply_remote_start(
        self: &Arc<Self>,
        start_time_ms: Option<u64>,
        duration_secs: Option<u64>,
    ) {
        let now = self.clock.now_ms();
        self.core
            .lock()
            .await
            .apply_remote_start(start_time_ms, duration_secs, now);
        self.respawn_tick().await;
    }

    /// Mirror a remote `timer-pause`; never re-broadcast.
    pub async fn apply_remote_pause(&self, paused_remaining_ms: Option<u64>) {
        let now = self.clock.now_ms();
        let remaining = {
            let mut core = self.core.lock().await;
            core.apply_remote_pause(paused_remaining_ms, now);
            core.remaining_ms(now)
        };
        self.stop_tick().await;
        self.events.broadcast(SessionEvent::TimerTick {
            remaining_ms: remaining,
        });
    }

    /// Mirror a remote `timer-reset`; never re-broadcast.
    pub async fn apply_remote_reset(&self, duration_secs: Option<u64>) {
        let duration_ms = {
            let mut core = self.core.lock().await;
            core.apply_remote_reset(duration_secs);
            core.duration_ms()
        };
        self.stop_tick().await;
        self.events.broadcast(SessionEvent::TimerTick {
            remaining_ms: duration_ms,
        });
    }

    /// Mirror a full `timer-sync` frame; never re-broadcast.
    pub async fn apply_remote_sync(
        self: &Arc<Self>,
        is_running: bool,
        start_time_ms: Option<u64>,
        paused_remaining_ms: Option<u64>,
        duration_secs: Option<u64>,
    ) {
        let now = self.clock.now_ms();
        let remaining = {
            let mut core = self.core.lock().await;
            core.apply_remote_sync(
                is_running,
                start_time_ms,
                paused_remaining_ms,
                duration_secs,
                now,
            );
            core.remaining_ms(now)
        };
        if is_running {
            self.respawn_tick().await;
        } else {
            self.stop_tick().await;
            self.events.broadcast(SessionEvent::TimerTick {
                remaining_ms: remaining,
            });
        }
    }

    /// Abort any previous tick task and spawn a fresh one.
    ///
    /// A prior loop must be gone before the new one starts; two live loops
    /// would double-fire the cycle end.
    async fn respawn_tick(self: &Arc<Self>) {
        let mut slot = self.tick_task.lock().await;
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        let engine = Arc::clone(self);
        *slot = Some(tokio::spawn(async move {
            engine.run_tick_loop().await;
        }));
    }

    /// Abort the tick task, if any.
    async fn stop_tick(&self) {
        if let Some(task) = self.tick_task.lock().await.take() {
            task.abort();
        }
    }

    async fn run_tick_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let now = self.clock.now_ms();
            let outcome = self.core.lock().await.tick(now);
            self.events.broadcast(SessionEvent::TimerTick {
                remaining_ms: outcome.remaining_ms,
            });
            if outcome.just_ended {
                self.notify_cycle_end();
                break;
            }
        }
    }

    fn notify_cycle_end(&self) {
        self.events.broadcast(SessionEvent::TimerEnded);
        let _ = self.end_signal.send(());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;
    use crate::transport;

    struct ManualClock(AtomicU64);

    impl ManualClock {
        fn advance(&self, ms: u64) {
            self.0.fetch_add(ms, Ordering::SeqCst);
        }
    }

    impl WallClock for ManualClock {
        fn now_ms(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn engine_fixture(
        duration_secs: u64,
    ) -> (
        Arc<TimerEngine>,
        mpsc::UnboundedReceiver<()>,
        Arc<ManualClock>,
        mpsc::UnboundedReceiver<WireMessage>,
    ) {
        let clock = Arc::new(ManualClock(AtomicU64::new(1_000_000)));
        let (handle, outbound_rx) = transport::detached_handle(true);
        let (engine, end_rx) = TimerEngine::new(
            duration_secs,
            Duration::from_millis(100),
            clock.clone(),
            handle,
            EventHub::new(64),
        );
        (engine, end_rx, clock, outbound_rx)
    }

    #[tokio::test(start_paused = true)]
    async fn start_broadcasts_and_pause_freezes_remaining() {
        let (engine, _end_rx, clock, mut outbound) = engine_fixture(60);

        engine.start().await;
        match outbound.recv().await.unwrap() {
            WireMessage::TimerStart {
                start_time,
                duration,
                ..
            } => {
                assert_eq!(start_time, Some(1_000_000.0));
                assert_eq!(duration, Some(60.0));
            }
            other => panic!("expected timer-start, got {other:?}"),
        }

        clock.advance(21_500);
        engine.pause().await;
        match outbound.recv().await.unwrap() {
            WireMessage::TimerPause {
                paused_time_remaining,
                ..
            } => assert_eq!(paused_time_remaining, Some(38_500.0)),
            other => panic!("expected timer-pause, got {other:?}"),
        }
        assert_eq!(engine.remaining_ms().await, 38_500);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_restores_full_duration_and_broadcasts() {
        let (engine, _end_rx, clock, mut outbound) = engine_fixture(60);
        engine.start().await;
        outbound.recv().await.unwrap();

        clock.advance(10_000);
        engine.reset().await;
        match outbound.recv().await.unwrap() {
            WireMessage::TimerReset { duration } => assert_eq!(duration, Some(60.0)),
            other => panic!("expected timer-reset, got {other:?}"),
        }
        assert_eq!(engine.remaining_ms().await, 60_000);
        assert_eq!(engine.phase().await, CountdownPhase::Reset);
    }

    #[tokio::test(start_paused = true)]
    async fn cycle_end_fires_signal_exactly_once() {
        let (engine, mut end_rx, clock, mut outbound) = engine_fixture(1);
        engine.start().await;
        outbound.recv().await.unwrap();

        clock.advance(1_500);
        tokio::time::timeout(Duration::from_secs(5), end_rx.recv())
            .await
            .expect("cycle end signal")
            .unwrap();

        // Give any rogue second tick loop room to misfire.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(end_rx.try_recv().is_err());
        assert_eq!(engine.phase().await, CountdownPhase::Paused);
        assert_eq!(engine.remaining_ms().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn remote_start_is_not_rebroadcast() {
        let (engine, _end_rx, _clock, mut outbound) = engine_fixture(60);
        engine.apply_remote_start(Some(1_000_000), Some(30)).await;
        assert_eq!(engine.phase().await, CountdownPhase::Running);
        assert_eq!(engine.duration_secs().await, 30);
        // Nothing went out: mirroring a remote command must not echo.
        assert!(outbound.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_remote_start_ends_on_first_tick() {
        let (engine, mut end_rx, _clock, _outbound) = engine_fixture(60);
        // startTime a full duration in the past.
        engine.apply_remote_start(Some(1_000_000 - 60_000), Some(60)).await;
        tokio::time::timeout(Duration::from_secs(5), end_rx.recv())
            .await
            .expect("cycle end signal")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn disconnected_engine_still_runs_locally() {
        let clock = Arc::new(ManualClock(AtomicU64::new(5_000)));
        let (handle, mut outbound) = transport::detached_handle(false);
        let (engine, _end_rx) = TimerEngine::new(
            60,
            Duration::from_millis(100),
            clock.clone(),
            handle,
            EventHub::new(64),
        );

        engine.start().await;
        clock.advance(2_000);
        assert_eq!(engine.remaining_ms().await, 58_000);
        // Nothing was broadcast while offline.
        assert!(outbound.try_recv().is_err());
    }
}
