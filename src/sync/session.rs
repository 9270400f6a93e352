use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc;
use tracing::debug;

use crate::{
    dto::ws::{self, WireMessage},
    sync::{
        clock::WallClock,
        coordinator::RoundCoordinator,
        counter_store::CounterStore,
        events::{EventHub, SessionEvent},
        match_flow::Winner,
        timer_engine::TimerEngine,
    },
    transport::TransportHandle,
};

/// Tuning knobs for one scoreboard session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Countdown tick cadence.
    pub tick_interval: Duration,
    /// Countdown length used before any match configures one.
    pub default_duration_secs: u64,
    /// Capacity of the session event hub.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            default_duration_secs: 60,
            event_capacity: 64,
        }
    }
}

/// One client's view of the shared scoreboard.
///
/// Construction builds the four core components and wires a single message
/// dispatch loop; nothing re-assigns handlers afterwards. The loop is the
/// sole consumer of inbound frames and strictly serializes them with the
/// countdown's end-of-cycle signal, mirroring the one-event-loop model the
/// protocol assumes.
pub struct ScoreboardSession {
    counters: Arc<CounterStore>,
    timer: Arc<TimerEngine>,
    coordinator: Arc<RoundCoordinator>,
    events: EventHub,
    transport: TransportHandle,
}

impl ScoreboardSession {
    /// Build a session on top of a connected (or reconnecting) transport.
    ///
    /// `inbound` must be the receiver half produced together with
    /// `transport`; the session owns it from here on.
    pub fn spawn(
        transport: TransportHandle,
        inbound: mpsc::UnboundedReceiver<WireMessage>,
        clock: Arc<dyn WallClock>,
        config: SessionConfig,
    ) -> Arc<Self> {
        let events = EventHub::new(config.event_capacity);
        let counters = Arc::new(CounterStore::new(transport.clone(), events.clone()));
        let (timer, end_rx) = TimerEngine::new(
            config.default_duration_secs,
            config.tick_interval,
            clock,
            transport.clone(),
            events.clone(),
        );
        let coordinator = Arc::new(RoundCoordinator::new(
            counters.clone(),
            timer.clone(),
            transport.clone(),
            events.clone(),
        ));

        let session = Arc::new(Self {
            counters,
            timer,
            coordinator,
            events,
            transport,
        });

        tokio::spawn(Self::run_dispatch(session.clone(), inbound, end_rx));
        session
    }

    /// Score cache of this session.
    pub fn counters(&self) -> &Arc<CounterStore> {
        &self.counters
    }

    /// Countdown engine of this session.
    pub fn timer(&self) -> &Arc<TimerEngine> {
        &self.timer
    }

    /// Match coordinator of this session.
    pub fn coordinator(&self) -> &Arc<RoundCoordinator> {
        &self.coordinator
    }

    /// Subscribe to session events (scores, ticks, round lifecycle).
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Transport handle shared by all components of this session.
    pub fn transport(&self) -> &TransportHandle {
        &self.transport
    }

    async fn run_dispatch(
        session: Arc<Self>,
        mut inbound: mpsc::UnboundedReceiver<WireMessage>,
        mut end_rx: mpsc::UnboundedReceiver<()>,
    ) {
        let mut connection = session.transport.connection_watcher();
        // The watcher starts on the current value; only report flips.
        let mut last_connected = *connection.borrow();
        loop {
            tokio::select! {
                frame = inbound.recv() => match frame {
                    Some(message) => session.dispatch(message).await,
                    None => break,
                },
                ended = end_rx.recv() => match ended {
                    Some(()) => session.coordinator.handle_timer_end().await,
                    None => break,
                },
                changed = connection.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let connected = *connection.borrow();
                    if connected == last_connected {
                        continue;
                    }
                    last_connected = connected;
                    session
                        .events
                        .broadcast(SessionEvent::ConnectionChanged { connected });
                    if connected {
                        // Fresh link: our local state may be stale, ask the
                        // relay for the authoritative countdown.
                        session.transport.send(WireMessage::TimerSyncRequest);
                    }
                }
            }
        }
        debug!("scoreboard session dispatch loop stopped");
    }

    async fn dispatch(&self, message: WireMessage) {
        match message {
            WireMessage::Counters { values } => self.counters.apply_snapshot(values).await,
            WireMessage::TimerStart {
                start_time,
                duration,
                ..
            } => {
                self.timer
                    .apply_remote_start(ws::sanitize_ms(start_time), ws::sanitize_secs(duration))
                    .await;
            }
            WireMessage::TimerPause {
                paused_time_remaining,
                paused_time,
            } => {
                let remaining =
                    ws::sanitize_ms(paused_time_remaining).or(ws::sanitize_ms(paused_time));
                self.timer.apply_remote_pause(remaining).await;
            }
            WireMessage::TimerReset { duration } => {
                self.timer
                    .apply_remote_reset(ws::sanitize_secs(duration))
                    .await;
            }
            WireMessage::TimerSync {
                is_running,
                start_time,
                paused_time_remaining,
                duration,
            } => {
                self.timer
                    .apply_remote_sync(
                        is_running,
                        ws::sanitize_ms(start_time),
                        ws::sanitize_ms(paused_time_remaining),
                        ws::sanitize_secs(duration),
                    )
                    .await;
            }
            WireMessage::RoundStart => {
                self.events
                    .broadcast(SessionEvent::RoundStarted { round: None });
            }
            WireMessage::GameOver {
                game_winner,
                scores,
            } => {
                self.events.broadcast(SessionEvent::MatchEnded {
                    winner: Winner::from_wire(&game_winner),
                    total_scores: scores,
                });
            }
            WireMessage::Pong => {}
            WireMessage::Unknown => debug!("ignoring unrecognized message type"),
            // Client-bound sessions never act on relay-bound commands.
            WireMessage::Increment { .. }
            | WireMessage::SubtractCounter { .. }
            | WireMessage::ResetCounters
            | WireMessage::Ping
            | WireMessage::TimerSyncRequest => {}
        }
    }
}
