use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    dto::ws::WireMessage,
    error::ServiceError,
    sync::{
        counter_store::CounterStore,
        events::{EventHub, SessionEvent},
        match_flow::{MatchFlow, MatchPhase, RoundClose, Winner},
        timer_engine::TimerEngine,
    },
    transport::TransportHandle,
};

/// Drives a best-of-N match around the shared countdown and score cache.
///
/// Holds non-owning references to the [`CounterStore`] and [`TimerEngine`] it
/// steers; the [`MatchFlow`] state is owned exclusively here. All invalid
/// requests degrade to logged no-ops so a stray button press can never tear
/// down a running match.
pub struct RoundCoordinator {
    flow: Mutex<MatchFlow>,
    counters: Arc<CounterStore>,
    timer: Arc<TimerEngine>,
    transport: TransportHandle,
    events: EventHub,
}

impl RoundCoordinator {
    /// Wire a coordinator to its collaborators.
    pub fn new(
        counters: Arc<CounterStore>,
        timer: Arc<TimerEngine>,
        transport: TransportHandle,
        events: EventHub,
    ) -> Self {
        Self {
            flow: Mutex::new(MatchFlow::new()),
            counters,
            timer,
            transport,
            events,
        }
    }

    /// Current match phase.
    pub async fn phase(&self) -> MatchPhase {
        self.flow.lock().await.phase()
    }

    /// 1-based current round number (0 before any match started).
    pub async fn current_round(&self) -> u32 {
        self.flow.lock().await.current_round()
    }

    /// Begin a fresh match: zero the scores, arm the timer, start round one.
    ///
    /// Rejected with a warning while a match is in progress; the existing
    /// match state is left untouched.
    pub async fn start_game(
        &self,
        max_rounds: u32,
        duration_secs: u64,
    ) -> Result<(), ServiceError> {
        let mut flow = self.flow.lock().await;
        if let Err(err) = flow.begin(max_rounds) {
            warn!(error = %err, "start game rejected");
            return Err(ServiceError::InvalidState(err.to_string()));
        }

        info!(max_rounds, duration_secs, "match started");
        self.timer.set_duration(duration_secs).await;
        self.counters.reset_all().await;
        self.timer.reset().await;
        self.timer.start().await;
        self.events.broadcast(SessionEvent::MatchStarted {
            max_rounds,
            duration_secs,
        });
        self.events
            .broadcast(SessionEvent::RoundStarted { round: Some(1) });
        Ok(())
    }

    /// Score the active round when the countdown reaches zero.
    ///
    /// Honored only while a round is active; the underlying flow rejects the
    /// call in any other phase, which also guards against a duplicated
    /// end-of-cycle signal arriving for the same round.
    pub async fn handle_timer_end(&self) {
        let snapshot = self.counters.snapshot().await;
        let close = {
            let mut flow = self.flow.lock().await;
            match flow.record_round(snapshot) {
                Ok(close) => close,
                Err(err) => {
                    debug!(error = %err, "countdown ended outside an active round; ignored");
                    return;
                }
            }
        };
        info!(
            round = close.round_number,
            winner = %close.winner,
            decided = close.match_decided,
            "round complete"
        );
        self.broadcast_round_close(close);
    }

    /// Acknowledge the summary and launch the next round.
    pub async fn start_next_round(&self) -> Result<(), ServiceError> {
        let round = {
            let mut flow = self.flow.lock().await;
            match flow.advance_round() {
                Ok(round) => round,
                Err(err) => {
                    warn!(error = %err, "next round rejected");
                    return Err(ServiceError::InvalidState(err.to_string()));
                }
            }
        };
        info!(round, "round started");
        self.counters.reset_all().await;
        self.timer.reset().await;
        self.timer.start().await;
        self.transport.send(WireMessage::RoundStart);
        self.events
            .broadcast(SessionEvent::RoundStarted { round: Some(round) });
        Ok(())
    }

    /// Terminate the match and announce the result.
    ///
    /// The winner is computed from the round-win tally when not supplied.
    /// The `game-over` frame carries the aggregate scores for the relay's
    /// history store; a relay without one simply drops it.
    pub async fn end_game(&self, winner: Option<Winner>) -> Result<Winner, ServiceError> {
        let (winner, totals) = {
            let mut flow = self.flow.lock().await;
            let winner = match flow.complete(winner) {
                Ok(winner) => winner,
                Err(err) => {
                    warn!(error = %err, "end game rejected");
                    return Err(ServiceError::InvalidState(err.to_string()));
                }
            };
            (winner, flow.total_scores())
        };
        self.timer.pause().await;
        info!(winner = %winner, "match complete");
        self.transport.send(WireMessage::GameOver {
            game_winner: winner.to_string(),
            scores: totals.clone(),
        });
        self.events.broadcast(SessionEvent::MatchEnded {
            winner: winner.clone(),
            total_scores: totals,
        });
        Ok(winner)
    }

    fn broadcast_round_close(&self, close: RoundClose) {
        self.events.broadcast(SessionEvent::RoundEnded {
            round: close.round_number,
            winner: close.winner,
            standings: close.standings,
            match_decided: close.match_decided,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicU64, Ordering},
        time::Duration,
    };

    use indexmap::IndexMap;

    use super::*;
    use crate::{sync::clock::WallClock, transport};

    struct ManualClock(AtomicU64);

    impl WallClock for ManualClock {
        fn now_ms(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn fixture() -> (
        RoundCoordinator,
        Arc<CounterStore>,
        tokio::sync::mpsc::UnboundedReceiver<WireMessage>,
    ) {
        let (handle, outbound_rx) = transport::detached_handle(true);
        let events = EventHub::new(64);
        let clock = Arc::new(ManualClock(AtomicU64::new(0)));
        let counters = Arc::new(CounterStore::new(handle.clone(), events.clone()));
        let (timer, _end_rx) = TimerEngine::new(
            60,
            Duration::from_millis(100),
            clock,
            handle.clone(),
            events.clone(),
        );
        let coordinator =
            RoundCoordinator::new(counters.clone(), timer, handle, events);
        (coordinator, counters, outbound_rx)
    }

    async fn seed_scores(counters: &CounterStore, entries: &[(&str, i64)]) {
        let values: IndexMap<String, i64> = entries
            .iter()
            .map(|(name, score)| (name.to_string(), *score))
            .collect();
        counters.apply_snapshot(values).await;
    }

    #[tokio::test(start_paused = true)]
    async fn start_game_twice_is_rejected_and_keeps_state() {
        let (coordinator, counters, _outbound) = fixture();
        coordinator.start_game(3, 60).await.unwrap();
        seed_scores(&counters, &[("Chung", 2)]).await;

        let err = coordinator.start_game(5, 90).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert_eq!(coordinator.current_round().await, 1);
        assert_eq!(coordinator.phase().await, MatchPhase::RoundActive);
        assert_eq!(counters.value("Chung").await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_end_outside_active_round_is_ignored() {
        let (coordinator, _counters, _outbound) = fixture();
        coordinator.handle_timer_end().await;
        assert_eq!(coordinator.phase().await, MatchPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_timer_end_scores_the_round_once() {
        let (coordinator, counters, _outbound) = fixture();
        coordinator.start_game(3, 60).await.unwrap();
        seed_scores(&counters, &[("Chung", 3), ("Hong", 1)]).await;

        coordinator.handle_timer_end().await;
        assert_eq!(coordinator.phase().await, MatchPhase::RoundSummary);
        // A second zero-crossing signal for the same round changes nothing.
        coordinator.handle_timer_end().await;
        assert_eq!(coordinator.phase().await, MatchPhase::RoundSummary);
        assert_eq!(coordinator.current_round().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn next_round_broadcasts_round_start() {
        let (coordinator, counters, mut outbound) = fixture();
        coordinator.start_game(3, 60).await.unwrap();
        seed_scores(&counters, &[("Chung", 1), ("Hong", 0)]).await;
        coordinator.handle_timer_end().await;

        coordinator.start_next_round().await.unwrap();
        assert_eq!(coordinator.current_round().await, 2);

        let mut saw_round_start = false;
        while let Ok(frame) = outbound.try_recv() {
            if frame == WireMessage::RoundStart {
                saw_round_start = true;
            }
        }
        assert!(saw_round_start);
    }

    #[tokio::test(start_paused = true)]
    async fn end_game_announces_tally_winner_and_totals() {
        let (coordinator, counters, mut outbound) = fixture();
        coordinator.start_game(3, 60).await.unwrap();
        seed_scores(&counters, &[("Chung", 2), ("Hong", 0)]).await;
        coordinator.handle_timer_end().await;
        coordinator.start_next_round().await.unwrap();
        seed_scores(&counters, &[("Chung", 3), ("Hong", 1)]).await;
        coordinator.handle_timer_end().await;

        let winner = coordinator.end_game(None).await.unwrap();
        assert_eq!(winner, Winner::Competitor("Chung".into()));

        let mut game_over = None;
        while let Ok(frame) = outbound.try_recv() {
            if let WireMessage::GameOver {
                game_winner,
                scores,
            } = frame
            {
                game_over = Some((game_winner, scores));
            }
        }
        let (game_winner, scores) = game_over.expect("game-over frame");
        assert_eq!(game_winner, "Chung");
        assert_eq!(scores.get("Chung"), Some(&5));
        assert_eq!(scores.get("Hong"), Some(&1));
    }
}
