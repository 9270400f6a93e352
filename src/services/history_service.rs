use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::MatchRecord,
    dto::history::{MatchSummary, PlayerSummary},
    error::ServiceError,
    state::{MatchResult, SharedState},
};

/// Persist a finished match reported over the wire.
///
/// History must never interfere with match flow: a missing store or a
/// backend failure is logged and swallowed.
pub async fn record_match_result(state: &SharedState, result: MatchResult) {
    let Some(store) = state.history().await else {
        warn!(winner = %result.winner, "history store unavailable; match result dropped");
        return;
    };

    let record = MatchRecord {
        id: Uuid::new_v4(),
        winner: result.winner,
        scores: result.scores,
        completed_at: OffsetDateTime::now_utc(),
    };
    match store.record_match(record.clone()).await {
        Ok(()) => info!(id = %record.id, winner = %record.winner, "match result recorded"),
        Err(err) => warn!(error = %err, "failed to persist match result"),
    }
}

/// All known competitor names with their statistics.
pub async fn list_players(state: &SharedState) -> Result<Vec<PlayerSummary>, ServiceError> {
    let store = state.require_history().await?;
    let names = store.player_names().await?;
    let mut players = Vec::with_capacity(names.len());
    for name in names {
        if let Some(record) = store.player_stats(name).await? {
            players.push(record.into());
        }
    }
    Ok(players)
}

/// Register a competitor name ahead of any match.
pub async fn register_player(
    state: &SharedState,
    name: String,
) -> Result<PlayerSummary, ServiceError> {
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(ServiceError::InvalidInput(
            "player name must not be empty".into(),
        ));
    }

    let store = state.require_history().await?;
    if !store.add_player(name.clone()).await? {
        return Err(ServiceError::InvalidState(format!(
            "player `{name}` is already registered"
        )));
    }
    let record = store
        .player_stats(name.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("player `{name}` not found")))?;
    Ok(record.into())
}

/// Statistics for one competitor.
pub async fn get_player(state: &SharedState, name: &str) -> Result<PlayerSummary, ServiceError> {
    let store = state.require_history().await?;
    store
        .player_stats(name.to_string())
        .await?
        .map(Into::into)
        .ok_or_else(|| ServiceError::NotFound(format!("player `{name}` not found")))
}

/// Every recorded match, oldest first.
pub async fn list_matches(state: &SharedState) -> Result<Vec<MatchSummary>, ServiceError> {
    let store = state.require_history().await?;
    let matches = store.all_matches().await?;
    Ok(matches.into_iter().map(Into::into).collect())
}

/// One recorded match by id.
pub async fn get_match(state: &SharedState, id: Uuid) -> Result<MatchSummary, ServiceError> {
    let store = state.require_history().await?;
    store
        .match_stats(id)
        .await?
        .map(Into::into)
        .ok_or_else(|| ServiceError::NotFound(format!("match `{id}` not found")))
}
