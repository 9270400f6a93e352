use futures::future::BoxFuture;
use indexmap::IndexMap;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::dao::storage::StorageResult;

/// Lifetime statistics for one competitor name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRecord {
    /// Competitor name as used on the scoreboard.
    pub name: String,
    /// Matches won outright.
    pub wins: u32,
    /// Matches lost outright.
    pub losses: u32,
    /// Matches that ended in a tie.
    pub ties: u32,
    /// Total matches this name appeared in.
    pub matches_played: u32,
}

impl PlayerRecord {
    /// Fresh record with zeroed statistics.
    pub fn new(name: String) -> Self {
        Self {
            name,
            wins: 0,
            losses: 0,
            ties: 0,
            matches_played: 0,
        }
    }
}

/// Persisted result of one completed match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    /// Unique match identifier.
    pub id: Uuid,
    /// Winner name, `"Tie"`, or `"None"`.
    pub winner: String,
    /// Aggregate scores per competitor.
    pub scores: IndexMap<String, i64>,
    /// When the match finished.
    pub completed_at: OffsetDateTime,
}

/// Abstraction over the match-history persistence layer.
///
/// Every operation is fallible and every caller treats failures as
/// non-fatal: scoring and timing never wait on history.
pub trait HistoryStore: Send + Sync {
    /// All competitor names ever recorded, in first-seen order.
    fn player_names(&self) -> BoxFuture<'static, StorageResult<Vec<String>>>;
    /// Register a competitor; returns false when the name already existed.
    fn add_player(&self, name: String) -> BoxFuture<'static, StorageResult<bool>>;
    /// Statistics for one competitor, if known.
    fn player_stats(&self, name: String)
    -> BoxFuture<'static, StorageResult<Option<PlayerRecord>>>;
    /// One match by id.
    fn match_stats(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchRecord>>>;
    /// Every recorded match, oldest first.
    fn all_matches(&self) -> BoxFuture<'static, StorageResult<Vec<MatchRecord>>>;
    /// Persist a finished match and roll its result into player statistics.
    fn record_match(&self, record: MatchRecord) -> BoxFuture<'static, StorageResult<()>>;
    /// Probe backend availability.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
