use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dao::{MatchRecord, PlayerRecord};

/// Competitor statistics as exposed over the REST surface.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerSummary {
    /// Competitor name.
    pub name: String,
    /// Matches won outright.
    pub wins: u32,
    /// Matches lost outright.
    pub losses: u32,
    /// Matches that ended in a tie.
    pub ties: u32,
    /// Total matches recorded for this name.
    pub matches_played: u32,
}

impl From<PlayerRecord> for PlayerSummary {
    fn from(record: PlayerRecord) -> Self {
        Self {
            name: record.name,
            wins: record.wins,
            losses: record.losses,
            ties: record.ties,
            matches_played: record.matches_played,
        }
    }
}

/// One recorded match as exposed over the REST surface.
#[derive(Debug, Serialize, ToSchema)]
pub struct MatchSummary {
    /// Match identifier.
    pub id: Uuid,
    /// Winner name, `"Tie"`, or `"None"`.
    pub winner: String,
    /// Aggregate scores per competitor.
    pub scores: IndexMap<String, i64>,
    /// Completion timestamp, RFC 3339.
    pub completed_at: String,
}

impl From<MatchRecord> for MatchSummary {
    fn from(record: MatchRecord) -> Self {
        let completed_at = record
            .completed_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| record.completed_at.unix_timestamp().to_string());
        Self {
            id: record.id,
            winner: record.winner,
            scores: record.scores,
            completed_at,
        }
    }
}

/// Request body for registering a competitor name ahead of a match.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterPlayerRequest {
    /// Competitor name as it should appear on scoreboards.
    #[validate(length(min = 1, max = 64))]
    pub name: String,
}
