use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::dao::{
    history::{HistoryStore, MatchRecord, PlayerRecord},
    storage::StorageResult,
};

/// Process-local [`HistoryStore`] backend.
///
/// Keeps everything in shared maps so the relay can run without any external
/// database; history disappears with the process.
#[derive(Debug, Default, Clone)]
pub struct InMemoryHistoryStore {
    players: Arc<DashMap<String, PlayerRecord>>,
    matches: Arc<DashMap<Uuid, MatchRecord>>,
    /// Insertion order for both maps, guarded separately from the maps.
    order: Arc<Mutex<StoreOrder>>,
}

#[derive(Debug, Default)]
struct StoreOrder {
    players: Vec<String>,
    matches: Vec<Uuid>,
}

impl InMemoryHistoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    async fn ensure_player(&self, name: &str) -> bool {
        let mut order = self.order.lock().await;
        if self.players.contains_key(name) {
            return false;
        }
        self.players
            .insert(name.to_string(), PlayerRecord::new(name.to_string()));
        order.players.push(name.to_string());
        true
    }

    async fn apply_result(&self, record: &MatchRecord) {
        for name in record.scores.keys() {
            self.ensure_player(name).await;
            let Some(mut player) = self.players.get_mut(name) else {
                continue;
            };
            player.matches_played += 1;
            match record.winner.as_str() {
                "Tie" => player.ties += 1,
                "None" => {}
                winner if winner == name => player.wins += 1,
                _ => player.losses += 1,
            }
        }
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn player_names(&self) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.order.lock().await.players.clone()) })
    }

    fn add_player(&self, name: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.ensure_player(&name).await) })
    }

    fn player_stats(
        &self,
        name: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerRecord>>> {
        let players = self.players.clone();
        Box::pin(async move { Ok(players.get(&name).map(|entry| entry.value().clone())) })
    }

    fn match_stats(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchRecord>>> {
        let matches = self.matches.clone();
        Box::pin(async move { Ok(matches.get(&id).map(|entry| entry.value().clone())) })
    }

    fn all_matches(&self) -> BoxFuture<'static, StorageResult<Vec<MatchRecord>>> {
        let store = self.clone();
        Box::pin(async move {
            let order = store.order.lock().await;
            Ok(order
                .matches
                .iter()
                .filter_map(|id| store.matches.get(id).map(|entry| entry.value().clone()))
                .collect())
        })
    }

    fn record_match(&self, record: MatchRecord) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.apply_result(&record).await;
            let mut order = store.order.lock().await;
            order.matches.push(record.id);
            store.matches.insert(record.id, record);
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use time::OffsetDateTime;

    use super::*;

    fn record(winner: &str, entries: &[(&str, i64)]) -> MatchRecord {
        MatchRecord {
            id: Uuid::new_v4(),
            winner: winner.to_string(),
            scores: entries
                .iter()
                .map(|(name, score)| (name.to_string(), *score))
                .collect::<IndexMap<_, _>>(),
            completed_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[tokio::test]
    async fn add_player_is_idempotent() {
        let store = InMemoryHistoryStore::new();
        assert!(store.add_player("Chung".into()).await.unwrap());
        assert!(!store.add_player("Chung".into()).await.unwrap());
        assert_eq!(store.player_names().await.unwrap(), vec!["Chung"]);
    }

    #[tokio::test]
    async fn recording_a_match_updates_player_statistics() {
        let store = InMemoryHistoryStore::new();
        store
            .record_match(record("Chung", &[("Chung", 5), ("Hong", 2)]))
            .await
            .unwrap();

        let chung = store
            .player_stats("Chung".into())
            .await
            .unwrap()
            .expect("chung record");
        assert_eq!((chung.wins, chung.losses, chung.matches_played), (1, 0, 1));

        let hong = store
            .player_stats("Hong".into())
            .await
            .unwrap()
            .expect("hong record");
        assert_eq!((hong.wins, hong.losses, hong.matches_played), (0, 1, 1));
    }

    #[tokio::test]
    async fn tied_matches_count_as_ties_for_everyone() {
        let store = InMemoryHistoryStore::new();
        store
            .record_match(record("Tie", &[("Chung", 3), ("Hong", 3)]))
            .await
            .unwrap();
        let chung = store
            .player_stats("Chung".into())
            .await
            .unwrap()
            .expect("chung record");
        assert_eq!((chung.wins, chung.ties), (0, 1));
    }

    #[tokio::test]
    async fn matches_are_listed_oldest_first() {
        let store = InMemoryHistoryStore::new();
        let first = record("Chung", &[("Chung", 1)]);
        let second = record("Hong", &[("Hong", 2)]);
        let first_id = first.id;
        store.record_match(first).await.unwrap();
        store.record_match(second).await.unwrap();

        let all = store.all_matches().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, first_id);
        assert!(
            store
                .match_stats(first_id)
                .await
                .unwrap()
                .is_some()
        );
    }
}
