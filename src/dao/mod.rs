//! Persistence layer: the match-history abstraction and its backends.

pub mod history;
pub mod memory;
pub mod storage;

pub use self::history::{HistoryStore, MatchRecord, PlayerRecord};
pub use self::memory::InMemoryHistoryStore;
pub use self::storage::{StorageError, StorageResult};
