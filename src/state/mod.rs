pub mod relay;

use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, mpsc, watch};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::HistoryStore,
    dto::ws::WireMessage,
    error::ServiceError,
    state::relay::{RelayAction, RelayCore},
    sync::{SystemClock, WallClock},
};

pub use self::relay::{MatchResult, TimerWireState};

/// Shared handle to the relay's application state.
pub type SharedState = Arc<AppState>;

#[derive(Clone)]
/// Handle used to push frames to a connected scoreboard client.
pub struct ClientConnection {
    /// Connection identifier assigned at upgrade time.
    pub id: Uuid,
    /// Writer-task channel for this socket.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Central application state: the authoritative scoreboard core, the client
/// registry, and the (optional) history store.
pub struct AppState {
    config: AppConfig,
    clock: Arc<dyn WallClock>,
    relay: Mutex<RelayCore>,
    clients: DashMap<Uuid, ClientConnection>,
    history: RwLock<Option<Arc<dyn HistoryStore>>>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct the state wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a history store is
    /// installed; scoring and timing work either way.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Like [`AppState::new`] with an explicit clock (used by tests).
    pub fn with_clock(config: AppConfig, clock: Arc<dyn WallClock>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let relay = RelayCore::new(config.default_duration_secs, &config.competitors);
        Arc::new(Self {
            config,
            clock,
            relay: Mutex::new(relay),
            clients: DashMap::new(),
            history: RwLock::new(None),
            degraded: degraded_tx,
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Relay wall-clock reading in epoch milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Registry of active client sockets keyed by connection id.
    pub fn clients(&self) -> &DashMap<Uuid, ClientConnection> {
        &self.clients
    }

    /// Apply one inbound frame to the relay core.
    pub async fn apply_relay(&self, message: WireMessage) -> Vec<RelayAction> {
        let now = self.now_ms();
        self.relay.lock().await.apply(message, now)
    }

    /// Frames pushed to a freshly connected client.
    pub async fn greeting(&self) -> Vec<WireMessage> {
        self.relay.lock().await.greeting()
    }

    /// Obtain a handle to the current history store, if one is installed.
    pub async fn history(&self) -> Option<Arc<dyn HistoryStore>> {
        let guard = self.history.read().await;
        guard.as_ref().cloned()
    }

    /// History store or [`ServiceError::Degraded`].
    pub async fn require_history(&self) -> Result<Arc<dyn HistoryStore>, ServiceError> {
        self.history().await.ok_or(ServiceError::Degraded)
    }

    /// Install a history store implementation and leave degraded mode.
    pub async fn install_history(&self, store: Arc<dyn HistoryStore>) {
        {
            let mut guard = self.history.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current history store and enter degraded mode.
    pub async fn clear_history(&self) {
        {
            let mut guard = self.history.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.history.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
    }
}
