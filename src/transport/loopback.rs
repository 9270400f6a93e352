//! In-process relay transport.
//!
//! Backed by the same [`RelayCore`] as the network server, so sessions wired
//! through it observe the exact production message contract: authoritative
//! snapshots, normalized timer frames, sync replies. Used by integration
//! tests and single-process demos.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, watch};
use tracing::debug;

use crate::{
    dto::ws::WireMessage,
    state::relay::{RelayAction, RelayCore},
    sync::WallClock,
};

/// Shared in-process relay hub.
pub struct LoopbackRelay {
    core: Mutex<RelayCore>,
    clients: Mutex<Vec<mpsc::UnboundedSender<WireMessage>>>,
    clock: Arc<dyn WallClock>,
}

impl LoopbackRelay {
    /// Create a hub with the given countdown default and seeded competitors.
    pub fn new(
        default_duration_secs: u64,
        competitors: &[String],
        clock: Arc<dyn WallClock>,
    ) -> Arc<Self> {
        Arc::new(Self {
            core: Mutex::new(RelayCore::new(default_duration_secs, competitors)),
            clients: Mutex::new(Vec::new()),
            clock,
        })
    }

    /// Attach a new client and return its transport pair.
    ///
    /// The client immediately receives the greeting frames (current scores
    /// and cached countdown state), mirroring the network relay's
    /// on-connect behavior.
    pub async fn register(
        self: &Arc<Self>,
    ) -> (
        super::TransportHandle,
        mpsc::UnboundedReceiver<WireMessage>,
    ) {
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<WireMessage>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<WireMessage>();
        let (connected_tx, connected_rx) = watch::channel(true);

        {
            let mut clients = self.clients.lock().await;
            clients.push(inbound_tx.clone());
        }
        for frame in self.core.lock().await.greeting() {
            let _ = inbound_tx.send(frame);
        }

        let relay = Arc::clone(self);
        tokio::spawn(async move {
            // Keep the connected flag alive for the life of the client task.
            let _connected_tx = connected_tx;
            while let Some(frame) = outbound_rx.recv().await {
                relay.handle_frame(frame, &inbound_tx).await;
            }
            debug!("loopback client disconnected");
        });

        (
            super::TransportHandle::new(outbound_tx, connected_rx),
            inbound_rx,
        )
    }

    async fn handle_frame(
        &self,
        frame: WireMessage,
        sender: &mpsc::UnboundedSender<WireMessage>,
    ) {
        let actions = {
            let now = self.clock.now_ms();
            self.core.lock().await.apply(frame, now)
        };
        for action in actions {
            match action {
                RelayAction::Broadcast(frame) => {
                    let mut clients = self.clients.lock().await;
                    clients.retain(|client| client.send(frame.clone()).is_ok());
                }
                RelayAction::Reply(frame) => {
                    let _ = sender.send(frame);
                }
                // The loopback hub keeps no history.
                RelayAction::Persist(result) => {
                    debug!(winner = %result.winner, "loopback relay dropping match result");
                }
            }
        }
    }
}
