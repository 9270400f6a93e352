//! Abstract broadcast transport between scoreboard clients and the relay.
//!
//! Components hold a cheap [`TransportHandle`] and treat the channel as a
//! fire-and-forget medium. The socket behind a handle may come and go (the
//! WebSocket client reconnects forever); the handle itself stays valid for
//! the life of the session.

pub mod loopback;
pub mod ws;

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::dto::ws::WireMessage;

/// Tuning for the reconnecting WebSocket client.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Keep-alive `ping` cadence while connected.
    pub ping_interval: Duration,
    /// Delay before another connection attempt after a drop.
    pub reconnect_delay: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_millis(30_000),
            reconnect_delay: Duration::from_millis(3_000),
        }
    }
}

/// Cloneable sending half of a transport.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    outbound: mpsc::UnboundedSender<WireMessage>,
    connected: watch::Receiver<bool>,
}

impl TransportHandle {
    fn new(outbound: mpsc::UnboundedSender<WireMessage>, connected: watch::Receiver<bool>) -> Self {
        Self { outbound, connected }
    }

    /// Queue a frame for delivery.
    ///
    /// Frames sent while disconnected are dropped (logged, not an error);
    /// reconciliation happens through the post-reconnect sync.
    pub fn send(&self, message: WireMessage) {
        if !self.is_connected() {
            debug!(?message, "dropping frame while disconnected");
            return;
        }
        if self.outbound.send(message).is_err() {
            debug!("transport task gone; frame dropped");
        }
    }

    /// Whether the underlying channel is currently connected.
    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Watch connectivity flips (used by the session loop to resync).
    pub fn connection_watcher(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }
}

/// Handle wired to a bare channel pair with a frozen connection flag.
///
/// No task serves the other end; unit tests (and standalone tooling that
/// never broadcasts) inspect the receiver directly.
pub fn detached_handle(
    connected: bool,
) -> (TransportHandle, mpsc::UnboundedReceiver<WireMessage>) {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (_connected_tx, connected_rx) = watch::channel(connected);
    (TransportHandle::new(outbound_tx, connected_rx), outbound_rx)
}
