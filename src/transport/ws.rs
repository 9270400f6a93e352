//! Reconnecting WebSocket client transport.

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::{
    dto::ws::WireMessage,
    transport::{TransportConfig, TransportHandle},
};

/// Spawn a WebSocket transport towards `url`.
///
/// The background task connects, forwards frames in both directions, sends a
/// keep-alive `ping` on a fixed cadence, and on any drop waits
/// `reconnect_delay` before trying again, forever. Returns the sending handle
/// and the inbound frame stream for the session dispatch loop.
pub fn spawn_ws_transport(
    url: String,
    config: TransportConfig,
) -> (TransportHandle, mpsc::UnboundedReceiver<WireMessage>) {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (connected_tx, connected_rx) = watch::channel(false);
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

    tokio::spawn(run_client(
        url,
        config,
        outbound_rx,
        inbound_tx,
        connected_tx,
    ));

    (TransportHandle::new(outbound_tx, connected_rx), inbound_rx)
}

async fn run_client(
    url: String,
    config: TransportConfig,
    mut outbound_rx: mpsc::UnboundedReceiver<WireMessage>,
    inbound_tx: mpsc::UnboundedSender<WireMessage>,
    connected_tx: watch::Sender<bool>,
) {
    loop {
        match connect_async(url.as_str()).await {
            Ok((socket, _response)) => {
                info!(%url, "connected to relay");
                connected_tx.send_replace(true);

                let (mut sink, mut stream) = socket.split();
                let mut keepalive = tokio::time::interval(config.ping_interval);
                // The first tick completes immediately; skip it so pings
                // start one full interval after connecting.
                keepalive.tick().await;

                loop {
                    tokio::select! {
                        frame = outbound_rx.recv() => {
                            let Some(frame) = frame else {
                                // Session dropped its handle; shut down.
                                let _ = sink.send(Message::Close(None)).await;
                                connected_tx.send_replace(false);
                                return;
                            };
                            match serde_json::to_string(&frame) {
                                Ok(payload) => {
                                    if sink.send(Message::Text(payload)).await.is_err() {
                                        break;
                                    }
                                }
                                Err(err) => {
                                    warn!(error = %err, "failed to serialize outbound frame");
                                }
                            }
                        }
                        _ = keepalive.tick() => {
                            let payload = match serde_json::to_string(&WireMessage::Ping) {
                                Ok(payload) => payload,
                                Err(_) => continue,
                            };
                            if sink.send(Message::Text(payload)).await.is_err() {
                                break;
                            }
                        }
                        incoming = stream.next() => match incoming {
                            Some(Ok(Message::Text(text))) => {
                                match serde_json::from_str::<WireMessage>(&text) {
                                    Ok(frame) => {
                                        if inbound_tx.send(frame).is_err() {
                                            // Nobody is listening any more.
                                            let _ = sink.send(Message::Close(None)).await;
                                            connected_tx.send_replace(false);
                                            return;
                                        }
                                    }
                                    Err(err) => {
                                        warn!(error = %err, "skipping malformed relay frame");
                                    }
                                }
                            }
                            Some(Ok(Message::Ping(payload))) => {
                                let _ = sink.send(Message::Pong(payload)).await;
                            }
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => {}
                            Some(Err(err)) => {
                                warn!(error = %err, "relay stream error");
                                break;
                            }
                        }
                    }
                }

                connected_tx.send_replace(false);
                warn!(%url, "relay connection lost; scheduling reconnect");
            }
            Err(err) => {
                debug!(%url, error = %err, "relay connection attempt failed");
            }
        }

        sleep(config.reconnect_delay).await;
    }
}
