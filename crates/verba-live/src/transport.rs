use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::outbound::OutboundQueue;
use crate::protocol::{self, LiveConfig, LiveEvent};
use verba_foundation::SessionError;

/// A connected session: classified inbound events plus the outbound queue
/// the writer task drains. Dropping the handle aborts both IO tasks.
pub struct SessionHandle {
    pub events: mpsc::UnboundedReceiver<LiveEvent>,
    outbound: Arc<OutboundQueue>,
    tasks: Vec<JoinHandle<()>>,
}

impl SessionHandle {
    pub fn new(
        events: mpsc::UnboundedReceiver<LiveEvent>,
        outbound: Arc<OutboundQueue>,
        tasks: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            events,
            outbound,
            tasks,
        }
    }

    pub fn outbound(&self) -> Arc<OutboundQueue> {
        self.outbound.clone()
    }

    /// Close the outbound side; the writer task sends a close frame and the
    /// reader winds down when the peer acknowledges.
    pub fn shutdown(&mut self) {
        self.outbound.close();
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Seam between the controller and the wire, so session scenarios are
/// testable without a network peer.
#[async_trait]
pub trait LiveTransport: Send + Sync {
    async fn connect(&self, cfg: &LiveConfig) -> Result<SessionHandle, SessionError>;
}

/// WebSocket transport to the hosted inference peer.
pub struct WsTransport {
    endpoint: String,
    api_key: String,
    outbound_capacity: usize,
}

impl WsTransport {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, outbound_capacity: usize) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            outbound_capacity,
        }
    }
}

#[async_trait]
impl LiveTransport for WsTransport {
    async fn connect(&self, cfg: &LiveConfig) -> Result<SessionHandle, SessionError> {
        let url = format!("{}?key={}", self.endpoint, self.api_key);
        let (ws, _) = connect_async(&url)
            .await
            .map_err(|e| SessionError::Connect(e.to_string()))?;
        tracing::info!(model = %cfg.model, "Live session connected");

        let (mut write, mut read) = ws.split();

        write
            .send(Message::text(protocol::setup_message(cfg)))
            .await
            .map_err(|e| SessionError::Handshake(e.to_string()))?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let outbound = Arc::new(OutboundQueue::new(self.outbound_capacity));

        // Reader: classify every frame; malformed payloads are logged and
        // skipped, never session-fatal.
        let reader = {
            let event_tx = event_tx.clone();
            tokio::spawn(async move {
                while let Some(msg) = read.next().await {
                    match msg {
                        Ok(Message::Text(text)) => {
                            forward_classified(&event_tx, text.as_ref());
                        }
                        Ok(Message::Binary(bytes)) => {
                            // The peer frames JSON as binary on some paths
                            match std::str::from_utf8(&bytes) {
                                Ok(text) => forward_classified(&event_tx, text),
                                Err(e) => {
                                    tracing::warn!("Skipping non-UTF8 binary frame: {}", e)
                                }
                            }
                        }
                        Ok(Message::Close(frame)) => {
                            let reason = frame
                                .map(|f| f.reason.to_string())
                                .unwrap_or_else(|| "closed".to_string());
                            let _ = event_tx.send(LiveEvent::Closed { reason });
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            let _ = event_tx.send(LiveEvent::TransportError {
                                message: e.to_string(),
                            });
                            break;
                        }
                    }
                }
                tracing::debug!("Session reader finished");
            })
        };

        // Writer: drain the bounded queue until it closes, then say goodbye.
        let writer = {
            let outbound = outbound.clone();
            tokio::spawn(async move {
                while let Some(envelope) = outbound.pop().await {
                    let frame = protocol::realtime_input(&envelope);
                    if let Err(e) = write.send(Message::text(frame)).await {
                        tracing::warn!("Outbound send failed: {}", e);
                        break;
                    }
                }
                let _ = write.send(Message::Close(None)).await;
                tracing::debug!("Session writer finished");
            })
        };

        Ok(SessionHandle::new(event_rx, outbound, vec![reader, writer]))
    }
}

fn forward_classified(event_tx: &mpsc::UnboundedSender<LiveEvent>, raw: &str) {
    match protocol::classify(raw) {
        Ok(LiveEvent::Empty) => tracing::trace!("Inbound message carried nothing"),
        Ok(event) => {
            let _ = event_tx.send(event);
        }
        Err(e) => tracing::warn!("Skipping malformed inbound message: {}", e),
    }
}
