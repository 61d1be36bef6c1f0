//! Chrome DevTools Protocol WebSocket client
//!
//! JSON-RPC 2.0 over a WebSocket: commands carry auto-incrementing ids and
//! are correlated back to their responses; unsolicited messages are events
//! and are fanned out on a broadcast channel so any caller can subscribe
//! with a shared reference.
//!
//! Two background tasks own the connection halves: a writer task draining an
//! mpsc channel into the sink, and a reader task resolving pending commands
//! and publishing events. When the socket closes, every pending command is
//! failed and the event channel is dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;

use crate::browser::BrowserError;

/// An unsolicited CDP event, e.g. `Page.domContentEventFired`
#[derive(Debug, Clone)]
pub struct CdpEvent {
    pub method: String,
    pub params: Value,
}

/// Outcome of one command, resolved by the reader task
type CommandReply = Result<Value, BrowserError>;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<CommandReply>>>>;

/// A connected DevTools client
pub struct CdpClient {
    next_id: AtomicU64,
    pending: PendingMap,
    outbound: mpsc::UnboundedSender<String>,
    events: broadcast::Sender<CdpEvent>,
    default_timeout: Duration,
}

impl CdpClient {
    /// Connect to a DevTools page target WebSocket, e.g.
    /// `ws://127.0.0.1:9222/devtools/page/{target_id}`.
    pub async fn connect(ws_url: &str, default_timeout: Duration) -> Result<Self, BrowserError> {
        tracing::debug!(url = ws_url, "connecting to DevTools WebSocket");

        let (stream, _) = tokio_tungstenite::connect_async(ws_url).await.map_err(|e| {
            BrowserError::ConnectionFailed {
                url: ws_url.to_string(),
                reason: e.to_string(),
            }
        })?;

        let (mut sink, mut source) = stream.split();

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (events, _) = broadcast::channel(256);

        // Writer half: serialize access to the sink through the channel.
        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    tracing::warn!(error = %e, "WebSocket write failed, stopping writer");
                    break;
                }
            }
        });

        // Reader half: correlate replies, publish events.
        let reader_pending = Arc::clone(&pending);
        let reader_events = events.clone();
        tokio::spawn(async move {
            while let Some(incoming) = source.next().await {
                let text = match incoming {
                    Ok(Message::Text(t)) => t,
                    Ok(Message::Binary(b)) => match String::from_utf8(b) {
                        Ok(s) => s,
                        Err(_) => continue,
                    },
                    Ok(Message::Close(_)) => {
                        tracing::debug!("WebSocket closed by browser");
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::warn!(error = %e, "WebSocket read failed, stopping reader");
                        break;
                    }
                };

                let json: Value = match serde_json::from_str(&text) {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!(error = %e, "discarding unparseable CDP message");
                        continue;
                    }
                };

                match classify_message(&json) {
                    Some(Inbound::Reply { id, reply }) => {
                        let tx = reader_pending.lock().await.remove(&id);
                        match tx {
                            Some(tx) => {
                                let _ = tx.send(reply);
                            }
                            None => tracing::debug!(id, "reply for unknown command id"),
                        }
                    }
                    Some(Inbound::Event(event)) => {
                        // No subscribers is fine; the event is dropped.
                        let _ = reader_events.send(event);
                    }
                    None => {}
                }
            }

            // Fail whatever is still in flight.
            let mut pending = reader_pending.lock().await;
            for (_, tx) in pending.drain() {
                let _ = tx.send(Err(BrowserError::Protocol(
                    "WebSocket connection closed".to_string(),
                )));
            }
        });

        Ok(Self {
            next_id: AtomicU64::new(1),
            pending,
            outbound,
            events,
            default_timeout,
        })
    }

    /// Send a command and wait for its result with the default timeout
    pub async fn send_command(&self, method: &str, params: Value) -> Result<Value, BrowserError> {
        self.send_command_with_timeout(method, params, self.default_timeout)
            .await
    }

    /// Send a command and wait for its result
    pub async fn send_command_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, BrowserError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let text = serde_json::json!({
            "id": id,
            "method": method,
            "params": params,
        })
        .to_string();

        tracing::trace!(id, method, "sending CDP command");

        // Register before sending so a fast reply cannot race us.
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        if self.outbound.send(text).is_err() {
            self.pending.lock().await.remove(&id);
            return Err(BrowserError::Protocol(
                "WebSocket writer is gone".to_string(),
            ));
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(BrowserError::Protocol(
                "reply channel closed unexpectedly".to_string(),
            )),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(BrowserError::CommandTimeout {
                    method: method.to_string(),
                    timeout,
                })
            }
        }
    }

    /// Subscribe to the event stream
    pub fn subscribe(&self) -> broadcast::Receiver<CdpEvent> {
        self.events.subscribe()
    }

    /// Enable a CDP domain that requires an explicit `enable` call
    pub async fn enable_domain(&self, domain: &str) -> Result<(), BrowserError> {
        self.send_command(&format!("{}.enable", domain), serde_json::json!({}))
            .await?;
        Ok(())
    }
}

/// An inbound message, classified
#[derive(Debug)]
enum Inbound {
    Reply { id: u64, reply: CommandReply },
    Event(CdpEvent),
}

/// Classify an inbound CDP message: messages with an `id` are replies to a
/// pending command, messages with a `method` and no `id` are events.
fn classify_message(json: &Value) -> Option<Inbound> {
    if let Some(id) = json.get("id").and_then(|v| v.as_u64()) {
        let reply = match json.get("error") {
            Some(err) => Err(BrowserError::Cdp {
                code: err.get("code").and_then(|c| c.as_i64()).unwrap_or(-1),
                message: err
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown CDP error")
                    .to_string(),
            }),
            None => Ok(json.get("result").cloned().unwrap_or(Value::Null)),
        };
        return Some(Inbound::Reply { id, reply });
    }

    let method = json.get("method")?.as_str()?.to_string();
    Some(Inbound::Event(CdpEvent {
        method,
        params: json.get("params").cloned().unwrap_or(Value::Null),
    }))
}
