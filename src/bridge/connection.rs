//! Bridge connection manager: one WebSocket to the reasoning backend.
//!
//! Lifecycle: Disconnected → Connecting → Open → Disconnected (repeat).
//! A close that wasn't requested schedules a reconnect with exponential
//! backoff until the attempt ceiling; after that only `reconnect()`
//! brings the bridge back.

use crate::bridge::reconnect::{ReconnectPolicy, ReconnectTracker};
use crate::bridge::types::{
    self, BridgeEvent, LlmContext, LlmOptions, LlmRequestPayload, MessageMetadata,
    OutboundMessage,
};
use crate::config::BridgeConfig;
use crate::error::{Error, Result};
use crate::ids::{self, CorrelationIds};
use futures::future::BoxFuture;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Disconnected,
    Connecting,
    Open,
}

/// Point-in-time view of the bridge, for status displays.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeStatus {
    pub state: BridgeState,
    pub reconnect_attempts: u32,
    pub next_retry_ms: Option<u64>,
    pub last_error: Option<String>,
}

struct Inner {
    state: BridgeState,
    tracker: ReconnectTracker,
    /// Bumped on every open and explicit close; stale readers and
    /// timers compare against it and bow out.
    generation: u64,
    /// Set by `disconnect()`; suppresses automatic reconnection.
    manual_close: bool,
    next_retry_ms: Option<u64>,
    last_error: Option<String>,
    retry_task: Option<JoinHandle<()>>,
}

pub struct BridgeManager {
    config: BridgeConfig,
    source: String,
    inner: Mutex<Inner>,
    writer: tokio::sync::Mutex<Option<WsWriter>>,
    events_tx: mpsc::UnboundedSender<BridgeEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<BridgeEvent>>>,
    ids: CorrelationIds,
}

impl BridgeManager {
    pub fn new(config: BridgeConfig, source: impl Into<String>) -> Arc<Self> {
        let policy = ReconnectPolicy {
            base: Duration::from_millis(config.reconnect_base_ms),
            max_attempts: config.max_reconnect_attempts,
        };
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            config,
            source: source.into(),
            inner: Mutex::new(Inner {
                state: BridgeState::Disconnected,
                tracker: ReconnectTracker::new(policy),
                generation: 0,
                manual_close: false,
                next_retry_ms: None,
                last_error: None,
                retry_task: None,
            }),
            writer: tokio::sync::Mutex::new(None),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            ids: CorrelationIds::new("llm"),
        })
    }

    /// Hand out the event stream. Only the first caller gets it.
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<BridgeEvent>> {
        self.events_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    pub fn state(&self) -> BridgeState {
        self.inner().state
    }

    pub fn status(&self) -> BridgeStatus {
        let inner = self.inner();
        BridgeStatus {
            state: inner.state,
            reconnect_attempts: inner.tracker.attempts(),
            next_retry_ms: inner.next_retry_ms,
            last_error: inner.last_error.clone(),
        }
    }

    /// Open the connection. A no-op while already connecting or open.
    pub async fn connect(self: &Arc<Self>) -> Result<()> {
        Arc::clone(self).connect_owned().await
    }

    /// Explicit user reconnect: clears the attempt counter, then connects.
    pub async fn reconnect(self: &Arc<Self>) -> Result<()> {
        {
            let mut inner = self.inner();
            inner.tracker.reset();
            inner.manual_close = false;
            inner.next_retry_ms = None;
            if let Some(task) = inner.retry_task.take() {
                task.abort();
                // An aborted retry may have died mid-handshake in Connecting.
                inner.generation += 1;
                inner.state = BridgeState::Disconnected;
            }
        }
        log::info!("[BRIDGE] Explicit reconnect requested");
        self.connect().await
    }

    /// Close the connection and stop automatic reconnection.
    pub async fn disconnect(&self) -> Result<()> {
        {
            let mut inner = self.inner();
            inner.manual_close = true;
            inner.generation += 1;
            inner.state = BridgeState::Disconnected;
            inner.next_retry_ms = None;
            if let Some(task) = inner.retry_task.take() {
                task.abort();
            }
        }
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.send(Message::Close(None)).await;
        }
        log::info!("[BRIDGE] Disconnected by request");
        let _ = self.events_tx.send(BridgeEvent::Closed {
            reason: "closed by client".to_string(),
        });
        Ok(())
    }

    /// Send a streamed LLM request built from the bridge config. Returns
    /// the message's correlation id.
    pub async fn send_llm_request(&self, prompt: &str, selected_text: &str) -> Result<String> {
        let message = OutboundMessage {
            kind: "llm_request",
            id: self.ids.next_id(),
            payload: LlmRequestPayload {
                prompt: prompt.to_string(),
                provider: self.config.provider.clone(),
                options: LlmOptions {
                    temperature: self.config.temperature,
                    stream: true,
                    task_type: self.config.task_type.clone(),
                },
                context: LlmContext {
                    selected_text: selected_text.to_string(),
                },
            },
            timestamp: ids::now_millis(),
            metadata: MessageMetadata {
                source: self.source.clone(),
            },
        };
        let id = message.id.clone();
        self.send(&message).await?;
        Ok(id)
    }

    /// Send any serializable message. Not queued: fails with
    /// `NotConnected` unless the bridge is open.
    pub async fn send<T: serde::Serialize>(&self, message: &T) -> Result<()> {
        if self.state() != BridgeState::Open {
            log::warn!("[BRIDGE] Send attempted while not connected");
            return Err(Error::NotConnected);
        }
        let text = serde_json::to_string(message)?;
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(Error::NotConnected)?;
        writer
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| Error::Bridge(format!("send failed: {}", e)))
    }

    // ── Internal ────────────────────────────────────────────────────

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Boxed so the retry timer can call back into it without a
    /// recursive future type.
    fn connect_owned(self: Arc<Self>) -> BoxFuture<'static, Result<()>> {
        Box::pin(async move {
            let generation = {
                let mut inner = self.inner();
                if inner.state != BridgeState::Disconnected {
                    log::debug!("[BRIDGE] Connect ignored; state is {:?}", inner.state);
                    return Ok(());
                }
                inner.state = BridgeState::Connecting;
                inner.manual_close = false;
                inner.generation
            };

            log::info!("[BRIDGE] Connecting to {}", self.config.url);
            let limit = Duration::from_millis(self.config.connect_timeout_ms);
            let outcome = tokio::time::timeout(limit, connect_async(self.config.url.as_str())).await;

            let stream = match outcome {
                Ok(Ok((stream, _response))) => stream,
                Ok(Err(e)) => {
                    let reason = format!("connect failed: {}", e);
                    self.handle_close(generation, reason.clone());
                    return Err(Error::Bridge(reason));
                }
                Err(_) => {
                    let reason = format!("connect timed out after {}ms", limit.as_millis());
                    self.handle_close(generation, reason.clone());
                    return Err(Error::Bridge(reason));
                }
            };

            let (mut writer, mut reader) = stream.split();
            // Held across the generation check so a superseded attempt
            // never overwrites the live writer.
            let mut slot = self.writer.lock().await;
            let opened = {
                let mut inner = self.inner();
                if inner.manual_close || inner.generation != generation {
                    None
                } else {
                    inner.generation += 1;
                    inner.state = BridgeState::Open;
                    inner.tracker.on_open();
                    inner.next_retry_ms = None;
                    inner.last_error = None;
                    // A pending timer finds the bridge open and does nothing.
                    inner.retry_task = None;
                    Some(inner.generation)
                }
            };
            let Some(generation) = opened else {
                // disconnect() or reconnect() raced the handshake
                drop(slot);
                let _ = writer.send(Message::Close(None)).await;
                return Ok(());
            };
            *slot = Some(writer);
            drop(slot);
            log::info!("[BRIDGE] Open");
            let _ = self.events_tx.send(BridgeEvent::Opened);

            let this = Arc::clone(&self);
            tokio::spawn(async move {
                let mut reason = "stream ended".to_string();
                while let Some(frame) = reader.next().await {
                    match frame {
                        Ok(Message::Text(text)) => match types::parse_frame(text.as_str()) {
                            Ok(Some(event)) => {
                                if this.events_tx.send(event).is_err() {
                                    log::debug!("[BRIDGE] Event consumer gone");
                                }
                            }
                            Ok(None) => {}
                            Err(e) => log::warn!("[BRIDGE] Dropping malformed frame: {}", e),
                        },
                        Ok(Message::Close(frame)) => {
                            reason = frame
                                .map(|f| format!("closed by server: {}", f.reason))
                                .unwrap_or_else(|| "closed by server".to_string());
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            reason = format!("read error: {}", e);
                            break;
                        }
                    }
                }
                this.handle_close(generation, reason);
            });

            Ok(())
        })
    }

    /// React to a close or failed attempt: schedule a retry or give up.
    fn handle_close(self: &Arc<Self>, generation: u64, reason: String) {
        let mut inner = self.inner();
        if inner.generation != generation {
            return;
        }
        inner.state = BridgeState::Disconnected;
        inner.last_error = Some(reason.clone());

        if inner.manual_close {
            return;
        }

        log::warn!("[BRIDGE] Closed: {}", reason);
        let _ = self.events_tx.send(BridgeEvent::Closed {
            reason: reason.clone(),
        });

        match inner.tracker.on_close() {
            Some(delay) => {
                let attempt = inner.tracker.attempts();
                inner.next_retry_ms = Some(delay.as_millis() as u64);
                log::info!(
                    "[BRIDGE] Reconnect attempt {} in {}ms",
                    attempt,
                    delay.as_millis()
                );
                let this = Arc::clone(self);
                inner.retry_task = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Err(e) = this.connect_owned().await {
                        log::debug!("[BRIDGE] Reconnect attempt failed: {}", e);
                    }
                }));
            }
            None => {
                let attempts = inner.tracker.attempts();
                inner.next_retry_ms = None;
                log::error!(
                    "[BRIDGE] {}; use reconnect to try again",
                    Error::ConnectionExhausted { attempts }
                );
                let _ = self.events_tx.send(BridgeEvent::Exhausted { attempts });
            }
        }
    }
}
