//! Live view of the queue over WebSocket.
//!
//! Clients receive JSON messages after every mutation and re-derive ticket
//! status on their side from the counters they carry.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use chrono::{NaiveDate, Utc};
use futures::{Sink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use queueline_core::{QueueService, QueueSnapshot};

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_LAG_EVENTS, WS_MESSAGES_SENT};
use crate::state::AppState;

/// Message pushed to every connected client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// Fresh counters after an issue, advance or reset.
    QueueUpdated {
        service_date: NaiveDate,
        started: bool,
        current_number: u32,
        next_number: u32,
    },
    TicketIssued {
        ticket_id: String,
        number: u32,
    },
    /// Counters were overwritten; existing tickets should be re-derived.
    QueueReset { service_date: NaiveDate },
    Heartbeat { timestamp: i64 },
}

impl WsMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::QueueUpdated { .. } => "queue_updated",
            Self::TicketIssued { .. } => "ticket_issued",
            Self::QueueReset { .. } => "queue_reset",
            Self::Heartbeat { .. } => "heartbeat",
        }
    }
}

impl From<&QueueSnapshot> for WsMessage {
    fn from(snapshot: &QueueSnapshot) -> Self {
        Self::QueueUpdated {
            service_date: snapshot.today,
            started: snapshot.started,
            current_number: snapshot.current_number,
            next_number: snapshot.next_number,
        }
    }
}

/// Fan-out of [`WsMessage`]s over a tokio broadcast channel.
///
/// Also carries the shutdown signal for connected sockets: upgraded
/// connections outlive the HTTP server's graceful shutdown, so each socket
/// task watches it and closes itself.
#[derive(Debug, Clone)]
pub struct WsBroadcaster {
    sender: broadcast::Sender<WsMessage>,
    shutdown: Arc<watch::Sender<bool>>,
    publish: Arc<Mutex<()>>,
}

impl WsBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        let (shutdown, _) = watch::channel(false);
        Self {
            sender,
            shutdown: Arc::new(shutdown),
            publish: Arc::new(Mutex::new(())),
        }
    }

    /// Ask every connected socket to close.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Send to every subscriber. Having none is not an error.
    pub fn broadcast(&self, msg: WsMessage) {
        let _ = self.sender.send(msg);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WsMessage> {
        self.sender.subscribe()
    }

    pub fn queue_updated(&self, snapshot: &QueueSnapshot) {
        self.broadcast(snapshot.into());
    }

    /// Read the committed counters and broadcast them.
    ///
    /// Publishers take turns, so a snapshot read later is never sent before
    /// one read earlier and the last `queue_updated` is the newest state.
    pub async fn publish_counters(&self, queue: &QueueService) {
        let _turn = self.publish.lock().await;
        match queue.snapshot().await {
            Ok(snapshot) => self.queue_updated(&snapshot),
            Err(e) => warn!("Could not publish queue counters: {}", e),
        }
    }

    pub fn ticket_issued(&self, ticket_id: &str, number: u32) {
        self.broadcast(WsMessage::TicketIssued {
            ticket_id: ticket_id.to_string(),
            number,
        });
    }

    pub fn queue_reset(&self, service_date: NaiveDate) {
        self.broadcast(WsMessage::QueueReset { service_date });
    }

    /// Broadcast a heartbeat every `every` until the task is aborted.
    pub fn spawn_heartbeat(&self, every: Duration) -> JoinHandle<()> {
        let broadcaster = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                broadcaster.broadcast(WsMessage::Heartbeat {
                    timestamp: Utc::now().timestamp(),
                });
            }
        })
    }
}

impl Default for WsBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let mut rx = state.ws_broadcaster().subscribe();
    let mut shutdown = state.ws_broadcaster().shutdown_signal();

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();
    info!("WebSocket client connected");

    // Start every client from the current counters.
    match state.queue().snapshot().await {
        Ok(snapshot) => {
            if send_message(&mut socket, &WsMessage::from(&snapshot)).await.is_err() {
                WS_CONNECTIONS_ACTIVE.dec();
                return;
            }
        }
        Err(e) => warn!("Could not load initial queue snapshot: {}", e),
    }
    // Open sockets must not keep the application state alive.
    drop(state);

    loop {
        tokio::select! {
            _ = async { shutdown.wait_for(|stopping| *stopping).await.map(|_| ()) } => {
                debug!("Closing WebSocket for server shutdown");
                let _ = socket
                    .send(Message::Close(Some(CloseFrame {
                        code: close_code::AWAY,
                        reason: Utf8Bytes::from_static("server shutting down"),
                    })))
                    .await;
                break;
            }
            broadcast = rx.recv() => match broadcast {
                Ok(msg) => {
                    if send_message(&mut socket, &msg).await.is_err() {
                        debug!("WebSocket send failed, client disconnected");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("WebSocket client lagged, skipped {} messages", n);
                    WS_LAG_EVENTS.inc();
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Broadcast channel closed");
                    break;
                }
            },
            // Clients only listen; anything they send is ignored.
            incoming = socket.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => {
                    debug!("WebSocket client requested close");
                    break;
                }
                Some(Ok(Message::Text(text))) => {
                    debug!("Ignoring client message: {}", text.as_str())
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket receive error: {}", e);
                    break;
                }
            },
        }
    }

    WS_CONNECTIONS_ACTIVE.dec();
    info!("WebSocket client disconnected");
}

async fn send_message<S>(sender: &mut S, msg: &WsMessage) -> Result<(), ()>
where
    S: Sink<Message> + Unpin,
{
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize WsMessage: {}", e);
            return Ok(());
        }
    };
    WS_MESSAGES_SENT.with_label_values(&[msg.kind()]).inc();
    sender.send(Message::Text(json.into())).await.map_err(|_| ())
}
