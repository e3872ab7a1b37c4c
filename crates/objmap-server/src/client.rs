use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use dashmap::DashMap;
use futures::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const VIEWER_TIMEOUT: Duration = Duration::from_secs(90);

/// Unique viewer identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ViewerId(pub String);

impl Default for ViewerId {
    fn default() -> Self {
        Self(format!("viewer_{}", Uuid::now_v7()))
    }
}

impl ViewerId {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Display for ViewerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A connected map viewer.
pub struct Viewer {
    pub id: ViewerId,
    pub remote: Option<SocketAddr>,
    tx: mpsc::Sender<String>,
    connected: AtomicBool,
    last_pong: AtomicU64,
}

impl Viewer {
    fn new(id: ViewerId, remote: Option<SocketAddr>, tx: mpsc::Sender<String>) -> Self {
        Self {
            id,
            remote,
            tx,
            connected: AtomicBool::new(true),
            last_pong: AtomicU64::new(now_secs()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn record_pong(&self) {
        self.last_pong.store(now_secs(), Ordering::Relaxed);
    }

    pub fn is_alive(&self) -> bool {
        let last = self.last_pong.load(Ordering::Relaxed);
        now_secs().saturating_sub(last) < VIEWER_TIMEOUT.as_secs()
    }

    /// Queue a frame without waiting. A full queue drops the frame.
    fn enqueue(&self, frame: String) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(frame)) => {
                tracing::warn!(
                    viewer_id = %self.id,
                    frame_len = frame.len(),
                    "send queue full, dropping frame"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Registry of all connected viewers.
pub struct ViewerRegistry {
    viewers: DashMap<ViewerId, Arc<Viewer>>,
    max_send_queue: usize,
}

impl ViewerRegistry {
    pub fn new(max_send_queue: usize) -> Self {
        Self {
            viewers: DashMap::new(),
            max_send_queue,
        }
    }

    /// Register a new viewer and return its ID plus the receiving end of its queue.
    pub fn register(&self, remote: Option<SocketAddr>) -> (ViewerId, mpsc::Receiver<String>) {
        let id = ViewerId::new();
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        self.viewers
            .insert(id.clone(), Arc::new(Viewer::new(id.clone(), remote, tx)));
        (id, rx)
    }

    pub fn unregister(&self, id: &ViewerId) -> bool {
        match self.viewers.remove(id) {
            Some((_, viewer)) => {
                viewer.connected.store(false, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    fn get(&self, id: &ViewerId) -> Option<Arc<Viewer>> {
        self.viewers.get(id).map(|v| Arc::clone(v.value()))
    }

    pub fn send_to(&self, id: &ViewerId, frame: String) -> bool {
        match self.get(id) {
            Some(viewer) => viewer.enqueue(frame),
            None => false,
        }
    }

    /// Queue `frame` for every connected viewer. Returns how many accepted it.
    pub fn broadcast_all(&self, frame: &str) -> usize {
        // snapshot first so no shard lock is held while queueing
        let viewers: Vec<Arc<Viewer>> = self
            .viewers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        viewers
            .iter()
            .filter(|v| v.is_connected())
            .filter(|v| v.enqueue(frame.to_string()))
            .count()
    }

    pub fn count(&self) -> usize {
        self.viewers.len()
    }

    /// Drop every viewer. Their writers see a closed queue and close the socket.
    pub fn close_all(&self) -> usize {
        let ids: Vec<ViewerId> = self.viewers.iter().map(|e| e.key().clone()).collect();
        ids.iter().filter(|id| self.unregister(id)).count()
    }

    /// Remove viewers that haven't answered pings within the timeout.
    pub fn cleanup_dead_viewers(&self) -> usize {
        let dead: Vec<ViewerId> = self
            .viewers
            .iter()
            .filter(|entry| !entry.value().is_alive())
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for id in dead {
            if self.unregister(&id) {
                removed += 1;
                tracing::info!(viewer_id = %id, "cleaned up dead viewer");
            }
        }
        removed
    }
}

/// Drive one viewer socket: a writer draining its queue with periodic pings,
/// and a reader forwarding text frames and recording pongs.
pub async fn handle_ws_connection(
    socket: WebSocket,
    viewer_id: ViewerId,
    rx: mpsc::Receiver<String>,
    registry: Arc<ViewerRegistry>,
    on_message: mpsc::Sender<(ViewerId, String)>,
    write_timeout: Duration,
) {
    let (ws_tx, mut ws_rx) = socket.split();

    let mut writer = tokio::spawn(write_loop(ws_tx, rx, viewer_id.clone(), write_timeout));

    let reader_id = viewer_id.clone();
    let reader_registry = Arc::clone(&registry);
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Text(text) => {
                    let _ = on_message.send((reader_id.clone(), text.to_string())).await;
                }
                WsMessage::Pong(_) => {
                    if let Some(viewer) = reader_registry.get(&reader_id) {
                        viewer.record_pong();
                    }
                }
                WsMessage::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut writer => {},
        _ = &mut reader => {},
    }
    writer.abort();
    reader.abort();

    registry.unregister(&viewer_id);
}

/// Drain a viewer's queue into `sink`, pinging periodically. Each write and
/// the final close are bounded by `write_timeout`.
async fn write_loop<S>(
    mut sink: S,
    mut rx: mpsc::Receiver<String>,
    viewer_id: ViewerId,
    write_timeout: Duration,
) where
    S: Sink<WsMessage> + Unpin,
    S::Error: std::fmt::Display,
{
    let mut ping_interval = tokio::time::interval(HEARTBEAT_INTERVAL);
    ping_interval.tick().await;

    loop {
        let outgoing = tokio::select! {
            msg = rx.recv() => match msg {
                Some(text) => WsMessage::Text(text.into()),
                None => break,
            },
            _ = ping_interval.tick() => WsMessage::Ping(Vec::new().into()),
        };
        match tokio::time::timeout(write_timeout, sink.send(outgoing)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(viewer_id = %viewer_id, error = %e, "write failed");
                break;
            }
            Err(_) => {
                tracing::warn!(
                    viewer_id = %viewer_id,
                    timeout_ms = write_timeout.as_millis() as u64,
                    "write timed out, disconnecting viewer"
                );
                break;
            }
        }
    }

    // a peer that stopped reading can stall the close frame as well
    if tokio::time::timeout(write_timeout, sink.close()).await.is_err() {
        tracing::debug!(viewer_id = %viewer_id, "close timed out");
    }
}

/// Periodically reap viewers that stopped answering pings. On cancel every
/// remaining viewer is closed.
pub fn start_cleanup_task(
    registry: Arc<ViewerRegistry>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let closed = registry.close_all();
                    tracing::info!(closed, "closed viewers for shutdown");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = registry.cleanup_dead_viewers();
                    if removed > 0 {
                        tracing::info!(removed, "dead viewer cleanup");
                    }
                }
            }
        }
    })
}
