use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use objmap_bridge::StatusMonitor;
use objmap_core::wire::ViewerFrame;
use objmap_core::Topic;

use crate::broadcaster::MapboxToken;
use crate::client::{self, ViewerId, ViewerRegistry};
use crate::error::ServerError;

const TOKEN_REQUEST: &str = "get_mapbox_token";

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    /// Directory with the built map client.
    pub asset_dir: PathBuf,
    pub write_timeout: Duration,
    pub cleanup_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 10080,
            asset_dir: PathBuf::from("mclient/build"),
            write_timeout: Duration::from_secs(10),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ViewerRegistry>,
    pub monitor: StatusMonitor,
    pub message_tx: mpsc::Sender<(ViewerId, String)>,
    pub write_timeout: Duration,
}

/// Build the Axum router: socket, health, and the static client as fallback.
pub fn build_router(state: AppState, asset_dir: PathBuf) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .fallback_service(ServeDir::new(asset_dir))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Bind and start serving. The server stops gracefully when `cancel` fires.
pub async fn start(
    config: ServerConfig,
    registry: Arc<ViewerRegistry>,
    monitor: StatusMonitor,
    token: MapboxToken,
    cancel: CancellationToken,
) -> Result<ServerHandle, ServerError> {
    let cleanup = client::start_cleanup_task(
        Arc::clone(&registry),
        config.cleanup_interval,
        cancel.clone(),
    );

    let (msg_tx, msg_rx) = mpsc::channel::<(ViewerId, String)>(1024);
    let requests = tokio::spawn(process_viewer_messages(msg_rx, Arc::clone(&registry), token));

    let app_state = AppState {
        registry,
        monitor,
        message_tx: msg_tx,
        write_timeout: config.write_timeout,
    };
    let router = build_router(app_state, config.asset_dir.clone());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    let local_addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

    tracing::info!(
        port = local_addr.port(),
        asset_dir = %config.asset_dir.display(),
        "viewer server started"
    );

    let server = tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| ServerError::Serve {
            addr: local_addr,
            reason: e.to_string(),
        })
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        server,
        requests,
        cleanup,
    })
}

/// Handle returned by `start()`. Keeps background tasks alive.
pub struct ServerHandle {
    pub port: u16,
    server: JoinHandle<Result<(), ServerError>>,
    requests: JoinHandle<()>,
    cleanup: JoinHandle<()>,
}

impl ServerHandle {
    /// Wait for graceful shutdown to finish.
    pub async fn join(self) -> Result<(), ServerError> {
        let served = match self.server.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "server task panicked");
                Ok(())
            }
        };
        let _ = self.cleanup.await;
        // open sockets keep the request channel alive; nothing left to answer
        self.requests.abort();
        served
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, remote, state))
}

async fn handle_socket(socket: WebSocket, remote: SocketAddr, state: AppState) {
    let (viewer_id, rx) = state.registry.register(Some(remote));
    tracing::info!(viewer_id = %viewer_id, %remote, viewers = state.registry.count(), "viewer connected");

    client::handle_ws_connection(
        socket,
        viewer_id.clone(),
        rx,
        Arc::clone(&state.registry),
        state.message_tx,
        state.write_timeout,
    )
    .await;

    tracing::info!(viewer_id = %viewer_id, %remote, viewers = state.registry.count(), "viewer disconnected");
}

/// 200 when every channel is subscribed, 503 otherwise.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let healthy = state.monitor.all_subscribed();
    let body = serde_json::json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "channels": state.monitor.snapshot(),
        "viewers": state.registry.count(),
    });
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, axum::Json(body))
}

/// Answer requests viewers send over their socket.
async fn process_viewer_messages(
    mut rx: mpsc::Receiver<(ViewerId, String)>,
    registry: Arc<ViewerRegistry>,
    token: MapboxToken,
) {
    while let Some((viewer_id, raw)) = rx.recv().await {
        let request: ViewerFrame = match serde_json::from_str(&raw) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(viewer_id = %viewer_id, error = %e, "unparseable viewer frame");
                continue;
            }
        };
        if request.topic != TOKEN_REQUEST {
            tracing::debug!(viewer_id = %viewer_id, topic = %request.topic, "unknown viewer request");
            continue;
        }
        match token.topic().to_frame() {
            Ok(frame) => {
                registry.send_to(&viewer_id, frame);
                tracing::debug!(viewer_id = %viewer_id, topic = %Topic::MapboxToken, "answered token request");
            }
            Err(e) => tracing::warn!(error = %e, "failed to frame token"),
        }
    }
}

/// Log a status line every `interval` until cancelled.
pub fn start_heartbeat(
    monitor: StatusMonitor,
    registry: Arc<ViewerRegistry>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let channels = monitor.snapshot();
                    let degraded: Vec<String> = channels
                        .iter()
                        .filter(|r| r.status != objmap_bridge::SubscriptionStatus::Subscribed)
                        .map(|r| format!("{}={}", r.channel, r.status.as_str()))
                        .collect();
                    tracing::info!(
                        subscribed = monitor.subscribed_count(),
                        channels = channels.len(),
                        viewers = registry.count(),
                        degraded = %degraded.join(","),
                        "heartbeat"
                    );
                }
            }
        }
    })
}
