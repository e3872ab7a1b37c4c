mod signals;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use objmap_bridge::{ConnectionSlot, ReconnectPolicy, StatusMonitor, SubscriptionLoop};
use objmap_core::{ChannelKind, EventSink};
use objmap_server::{Broadcaster, MapboxToken, ServerConfig, ServerHandle, ViewerRegistry};
use objmap_telemetry::TelemetryConfig;
use objmap_upstream::{ChannelDecoder, Connector, NodeRegistrar, TcpConnector, TcpConnectorConfig};

const NODE_NAME: &str = "HarmoVisObjMap";
const REGISTRATION_TIMEOUT: Duration = Duration::from_secs(5);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(3);
const VIEWER_QUEUE: usize = 256;
const STATUS_FEED_CAPACITY: usize = 256;

/// Bridges upstream pub/sub channels to map viewers over WebSocket.
#[derive(Debug, Parser)]
#[command(name = "objmap", version)]
struct Args {
    /// Node server address used for registration.
    #[arg(long, env = "OBJMAP_NODESRV", default_value = "127.0.0.1:9990")]
    nodesrv: String,

    /// Port for the viewer HTTP/WebSocket server.
    #[arg(long, env = "OBJMAP_PORT", default_value_t = 10080)]
    port: u16,

    /// Directory containing the map client; assets are served from `mclient/build` under it.
    #[arg(long, env = "OBJMAP_ASSET_DIR", default_value = ".")]
    assetdir: PathBuf,

    /// Map access token sent to viewers.
    #[arg(long, env = "MAPBOX_ACCESS_TOKEN", default_value = "", hide_env_values = true)]
    mapbox: String,

    /// Seconds to wait before each reconnect attempt.
    #[arg(long, env = "OBJMAP_RECONNECT_DELAY_SECS", default_value_t = 5)]
    reconnect_delay_secs: u64,

    #[arg(long, default_value = "info")]
    log_level: tracing::Level,

    /// Log as JSON lines.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    objmap_telemetry::init_telemetry(&TelemetryConfig {
        log_level: args.log_level,
        module_levels: Vec::new(),
        json: args.log_json,
    })
    .context("initializing logging")?;

    tracing::info!(nodesrv = %args.nodesrv, port = args.port, "starting objmap bridge");
    if args.mapbox.is_empty() {
        tracing::warn!("no map access token configured");
    }

    let registrar = NodeRegistrar::new(&args.nodesrv, NODE_NAME, REGISTRATION_TIMEOUT);
    let registration = registrar
        .register(&ChannelKind::ALL)
        .await
        .with_context(|| format!("registering with node server {}", args.nodesrv))?;
    tracing::info!(
        node_id = registration.node_id,
        server_address = %registration.server_address,
        "registered with node server"
    );

    let connector = TcpConnector::new(TcpConnectorConfig {
        server_address: registration.server_address.clone(),
        ..Default::default()
    });
    let config = BridgeConfig {
        server: ServerConfig {
            port: args.port,
            asset_dir: args.assetdir.join("mclient").join("build"),
            ..Default::default()
        },
        token: MapboxToken::new(args.mapbox),
        policy: ReconnectPolicy::new(Duration::from_secs(args.reconnect_delay_secs)),
    };
    let bridge = start_bridge(config, Arc::new(connector)).await?;
    tracing::info!(
        port = bridge.server.port,
        channels = bridge.loops.len(),
        viewers = bridge.registry.count(),
        "objmap bridge ready"
    );

    if let Err(e) = signals::wait_for_shutdown_signal().await {
        tracing::error!(error = %e, "failed to listen for shutdown signals");
    }
    bridge.shutdown().await;

    if let Err(e) = registrar.unregister(&registration).await {
        tracing::warn!(error = %e, "failed to unregister from node server");
    }
    tracing::info!("objmap bridge stopped");
    Ok(())
}

struct BridgeConfig {
    server: ServerConfig,
    token: MapboxToken,
    policy: ReconnectPolicy,
}

/// Everything started by [`start_bridge`].
struct Bridge {
    /// Stops the subscription loops.
    loop_cancel: CancellationToken,
    /// Stops viewer delivery and the HTTP server.
    server_cancel: CancellationToken,
    loops: Vec<JoinHandle<()>>,
    registry: Arc<ViewerRegistry>,
    broadcaster: Arc<Broadcaster>,
    dispatcher: JoinHandle<()>,
    server: ServerHandle,
    heartbeat: JoinHandle<()>,
    monitor_task: JoinHandle<()>,
}

async fn start_bridge(config: BridgeConfig, connector: Arc<dyn Connector>) -> anyhow::Result<Bridge> {
    let loop_cancel = CancellationToken::new();
    let server_cancel = CancellationToken::new();

    let (feed, _) = broadcast::channel(STATUS_FEED_CAPACITY);
    let monitor = StatusMonitor::new(&ChannelKind::ALL);
    let monitor_task = monitor.start(feed.subscribe());

    let registry = Arc::new(ViewerRegistry::new(VIEWER_QUEUE));
    let (broadcaster, dispatcher) = Broadcaster::start(Arc::clone(&registry), config.token.clone());
    let broadcaster = Arc::new(broadcaster);

    let server = objmap_server::start(
        config.server,
        Arc::clone(&registry),
        monitor.clone(),
        config.token,
        server_cancel.clone(),
    )
    .await
    .context("starting viewer server")?;
    let heartbeat = objmap_server::start_heartbeat(
        monitor,
        Arc::clone(&registry),
        HEARTBEAT_INTERVAL,
        server_cancel.clone(),
    );

    let slot = Arc::new(ConnectionSlot::new(connector));
    let loops = ChannelKind::ALL
        .into_iter()
        .map(|channel| {
            let sink: Arc<dyn EventSink> = broadcaster.clone();
            SubscriptionLoop::new(
                Arc::new(ChannelDecoder(channel)),
                sink,
                Arc::clone(&slot),
                config.policy.clone(),
                feed.clone(),
            )
            .spawn(loop_cancel.clone())
        })
        .collect();
    // the monitor stops once the loops drop their senders

    Ok(Bridge {
        loop_cancel,
        server_cancel,
        loops,
        registry,
        broadcaster,
        dispatcher,
        server,
        heartbeat,
        monitor_task,
    })
}

impl Bridge {
    /// Stop the loops, let the dispatcher deliver everything they published,
    /// then close viewers and the HTTP server.
    async fn shutdown(self) {
        self.loop_cancel.cancel();
        for handle in self.loops {
            log_join("subscription loop", handle.await);
        }

        drop(self.broadcaster);
        log_join("broadcast dispatcher", self.dispatcher.await);

        self.server_cancel.cancel();
        if let Err(e) = self.server.join().await {
            tracing::error!(error = %e, error_kind = e.error_kind(), "viewer server stopped with error");
        }
        log_join("heartbeat", self.heartbeat.await);
        log_join("status monitor", self.monitor_task.await);
    }
}

fn log_join(task: &'static str, result: Result<(), JoinError>) {
    if let Err(e) = result {
        tracing::error!(task, error = %e, "task did not finish cleanly");
    }
}
