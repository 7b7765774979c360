use anyhow::{Context, Result};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Router;
use clap::Parser;
use highway_core::lifecycle::LifecycleNode;
use highway_core::{PlannerConfig, PlannerSession, RoadMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Config file picked up from the working directory when none is given
const DEFAULT_CONFIG: &str = "config/planner.toml";

#[derive(Parser, Debug)]
#[command(
    name = "highway_planner_node",
    about = "Serve lane and trajectory plans to the highway driving simulator"
)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Waypoint table, overrides map.path
    #[arg(short, long)]
    map: Option<PathBuf>,

    /// Port to listen on, overrides server.port
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Clone)]
struct AppState {
    map: Arc<RoadMap>,
    config: Arc<PlannerConfig>,
}

fn load_config(args: &Args) -> Result<PlannerConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            PlannerConfig::load(path)?
        }
        None if Path::new(DEFAULT_CONFIG).exists() => {
            info!("Loading configuration from {}", DEFAULT_CONFIG);
            PlannerConfig::load(Path::new(DEFAULT_CONFIG))?
        }
        None => {
            info!("Using default configuration");
            PlannerConfig::default()
        }
    };

    if let Some(map) = &args.map {
        config.map.path = map.to_string_lossy().into_owned();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;
    Ok(config)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// One simulator connection, planned by its own session
async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let mut session = match PlannerSession::from_config(Arc::clone(&state.map), &state.config).start()
    {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to start planner session: {}", e);
            return;
        }
    };
    info!("Simulator connected");

    while let Some(msg) = socket.recv().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Some(reply) = session.handle_message(&text) {
                    if socket.send(Message::Text(reply)).await.is_err() {
                        break;
                    }
                }
            }
            Ok(Message::Ping(data)) => {
                if socket.send(Message::Pong(data)).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket error: {}", e);
                break;
            }
        }
    }

    if let Err(e) = session.on_deactivate().and_then(|_| session.on_cleanup()) {
        warn!("Failed to shut down planner session: {}", e);
    }
    info!("Simulator disconnected");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("highway_core=info".parse()?)
                .add_directive("highway_planner_node=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    // Planning without a map is impossible, so this is fatal
    let map = RoadMap::load(Path::new(&config.map.path), config.map.max_s)
        .with_context(|| format!("loading road map from {}", config.map.path))?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState {
        map: Arc::new(map),
        config: Arc::new(config),
    };

    // The simulator upgrades on a socket.io path; accept any
    let app = Router::new().fallback(ws_handler).with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
