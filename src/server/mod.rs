use crate::bsky::BskyClient;
use crate::config::Config;
use crate::fetch::Fetcher;
use crate::pipeline::Pipeline;
use crate::workspace::{self, WorkspaceRoot};
use anyhow::{Context, Result};
use axum::{
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod routes_video;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub bsky: BskyClient,
    pub pipeline: Pipeline,
    pub workspaces: WorkspaceRoot,
}

impl AppContext {
    /// Wire up the collaborators for a config.
    pub fn new(config: Config, bsky: BskyClient) -> Self {
        let workspaces = WorkspaceRoot::from_config(&config.storage);
        let fetcher = Fetcher::new(&config.fetch);
        let pipeline = Pipeline::new(
            bsky.clone(),
            fetcher,
            workspaces.clone(),
            config.encoder.clone(),
        );

        Self {
            config: Arc::new(config),
            bsky,
            pipeline,
            workspaces,
        }
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", routes_video::api_routes())
        .nest("/videos", routes_video::video_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let reap_interval = Duration::from_secs(config.storage.reap_interval_secs);
    let ctx = AppContext::new(config, BskyClient::new());

    // The reaper starts once here and runs for the life of the process.
    workspace::start_reaper(ctx.workspaces.clone(), reap_interval);

    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
