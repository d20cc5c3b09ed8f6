use crate::config::Config;
use crate::store::MediaStore;
use crate::streaming;
use crate::transcode::{OrchestratorOptions, TranscodeOrchestrator};
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use reelhouse_av::{Encoder, FfmpegEncoder, ToolRegistry};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod rate_limit;
pub mod routes_api;
pub mod routes_upload;

pub use error::AppError;
pub use rate_limit::{SharedLimiter, StreamLimiter};

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    /// Originals and variants on disk
    pub store: Arc<MediaStore>,
    /// Token bucket for the streaming routes
    pub limiter: SharedLimiter,
    /// Background encoder pool fed by uploads
    pub transcoder: Arc<TranscodeOrchestrator>,
}

impl AppContext {
    /// Build the context and start the transcode workers.
    ///
    /// Must be called inside a Tokio runtime. Workers stop when `cancel`
    /// fires.
    pub fn new(config: Config, encoder: Arc<dyn Encoder>, cancel: CancellationToken) -> Self {
        let limiter = Arc::new(StreamLimiter::new(
            config.rate_limit.per_second,
            config.rate_limit.burst,
        ));
        let store = Arc::new(MediaStore::new(config.storage.videos_dir.clone()));
        let transcoder = Arc::new(TranscodeOrchestrator::start(
            encoder,
            OrchestratorOptions {
                workers: config.transcode.workers,
                queue_capacity: config.transcode.queue_capacity,
            },
            cancel,
        ));

        Self {
            config: Arc::new(config),
            store,
            limiter,
            transcoder,
        }
    }
}

/// Build the production encoder from discovered tools.
pub fn ffmpeg_encoder(config: &Config, tools: &ToolRegistry) -> Arc<dyn Encoder> {
    let program = match tools.require("ffmpeg") {
        Ok(path) => path.to_path_buf(),
        Err(e) => {
            tracing::warn!("{e}; transcode jobs will fail until ffmpeg is installed");
            tools.path_or_name("ffmpeg")
        }
    };

    Arc::new(
        FfmpegEncoder::new(program)
            .with_timeout(config.transcode.timeout_secs.map(Duration::from_secs)),
    )
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    // Only matched stream routes consume tokens.
    let stream_routes = streaming::stream_router().route_layer(middleware::from_fn_with_state(
        ctx.limiter.clone(),
        rate_limit::rate_limit_middleware,
    ));

    let upload_limit = usize::try_from(ctx.config.storage.max_upload_bytes).unwrap_or(usize::MAX);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        .route("/videos", get(routes_api::list_videos))
        .nest("/stream", stream_routes)
        .route(
            "/upload",
            post(routes_upload::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .nest("/api", routes_api::api_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let tools = ToolRegistry::discover(&config.tools);
    for info in tools.check_all() {
        if info.available {
            tracing::info!(
                "Tool found: {} ({})",
                info.name,
                info.version.as_deref().unwrap_or("unknown version")
            );
        } else {
            tracing::debug!("Tool not found: {}", info.name);
        }
    }
    let encoder = ffmpeg_encoder(&config, &tools);

    let cancel = CancellationToken::new();
    let ctx = AppContext::new(config, encoder, cancel.clone());
    ctx.store
        .ensure_root()
        .await
        .with_context(|| format!("Failed to create {:?}", ctx.store.root()))?;

    let app = create_router(ctx.clone());

    tracing::info!("Starting server on {}", addr);
    tracing::info!("Serving videos from {:?}", ctx.store.root());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    // Kill in-flight encodes; their partial outputs are discarded.
    cancel.cancel();
    ctx.transcoder.shutdown().await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C, SIGTERM, or when `cancel` fires.
pub async fn shutdown_signal(cancel: CancellationToken) {
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
        _ = cancel.cancelled() => {},
    }

    tracing::info!("Shutdown signal received");
}
