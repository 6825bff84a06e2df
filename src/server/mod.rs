use crate::artifacts::ArtifactStore;
use crate::config::Config;
use crate::conversion::{sweep_orphans, CleanupScheduler, ConversionEngine, ConversionOrchestrator};
use crate::quota::QuotaStore;
use crate::upload::UploadReceiver;
use anyhow::{Context, Result};
use audioforge_av::{FfmpegTranscoder, Transcoder};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

pub mod error;
pub mod routes;

pub use error::AppError;

/// Room for multipart boundaries and part headers on top of the file itself
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub orchestrator: ConversionOrchestrator,
    pub quota: Arc<QuotaStore>,
    pub artifacts: Arc<ArtifactStore>,
    pub cleanup: CleanupScheduler,
}

impl AppContext {
    /// Wire the pipeline together, creating storage directories as needed.
    pub fn build(config: Config, transcoder: Arc<dyn Transcoder>) -> Result<Self> {
        let storage = &config.storage;
        for dir in [&storage.staging_dir, &storage.artifact_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {:?}", dir))?;
        }

        let conversion = &config.conversion;
        let quota = QuotaStore::open(&config.quota.state_file);
        let artifacts = Arc::new(ArtifactStore::new(
            &storage.artifact_dir,
            conversion.target_format,
        ));
        let cleanup = CleanupScheduler::new(Arc::clone(&artifacts));

        let uploads = UploadReceiver::new(&storage.staging_dir, &conversion.accepted_mime)
            .with_max_bytes(conversion.max_upload_bytes);

        let mut engine = ConversionEngine::new(transcoder);
        if conversion.timeout_secs > 0 {
            engine = engine.with_timeout(conversion.timeout());
        }

        let orchestrator = ConversionOrchestrator::new(
            Arc::clone(&quota),
            uploads,
            engine,
            Arc::clone(&artifacts),
            cleanup.clone(),
        )
        .with_daily_limit(config.quota.daily_limit)
        .with_retention(conversion.retention())
        .with_download_grace(conversion.download_grace())
        .with_base_url(config.server.base_url());

        Ok(Self {
            config: Arc::new(config),
            orchestrator,
            quota,
            artifacts,
            cleanup,
        })
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    let body_limit = ctx
        .config
        .conversion
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    let mut app = Router::new()
        .route("/health", get(routes::health))
        .merge(routes::conversion_routes())
        // Uploads are streamed to disk, so the in-memory default does not apply
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    // Serve the front-end for anything that is not an API route
    if let Some(dir) = static_dir {
        if dir.exists() {
            tracing::info!("Serving static files from {:?}", dir);
            let index_path = dir.join("index.html");
            app = app.fallback_service(
                ServeDir::new(&dir)
                    .append_index_html_on_directories(true)
                    .not_found_service(ServeFile::new(index_path)),
            );
        }
    }

    app
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let transcoder = FfmpegTranscoder::discover(config.tools.ffmpeg_path.as_deref())
        .context("ffmpeg is required to run the server")?
        .with_bitrate(config.conversion.bitrate.clone())
        .with_timeout(config.conversion.timeout());
    tracing::info!("Using ffmpeg at {:?}", transcoder.program());

    // Timers from a previous run are gone; nothing else would delete these
    let storage = &config.storage;
    if let Err(e) = sweep_orphans(&[&storage.staging_dir, &storage.artifact_dir]).await {
        tracing::warn!("Failed to sweep leftover files: {}", e);
    }

    let static_dir = config.server.static_dir.clone();
    let ctx = AppContext::build(config, Arc::new(transcoder))?;
    let app = create_router(ctx, static_dir);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
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
