use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use snaptext::api::{create_router, AppState};
use snaptext::config::Config;
use snaptext::db::{Database, LibSqlStore, ScreenshotStore};
use snaptext::extraction::ExtractionService;
use snaptext::ratelimit::FixedWindowLimiter;

#[derive(Parser)]
#[command(name = "snaptext")]
#[command(about = "Self-hostable screenshot-to-text service backed by vision models")]
struct Args {
    /// Override the listen port from SNAPTEXT_PORT
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "snaptext=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::from_env();
    if let Some(port) = args.port {
        config.server.port = port;
    }

    if config.vision.api_key.is_none() {
        tracing::warn!(
            "VISION_API_KEY is not set — extraction requests will fail with 401 until it is configured"
        );
    }

    tracing::info!("Initializing database...");
    let database = Database::new(&config.database).await?;
    let store: Arc<dyn ScreenshotStore> = Arc::new(LibSqlStore::new(database));

    tracing::info!("Initializing vision client: {}...", config.vision.model);
    let extraction = ExtractionService::from_config(&config)?;

    let limiter = Arc::new(FixedWindowLimiter::from_config(&config.rate_limit));

    let cancel_token = CancellationToken::new();

    tracing::info!("Starting rate limit sweeper...");
    let sweep_limiter = limiter.clone();
    let sweep_interval = config.rate_limit.sweep_interval_secs;
    let token = cancel_token.child_token();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("Rate limit sweeper shutting down...");
                    break;
                }
                _ = tokio::time::sleep(tokio::time::Duration::from_secs(sweep_interval)) => {
                    let purged = sweep_limiter.sweep();
                    if purged > 0 {
                        tracing::debug!(purged, "Swept expired rate limit windows");
                    }
                }
            }
        }
    });

    let state = AppState::new(config.clone(), store, extraction, limiter);
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Snaptext starting on http://{}", addr);
    tracing::info!("  Health check: http://{}/api/v1/health", addr);
    tracing::info!("  Submit:       POST http://{}/api/v1/extractions", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token))
        .await?;

    Ok(())
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, cancelling background tasks...");
    cancel_token.cancel();
}
