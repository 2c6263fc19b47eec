use std::net::SocketAddr;

use anyhow::Context;
use sports_reels::{create_routes, AppConfig, AppState};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sports_reels=info,tower_http=info"));
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(env_filter)
            .init();
    }

    let config = AppConfig::from_env();
    info!(
        environment = %config.environment,
        backend = ?config.backend,
        serve_dir = %config.serve_dir.display(),
        background = config.background_generation,
        "starting sports-reels"
    );
    if config.is_production() && config.github_token.is_none() {
        tracing::warn!("GITHUB_TOKEN not set; remote writes and the video proxy will fail");
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", config.host, config.port))?;
    let state = AppState::new(config).context("failed to build HTTP client")?;
    let app = create_routes(state);

    info!("Listening on {}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
