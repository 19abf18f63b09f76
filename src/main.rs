use std::net::SocketAddr;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use webpi::{config::Config, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("✅ Configuration loaded successfully");

    let state = AppState::new(&config)?;

    // The container must exist and be publicly readable before we serve anything.
    match state.blobs.ensure_container().await {
        Ok(true) => tracing::info!("✅ Container '{}' created", state.blobs.container()),
        Ok(false) => tracing::info!("✅ Container '{}' already exists", state.blobs.container()),
        Err(e) => {
            tracing::error!("❌ Failed to ensure container exists: {}", e);
            return Err(e.into());
        }
    }

    if let Err(e) = state.blobs.set_public_read_acl().await {
        tracing::error!("❌ Failed to set container permissions: {}", e);
        return Err(e.into());
    }

    let app = webpi::build_router(state);

    let addr = SocketAddr::new(config.bind_addr, config.port);
    let mode = if config.production { "production" } else { "development" };
    tracing::info!("🚀 Server listening on http://{} in {} mode", addr, mode);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
