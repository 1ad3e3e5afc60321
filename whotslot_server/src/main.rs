use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use whotslot_server::{router, store, AppState, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = ServerConfig::parse();
    let db = store::connect(&cfg.database_url, cfg.max_connections).await?;
    store::init_db(&db).await?;

    if cfg.api_key == "dev-key" {
        warn!("API_KEY is the development default, admin routes are not protected");
    }

    let state = Arc::new(AppState::new(db, cfg.api_key.clone(), &cfg.game));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind).await?;
    info!(max_bet = cfg.game.max_bet, "listening on {}", cfg.bind);
    axum::serve(listener, app).await?;
    Ok(())
}
