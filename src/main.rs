//! Variant Engine - size/color hierarchy restructuring service

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use variant_engine::{api::{self, AppState}, store::postgres::create_pool, Config, PgVariantStore, VariantEngine};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let config = Config::from_env()?;
    let db = create_pool(&config.database_url, config.max_connections).await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => { tracing::warn!(error = %e, "NATS unavailable, domain events disabled"); None }
        },
        None => None,
    };

    let store = Arc::new(PgVariantStore::new(db, config.lock_timeout));
    let state = AppState { engine: VariantEngine::new(store, config.engine()), nats };
    let app = api::router(state);

    let addr = config.socket_addr();
    tracing::info!("🚀 Variant engine listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
