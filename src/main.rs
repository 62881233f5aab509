//! OpenSASE Orders - checkout and order lifecycle service

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use opensase_orders::http::{router, AppState};
use opensase_orders::publisher::NatsEventPublisher;
use opensase_orders::store::PgStore;
use opensase_orders::{AppConfig, OrderEngine};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let config = AppConfig::from_env()?;
    let db = PgPoolOptions::new().max_connections(config.db_max_connections).connect(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let store = Arc::new(PgStore::new(db));
    let mut engine = OrderEngine::new(store.clone(), store.clone(), store.clone(), store).with_settings(config.engine_settings());
    if let Some(url) = &config.nats_url {
        match async_nats::connect(url.as_str()).await {
            Ok(client) => engine = engine.with_events(Arc::new(NatsEventPublisher::new(client))),
            Err(e) => tracing::warn!(error = %e, "NATS unavailable, order events disabled"),
        }
    }

    let app = router(AppState::new(engine));
    tracing::info!("🚀 OpenSASE Orders listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?, app).await?;
    Ok(())
}
