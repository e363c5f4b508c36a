//! Souq Orders - storefront order service

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use souq_orders::api::{router, AppState};
use souq_orders::publisher::EventPublisher;
use souq_orders::store::{MemoryOrderStore, OrderStore, PgOrderStore};
use souq_orders::StoreConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let config = StoreConfig::load()?;
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let store: Arc<dyn OrderStore> = match config.database_url.as_deref() {
        Some(url) => Arc::new(PgOrderStore::connect(url, config.db_max_connections).await?),
        None => {
            tracing::warn!("DATABASE_URL not set; orders are kept in memory and lost on restart");
            Arc::new(MemoryOrderStore::new())
        }
    };
    let publisher = EventPublisher::connect(config.nats_url.as_deref()).await;

    let bind_addr = config.bind_addr;
    let app = router(AppState::new(config, store, publisher));

    tracing::info!("Souq Orders listening on {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
