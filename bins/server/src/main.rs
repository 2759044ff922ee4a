//! Bazaar API Server
//!
//! Main entry point for the classifieds backend.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bazaar_api::{AppState, create_router};
use bazaar_core::attachment::{AttachmentSynchronizer, IntakeFilter};
use bazaar_core::storage::{StorageConfig, StorageService};
use bazaar_db::{AttachmentRecordStore, connect_with};
use bazaar_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bazaar=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().expect("Failed to load configuration");

    let db = connect_with(&config.database).await?;
    info!("Connected to database");

    let store = StorageService::from_config(StorageConfig::from_settings(&config.storage))?;
    info!(
        provider = store.provider_name(),
        bucket = store.bucket(),
        "Object store configured"
    );

    let synchronizer = AttachmentSynchronizer::new(
        Arc::new(store),
        Arc::new(AttachmentRecordStore::new(db.clone())),
        IntakeFilter::from_settings(&config.attachments),
        config.attachments.buffer.clone(),
    );

    let state = AppState {
        db: Arc::new(db),
        synchronizer: Arc::new(synchronizer),
        default_photo_url: Arc::from(config.attachments.default_photo_url.as_str()),
        body_limit_bytes: config.server.body_limit_bytes,
    };

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
