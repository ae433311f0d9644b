use std::sync::Arc;

use certmaker::config::{Config, UPLOADS_PREFIX};
use certmaker::db::{self, MemoryStore, PgStore, RecordStore};
use certmaker::editor::session::sweep_idle;
use certmaker::state::AppState;
use certmaker::storage::{self, LocalStorage};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "certmaker=info,tower_http=info".into()),
        )
        .init();

    let config = Arc::new(Config::from_env()?);

    storage::ensure_dirs(&config.upload_folder)?;

    let store: Arc<dyn RecordStore> = match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url).await?;
            db::run_migrations(pool.as_ref()).await?;
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, records are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };
    if config.admin_token.is_none() {
        tracing::warn!("ADMIN_TOKEN not set, the admin area is locked");
    }

    let storage = Arc::new(LocalStorage::new(
        config.upload_folder.clone(),
        UPLOADS_PREFIX,
    ));
    let state = Arc::new(AppState::new(store, storage, config.clone()));
    tokio::spawn(sweep_idle(state.editors.clone()));
    let app = certmaker::routes::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Certmaker listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
