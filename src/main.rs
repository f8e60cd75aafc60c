mod atlas;
mod config;
mod constants;
mod error;
mod logging;
mod models;
mod routes;
mod store;
mod sync;
mod youtube;

use axum::{Router, routing::get};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info};

use atlas::CatalogIndexer;
use atlas::fetch::HttpImageFetcher;
use config::{Config, StorageBackend};
use store::CatalogStore;
use store::postgres::PgCatalogStore;
use sync::SyncOrchestrator;
use youtube::YoutubeClient;

pub struct AppState {
    pub store: Arc<dyn CatalogStore>,
}

async fn health() -> &'static str {
    "ok"
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let config = Config::from_env().inspect_err(|e| error!(error = %e, "invalid configuration"))?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let pg_store = PgCatalogStore::new(pool);
    pg_store.ensure_schema().await?;
    let store: Arc<dyn CatalogStore> = Arc::new(pg_store);

    let fetcher = Arc::new(HttpImageFetcher::new(config.fetch_timeout)?);
    let publisher = atlas::publish::from_backend(&config.storage);
    let indexer = CatalogIndexer::new(
        store.clone(),
        fetcher,
        publisher,
        config.fetch_concurrency,
    );
    let orchestrator = Arc::new(SyncOrchestrator::new(
        store.clone(),
        Arc::new(YoutubeClient::new(&config.youtube_api_key)),
        indexer,
        config.sync_timeout,
    ));

    tokio::spawn(orchestrator.run_scheduler(config.sync_interval));
    info!(
        interval_secs = config.sync_interval.as_secs(),
        timeout_secs = config.sync_timeout.as_secs(),
        "sync scheduler started"
    );

    let state = Arc::new(AppState { store });

    let mut app = Router::new()
        .route("/health", get(health))
        .merge(routes::build_routes());

    if let StorageBackend::Local { root, .. } = &config.storage {
        info!(root = %root.display(), "serving local media at /media");
        app = app.nest_service("/media", ServeDir::new(root));
    }

    let app = app.layer(CorsLayer::permissive()).with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
