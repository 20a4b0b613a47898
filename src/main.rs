use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::{Any, CorsLayer}, trace::TraceLayer};

use lms_canonical::{
    config::AppConfig,
    logging,
    remote::RemoteCourseApi,
    routes::{self, AppState},
    storage::JsonFileStorage,
    store::CanonicalStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init()?;
    let config = AppConfig::from_env();

    let remote = match config.api_base_url.as_deref() {
        Some(url) => Some(Arc::new(RemoteCourseApi::new(url, config.api_timeout)?)),
        None => {
            tracing::info!("LMS_API_BASE_URL not set, running without remote course sync");
            None
        }
    };

    let mut builder = CanonicalStore::builder().sync_page_limit(config.sync_page_limit);
    if config.storage_disabled {
        tracing::info!("storage disabled, serving built-in dataset only");
    } else {
        let storage = JsonFileStorage::new(&config.data_dir, &config.storage_key);
        tracing::info!(path = %storage.path().display(), "canonical store snapshot");
        builder = builder.storage(Arc::new(storage));
    }
    if let Some(remote) = &remote {
        builder = builder.source(remote.clone());
    }
    let store = builder.build();

    let _changes = store.subscribe(|state| {
        tracing::debug!(
            courses = state.courses.len(),
            assignments = state.assignments.len(),
            quizzes = state.quiz_configs.len(),
            "canonical store changed"
        );
    });
    // hydrate now so the background sync starts with the server; loading
    // the snapshot reads from disk, so keep it off the async workers
    tokio::task::spawn_blocking({
        let store = store.clone();
        move || store.ensure_hydrated()
    })
    .await?;

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(routes::router(AppState { store, remote }))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
