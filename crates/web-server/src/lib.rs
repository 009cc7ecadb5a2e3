use axum::{routing::get, Router};
use database::DbRepository;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

pub mod error;
pub mod handlers;

/// The shared application state that all handlers can access.
#[derive(Clone)]
pub struct AppState {
    pub db_repo: DbRepository,
}

/// Builds the read-only dashboard API over `state`.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods(Any)
        .allow_headers(AllowHeaders::any());

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/performance", get(handlers::get_performance))
        .route("/api/summary", get(handlers::get_summary))
        .route("/api/composition", get(handlers::get_composition))
        .route("/api/composition/dates", get(handlers::get_composition_dates))
        .route("/api/composition-changes", get(handlers::get_composition_changes))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Opens the index database and serves the API on `addr` until the process stops.
pub async fn run_server(database_path: &Path, addr: SocketAddr) -> anyhow::Result<()> {
    let pool = database::connect(database_path).await?;
    database::init_schema(&pool).await?;
    let app = router(Arc::new(AppState { db_repo: DbRepository::new(pool) }));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, database = %database_path.display(), "Web server listening.");
    axum::serve(listener, app).await?;

    Ok(())
}
