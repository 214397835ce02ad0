use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};

use review_roster::config::Config;
use review_roster::engine::Engine;
use review_roster::http::router;
use review_roster::store::SqliteStore;
use review_roster::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("Starting review roster service");

    let config =
        Config::from_env().expect("Failed to load configuration from environment variables");

    let db_path = config.database_path();
    info!("Using state database: {}", db_path.display());
    let store = Arc::new(SqliteStore::new(&db_path).expect("Failed to initialize SQLite database"));

    let engine = Engine::new(store.clone(), store);
    let state = AppState { engine };

    let app = router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.request_timeout_secs,
            ))),
    );

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!("Server listening on port {}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
