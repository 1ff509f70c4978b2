//! Stock Back Office
//!
//! Central warehouse and store stock for a retail network: catalog of
//! suppliers, materials and stores, plus an append-mostly ledger of stock
//! movements that keeps the central quantity of every material in step.

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;

pub use config::Config;

use repositories::{CatalogRepository, LedgerRepository, MemoryRepository};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogRepository>,
    pub ledger: Arc<dyn LedgerRepository>,
    pub config: Arc<Config>,
}

impl AppState {
    /// State backed by a single in-memory store
    pub fn in_memory(repo: MemoryRepository, config: Config) -> Self {
        let repo = Arc::new(repo);
        Self {
            catalog: repo.clone(),
            ledger: repo,
            config: Arc::new(config),
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .nest("/api/v1", routes::api_routes())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Stock Back Office API v1.0"
}
