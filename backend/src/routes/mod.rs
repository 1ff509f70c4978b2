//! Route definitions for the Stock Back Office API

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Catalog
        .nest("/suppliers", supplier_routes())
        .nest("/materials", material_routes())
        .nest("/stores", store_routes())
        .route(
            "/reference/:kind",
            get(handlers::list_reference).post(handlers::create_reference),
        )
        // Ledger
        .nest("/movements", movement_routes())
        .nest("/stock", stock_routes())
        // Reporting
        .route("/dashboard", get(handlers::get_dashboard))
}

fn supplier_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_suppliers).post(handlers::create_supplier),
        )
        .route(
            "/:supplier_id",
            get(handlers::get_supplier)
                .put(handlers::update_supplier)
                .delete(handlers::delete_supplier),
        )
}

fn material_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_materials).post(handlers::create_material),
        )
        .route(
            "/:material_id",
            get(handlers::get_material)
                .put(handlers::update_material)
                .delete(handlers::delete_material),
        )
}

fn store_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_stores).post(handlers::create_store))
        .route(
            "/:store_id",
            get(handlers::get_store)
                .put(handlers::update_store)
                .delete(handlers::delete_store),
        )
}

/// Movement routes; every write goes through the ledger service
fn movement_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_movements).post(handlers::create_movement),
        )
        .route("/bulk", post(handlers::create_bulk_movements))
        .route(
            "/:movement_id",
            get(handlers::get_movement)
                .put(handlers::update_movement)
                .delete(handlers::delete_movement),
        )
}

fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/central/:material_id", get(handlers::get_central_stock))
        .route(
            "/central/:material_id/reconcile",
            get(handlers::reconcile_central_stock),
        )
        .route("/stores", get(handlers::get_store_stock))
        .route(
            "/stores/:store_id/materials/:material_id",
            get(handlers::get_store_balance),
        )
}
