//! HTTP handlers for stock balances

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{csv_attachment, wants_csv};
use crate::error::AppResult;
use crate::models::{CentralReconciliation, CentralStock, StoreBalance};
use crate::services::{ReportingService, StockService};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StoreStockQuery {
    pub q: Option<String>,
    pub format: Option<String>, // "json" or "csv"
}

/// Central quantity of a material
pub async fn get_central_stock(
    State(state): State<AppState>,
    Path(material_id): Path<Uuid>,
) -> AppResult<Json<CentralStock>> {
    let service = StockService::new(state.catalog, state.ledger);
    let stock = service.central_stock(material_id).await?;
    Ok(Json(stock))
}

/// Cached central quantity next to the ledger recomputation
pub async fn reconcile_central_stock(
    State(state): State<AppState>,
    Path(material_id): Path<Uuid>,
) -> AppResult<Json<CentralReconciliation>> {
    let service = StockService::new(state.catalog, state.ledger);
    let report = service.reconcile(material_id).await?;
    Ok(Json(report))
}

/// Positive store balances, as JSON or CSV
pub async fn get_store_stock(
    State(state): State<AppState>,
    Query(query): Query<StoreStockQuery>,
) -> AppResult<Response> {
    let service = StockService::new(state.catalog, state.ledger);
    let lines = service.store_stock(query.q.as_deref()).await?;

    if wants_csv(query.format.as_deref()) {
        let csv = ReportingService::export_to_csv(&lines)?;
        Ok(csv_attachment("store_stock.csv", csv))
    } else {
        Ok(Json(lines).into_response())
    }
}

/// Derived balance of one material at one store
pub async fn get_store_balance(
    State(state): State<AppState>,
    Path((store_id, material_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<StoreBalance>> {
    let service = StockService::new(state.catalog, state.ledger);
    let balance = service.store_balance(store_id, material_id).await?;
    Ok(Json(balance))
}
