//! Reporting handlers for the dashboard and data export

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use super::{csv_attachment, wants_csv};
use crate::error::AppResult;
use crate::services::ReportingService;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub format: Option<String>, // "json" or "csv"
}

/// Get dashboard metrics; the CSV form carries the per-material table
pub async fn get_dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> AppResult<Response> {
    let service = ReportingService::new(state.catalog, state.ledger);
    let metrics = service.get_dashboard_metrics().await?;

    if wants_csv(query.format.as_deref()) {
        let csv = ReportingService::export_to_csv(&metrics.materials)?;
        Ok(csv_attachment("material_stock.csv", csv))
    } else {
        Ok(Json(metrics).into_response())
    }
}
