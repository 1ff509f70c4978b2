//! HTTP handlers for stock movements

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use super::pagination;
use crate::error::AppResult;
use crate::models::{
    BulkMovementInput, BulkMovementReceipt, CorrectionReceipt, CreateMovementInput,
    EditMovementInput, MovementDetail, MovementFilter, MovementType, PaginatedResponse,
};
use crate::services::MovementService;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct MovementQuery {
    pub q: Option<String>,
    pub movement_type: Option<MovementType>,
    pub material_id: Option<Uuid>,
    pub store_id: Option<Uuid>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// List movements, newest first
pub async fn list_movements(
    State(state): State<AppState>,
    Query(query): Query<MovementQuery>,
) -> AppResult<Json<PaginatedResponse<MovementDetail>>> {
    let page = pagination(&state, query.page, query.per_page);
    let filter = MovementFilter {
        q: query.q,
        movement_type: query.movement_type,
        material_id: query.material_id,
        store_id: query.store_id,
        date_from: query.date_from,
        date_to: query.date_to,
    };

    let service = MovementService::new(state.ledger);
    let movements = service.list(&filter, page).await?;
    Ok(Json(movements))
}

/// Record a movement (replenish, dispatch or return)
pub async fn create_movement(
    State(state): State<AppState>,
    Json(input): Json<CreateMovementInput>,
) -> AppResult<impl IntoResponse> {
    let service = MovementService::new(state.ledger);
    let receipt = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Record one action for several materials at once
pub async fn create_bulk_movements(
    State(state): State<AppState>,
    Json(input): Json<BulkMovementInput>,
) -> AppResult<(StatusCode, Json<BulkMovementReceipt>)> {
    let service = MovementService::new(state.ledger);
    let receipt = service.create_bulk(input).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn get_movement(
    State(state): State<AppState>,
    Path(movement_id): Path<Uuid>,
) -> AppResult<Json<MovementDetail>> {
    let service = MovementService::new(state.ledger);
    let movement = service.get(movement_id).await?;
    Ok(Json(movement))
}

/// Correct a movement
pub async fn update_movement(
    State(state): State<AppState>,
    Path(movement_id): Path<Uuid>,
    Json(input): Json<EditMovementInput>,
) -> AppResult<Json<CorrectionReceipt>> {
    let service = MovementService::new(state.ledger);
    let receipt = service.edit(movement_id, input).await?;
    Ok(Json(receipt))
}

/// Delete a movement, reversing its central stock effect
pub async fn delete_movement(
    State(state): State<AppState>,
    Path(movement_id): Path<Uuid>,
) -> AppResult<Json<CorrectionReceipt>> {
    let service = MovementService::new(state.ledger);
    let receipt = service.delete(movement_id).await?;
    Ok(Json(receipt))
}
