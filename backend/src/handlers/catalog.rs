//! HTTP handlers for suppliers, materials, stores and lookup tables

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use super::{pagination, ListQuery};
use crate::error::{AppError, AppResult};
use crate::models::{
    MaterialDetail, MaterialInput, PaginatedResponse, ReferenceInput, ReferenceItem,
    ReferenceKind, StoreDetail, StoreInput, Supplier, SupplierInput,
};
use crate::services::CatalogService;
use crate::AppState;

// ============================================================================
// Suppliers
// ============================================================================

/// List suppliers
pub async fn list_suppliers(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<PaginatedResponse<Supplier>>> {
    let page = pagination(&state, query.page, query.per_page);
    let service = CatalogService::new(state.catalog);
    let suppliers = service.list_suppliers(query.q.as_deref(), page).await?;
    Ok(Json(suppliers))
}

/// Get a supplier
pub async fn get_supplier(
    State(state): State<AppState>,
    Path(supplier_id): Path<Uuid>,
) -> AppResult<Json<Supplier>> {
    let service = CatalogService::new(state.catalog);
    let supplier = service.get_supplier(supplier_id).await?;
    Ok(Json(supplier))
}

/// Create a supplier
pub async fn create_supplier(
    State(state): State<AppState>,
    Json(input): Json<SupplierInput>,
) -> AppResult<impl IntoResponse> {
    let service = CatalogService::new(state.catalog);
    let supplier = service.create_supplier(input).await?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

/// Update a supplier
pub async fn update_supplier(
    State(state): State<AppState>,
    Path(supplier_id): Path<Uuid>,
    Json(input): Json<SupplierInput>,
) -> AppResult<Json<Supplier>> {
    let service = CatalogService::new(state.catalog);
    let supplier = service.update_supplier(supplier_id, input).await?;
    Ok(Json(supplier))
}

/// Delete a supplier
pub async fn delete_supplier(
    State(state): State<AppState>,
    Path(supplier_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = CatalogService::new(state.catalog);
    service.delete_supplier(supplier_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Materials
// ============================================================================

/// List materials with supplier name and central quantity
pub async fn list_materials(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<PaginatedResponse<MaterialDetail>>> {
    let page = pagination(&state, query.page, query.per_page);
    let service = CatalogService::new(state.catalog);
    let materials = service.list_materials(query.q.as_deref(), page).await?;
    Ok(Json(materials))
}

pub async fn get_material(
    State(state): State<AppState>,
    Path(material_id): Path<Uuid>,
) -> AppResult<Json<MaterialDetail>> {
    let service = CatalogService::new(state.catalog);
    let material = service.get_material(material_id).await?;
    Ok(Json(material))
}

pub async fn create_material(
    State(state): State<AppState>,
    Json(input): Json<MaterialInput>,
) -> AppResult<impl IntoResponse> {
    let service = CatalogService::new(state.catalog);
    let material = service.create_material(input).await?;
    Ok((StatusCode::CREATED, Json(material)))
}

pub async fn update_material(
    State(state): State<AppState>,
    Path(material_id): Path<Uuid>,
    Json(input): Json<MaterialInput>,
) -> AppResult<Json<MaterialDetail>> {
    let service = CatalogService::new(state.catalog);
    let material = service.update_material(material_id, input).await?;
    Ok(Json(material))
}

pub async fn delete_material(
    State(state): State<AppState>,
    Path(material_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = CatalogService::new(state.catalog);
    service.delete_material(material_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Stores
// ============================================================================

/// List stores with their city, chain, status and project type
pub async fn list_stores(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<PaginatedResponse<StoreDetail>>> {
    let page = pagination(&state, query.page, query.per_page);
    let service = CatalogService::new(state.catalog);
    let stores = service.list_stores(query.q.as_deref(), page).await?;
    Ok(Json(stores))
}

pub async fn get_store(
    State(state): State<AppState>,
    Path(store_id): Path<Uuid>,
) -> AppResult<Json<StoreDetail>> {
    let service = CatalogService::new(state.catalog);
    let store = service.get_store(store_id).await?;
    Ok(Json(store))
}

pub async fn create_store(
    State(state): State<AppState>,
    Json(input): Json<StoreInput>,
) -> AppResult<impl IntoResponse> {
    let service = CatalogService::new(state.catalog);
    let store = service.create_store(input).await?;
    Ok((StatusCode::CREATED, Json(store)))
}

pub async fn update_store(
    State(state): State<AppState>,
    Path(store_id): Path<Uuid>,
    Json(input): Json<StoreInput>,
) -> AppResult<Json<StoreDetail>> {
    let service = CatalogService::new(state.catalog);
    let store = service.update_store(store_id, input).await?;
    Ok(Json(store))
}

pub async fn delete_store(
    State(state): State<AppState>,
    Path(store_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = CatalogService::new(state.catalog);
    service.delete_store(store_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Reference tables
// ============================================================================

fn reference_kind(slug: &str) -> AppResult<ReferenceKind> {
    ReferenceKind::from_slug(slug).ok_or_else(|| AppError::NotFound(format!("Reference list '{}'", slug)))
}

/// List the rows of a lookup table (cities, chains, statuses, project-types)
pub async fn list_reference(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> AppResult<Json<Vec<ReferenceItem>>> {
    let kind = reference_kind(&kind)?;
    let service = CatalogService::new(state.catalog);
    let items = service.list_reference(kind).await?;
    Ok(Json(items))
}

pub async fn create_reference(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(input): Json<ReferenceInput>,
) -> AppResult<impl IntoResponse> {
    let kind = reference_kind(&kind)?;
    let service = CatalogService::new(state.catalog);
    let item = service.create_reference(kind, input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}
