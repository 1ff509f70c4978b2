//! PostgreSQL repository
//!
//! Queries are built at runtime with `sqlx::query_as` and row structs.
//! Optional filters use the `($n IS NULL OR ...)` form so every query text
//! stays static.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::still_referenced;
use crate::error::AppError;
use crate::models::{
    Location, Material, MaterialDetail, Movement, MovementDetail, MovementType, ReferenceKind,
    Store, StoreDetail,
};

mod catalog;
mod ledger;

pub use ledger::PgLedgerTransaction;

/// Catalog and ledger backed by a connection pool
#[derive(Clone)]
pub struct PgRepository {
    db: PgPool,
}

impl PgRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// `ILIKE` pattern for a free-text search, `None` when the text is blank
pub(crate) fn like_pattern(q: Option<&str>) -> Option<String> {
    let q = q.map(str::trim).filter(|q| !q.is_empty())?;
    let escaped = q
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Some(format!("%{}%", escaped))
}

/// Translate constraint violations raised by catalog writes
pub(crate) fn map_write_error(err: sqlx::Error, duplicate_field: &str, resource: &str, referenced_by: &str) -> AppError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            return AppError::DuplicateCode(duplicate_field.to_string());
        }
        if db_err.is_foreign_key_violation() {
            return still_referenced(resource, referenced_by);
        }
    }
    AppError::DatabaseError(err)
}

pub(crate) fn reference_table(kind: ReferenceKind) -> &'static str {
    match kind {
        ReferenceKind::City => "cities",
        ReferenceKind::Chain => "chains",
        ReferenceKind::Status => "store_statuses",
        ReferenceKind::ProjectType => "project_types",
    }
}

fn to_u64(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

// ============================================================================
// Row types
// ============================================================================

pub(crate) const MATERIAL_SELECT: &str = r#"
    SELECT m.id, m.code, m.name, m.description, m.unit_price, m.supplier_id,
           s.name AS supplier_name,
           COALESCE(cs.quantity, 0)::BIGINT AS central_quantity
    FROM materials m
    LEFT JOIN suppliers s ON s.id = m.supplier_id
    LEFT JOIN central_stock cs ON cs.material_id = m.id
"#;

#[derive(Debug, FromRow)]
pub(crate) struct MaterialRow {
    id: Uuid,
    code: String,
    name: String,
    description: Option<String>,
    unit_price: Decimal,
    supplier_id: Option<Uuid>,
    supplier_name: Option<String>,
    central_quantity: i64,
}

impl From<MaterialRow> for MaterialDetail {
    fn from(row: MaterialRow) -> Self {
        MaterialDetail {
            material: Material {
                id: row.id,
                code: row.code,
                name: row.name,
                description: row.description,
                unit_price: row.unit_price,
                supplier_id: row.supplier_id,
            },
            supplier_name: row.supplier_name,
            central_quantity: row.central_quantity,
        }
    }
}

pub(crate) const STORE_SELECT: &str = r#"
    SELECT st.id, st.code, st.name, st.city_id, st.chain_id, st.status_id, st.project_type_id,
           c.name AS city, ch.name AS chain, ss.name AS status, pt.name AS project_type
    FROM stores st
    JOIN cities c ON c.id = st.city_id
    JOIN chains ch ON ch.id = st.chain_id
    JOIN store_statuses ss ON ss.id = st.status_id
    JOIN project_types pt ON pt.id = st.project_type_id
"#;

#[derive(Debug, FromRow)]
pub(crate) struct StoreRow {
    id: Uuid,
    code: String,
    name: String,
    city_id: Uuid,
    chain_id: Uuid,
    status_id: Uuid,
    project_type_id: Uuid,
    city: String,
    chain: String,
    status: String,
    project_type: String,
}

impl From<StoreRow> for StoreDetail {
    fn from(row: StoreRow) -> Self {
        StoreDetail {
            store: Store {
                id: row.id,
                code: row.code,
                name: row.name,
                city_id: row.city_id,
                chain_id: row.chain_id,
                status_id: row.status_id,
                project_type_id: row.project_type_id,
            },
            city: row.city,
            chain: row.chain,
            status: row.status,
            project_type: row.project_type,
        }
    }
}

pub(crate) const MOVEMENT_COLUMNS: &str =
    "id, moved_at, movement_type, quantity, material_id, store_id";

#[derive(Debug, FromRow)]
pub(crate) struct MovementRow {
    id: Uuid,
    moved_at: DateTime<Utc>,
    movement_type: String,
    quantity: i32,
    material_id: Uuid,
    store_id: Option<Uuid>,
}

impl TryFrom<MovementRow> for Movement {
    type Error = AppError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let movement_type: MovementType = row.movement_type.parse().map_err(AppError::Internal)?;
        Ok(Movement {
            id: row.id,
            moved_at: row.moved_at,
            movement_type,
            quantity: row.quantity,
            material_id: row.material_id,
            location: Location::from_store(row.store_id),
        })
    }
}

pub(crate) const MOVEMENT_DETAIL_SELECT: &str = r#"
    SELECT sm.id, sm.moved_at, sm.movement_type, sm.quantity, sm.material_id, sm.store_id,
           m.code AS material_code, m.name AS material_name, st.name AS store_name
    FROM stock_movements sm
    JOIN materials m ON m.id = sm.material_id
    LEFT JOIN stores st ON st.id = sm.store_id
"#;

#[derive(Debug, FromRow)]
pub(crate) struct MovementDetailRow {
    #[sqlx(flatten)]
    movement: MovementRow,
    material_code: String,
    material_name: String,
    store_name: Option<String>,
}

impl TryFrom<MovementDetailRow> for MovementDetail {
    type Error = AppError;

    fn try_from(row: MovementDetailRow) -> Result<Self, Self::Error> {
        Ok(MovementDetail {
            movement: row.movement.try_into()?,
            material_code: row.material_code,
            material_name: row.material_name,
            store_name: row.store_name,
        })
    }
}
