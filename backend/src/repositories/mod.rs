//! Storage seams for the catalog and the stock ledger
//!
//! Services talk to these traits only. The PostgreSQL implementation is
//! used in production; the in-memory one backs tests and demos.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    CatalogCounts, MaterialDetail, MaterialFlow, MaterialInput, Movement, MovementDetail,
    MovementFilter, NewMovement, Pagination, ReferenceItem, ReferenceKind, StoreDetail,
    StoreInput, StoreStockLine, Supplier, SupplierInput,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

/// Suppliers, materials, stores and lookup tables
///
/// Duplicate business codes surface as `AppError::DuplicateCode`, rows still
/// referenced elsewhere as `AppError::Conflict`.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn list_suppliers(&self, q: Option<&str>, page: Pagination) -> AppResult<(Vec<Supplier>, u64)>;
    async fn get_supplier(&self, id: Uuid) -> AppResult<Option<Supplier>>;
    async fn create_supplier(&self, input: &SupplierInput) -> AppResult<Supplier>;
    async fn update_supplier(&self, id: Uuid, input: &SupplierInput) -> AppResult<Option<Supplier>>;
    async fn delete_supplier(&self, id: Uuid) -> AppResult<bool>;
    async fn count_supplier_materials(&self, id: Uuid) -> AppResult<u64>;

    async fn list_materials(&self, q: Option<&str>, page: Pagination) -> AppResult<(Vec<MaterialDetail>, u64)>;
    /// Every material ordered by name, for the dashboard
    async fn all_materials(&self) -> AppResult<Vec<MaterialDetail>>;
    async fn get_material(&self, id: Uuid) -> AppResult<Option<MaterialDetail>>;
    async fn create_material(&self, input: &MaterialInput) -> AppResult<MaterialDetail>;
    async fn update_material(&self, id: Uuid, input: &MaterialInput) -> AppResult<Option<MaterialDetail>>;
    async fn delete_material(&self, id: Uuid) -> AppResult<bool>;

    async fn list_stores(&self, q: Option<&str>, page: Pagination) -> AppResult<(Vec<StoreDetail>, u64)>;
    async fn get_store(&self, id: Uuid) -> AppResult<Option<StoreDetail>>;
    async fn create_store(&self, input: &StoreInput) -> AppResult<StoreDetail>;
    async fn update_store(&self, id: Uuid, input: &StoreInput) -> AppResult<Option<StoreDetail>>;
    async fn delete_store(&self, id: Uuid) -> AppResult<bool>;

    async fn list_reference(&self, kind: ReferenceKind) -> AppResult<Vec<ReferenceItem>>;
    async fn create_reference(&self, kind: ReferenceKind, name: &str) -> AppResult<ReferenceItem>;
    async fn reference_exists(&self, kind: ReferenceKind, id: Uuid) -> AppResult<bool>;

    async fn counts(&self) -> AppResult<CatalogCounts>;
}

/// Read side of the ledger plus the entry point for writes
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Start a write transaction. Dropping it without `commit` rolls back.
    async fn begin(&self) -> AppResult<Box<dyn LedgerTransaction>>;

    /// Cached central quantity, `None` when no movement touched the material
    async fn central_stock(&self, material_id: Uuid) -> AppResult<Option<i64>>;
    /// Σ ENTREE − Σ SORTIE over the whole ledger
    async fn ledger_central_total(&self, material_id: Uuid) -> AppResult<i64>;
    /// Unclamped derived balance
    async fn store_balance(&self, store_id: Uuid, material_id: Uuid) -> AppResult<i64>;
    /// Positive balances only, ordered by store name then material name
    async fn store_stock(&self, q: Option<&str>) -> AppResult<Vec<StoreStockLine>>;

    async fn get_movement(&self, id: Uuid) -> AppResult<Option<MovementDetail>>;
    async fn list_movements(
        &self,
        filter: &MovementFilter,
        page: Pagination,
    ) -> AppResult<(Vec<MovementDetail>, u64)>;
    async fn count_movements(&self) -> AppResult<u64>;
    /// Store-bound SORTIE and ENTREE sums per material
    async fn material_flows(&self) -> AppResult<Vec<MaterialFlow>>;

    async fn health(&self) -> AppResult<()>;
}

/// One unit of work on the ledger
///
/// `ensure_central_stock` locks the material's counter until commit or
/// drop. Callers lock materials in ascending id order.
#[async_trait]
pub trait LedgerTransaction: Send {
    async fn material_exists(&mut self, material_id: Uuid) -> AppResult<bool>;
    async fn store_exists(&mut self, store_id: Uuid) -> AppResult<bool>;

    /// Current central quantity, creating a zero counter if absent
    async fn ensure_central_stock(&mut self, material_id: Uuid) -> AppResult<i64>;
    /// Add a signed delta, returning the new quantity
    async fn apply_central_delta(&mut self, material_id: Uuid, delta: i64) -> AppResult<i64>;
    async fn store_balance(&mut self, store_id: Uuid, material_id: Uuid) -> AppResult<i64>;

    async fn insert_movement(&mut self, movement: &NewMovement) -> AppResult<Movement>;
    /// Fetch and lock a movement for correction
    async fn movement_for_update(&mut self, id: Uuid) -> AppResult<Option<Movement>>;
    async fn update_movement(&mut self, movement: &Movement) -> AppResult<()>;
    async fn delete_movement(&mut self, id: Uuid) -> AppResult<()>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}

/// Deletion refused because other rows still point at the record
pub(crate) fn still_referenced(resource: &str, referenced_by: &str) -> AppError {
    AppError::Conflict {
        resource: resource.to_string(),
        message: format!("{} is still referenced by {}", resource, referenced_by),
        message_fr: format!("{} est encore utilisé par des {}", resource, referenced_by),
    }
}
