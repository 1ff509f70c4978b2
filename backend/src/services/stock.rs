//! Stock balance queries: central counters, derived store balances and
//! reconciliation

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{CentralReconciliation, CentralStock, StoreBalance, StoreStockLine};
use crate::repositories::{CatalogRepository, LedgerRepository};

#[derive(Clone)]
pub struct StockService {
    catalog: Arc<dyn CatalogRepository>,
    ledger: Arc<dyn LedgerRepository>,
}

impl StockService {
    pub fn new(catalog: Arc<dyn CatalogRepository>, ledger: Arc<dyn LedgerRepository>) -> Self {
        Self { catalog, ledger }
    }

    /// Central quantity of a material, 0 before its first movement
    pub async fn central_stock(&self, material_id: Uuid) -> AppResult<CentralStock> {
        self.require_material(material_id).await?;
        let quantity = self.ledger.central_stock(material_id).await?.unwrap_or(0);
        Ok(CentralStock {
            material_id,
            quantity,
        })
    }

    /// Derived balance of one (store, material) pair. Not clamped: zero or
    /// negative values are returned as is.
    pub async fn store_balance(&self, store_id: Uuid, material_id: Uuid) -> AppResult<StoreBalance> {
        if self.catalog.get_store(store_id).await?.is_none() {
            return Err(AppError::NotFound("Store".to_string()));
        }
        self.require_material(material_id).await?;

        let quantity = self.ledger.store_balance(store_id, material_id).await?;
        Ok(StoreBalance {
            store_id,
            material_id,
            quantity,
        })
    }

    /// Pairs with a positive balance, optionally filtered by store name,
    /// material name or material code
    pub async fn store_stock(&self, q: Option<&str>) -> AppResult<Vec<StoreStockLine>> {
        self.ledger.store_stock(q).await
    }

    /// Compare the cached central counter with the ledger recomputation
    pub async fn reconcile(&self, material_id: Uuid) -> AppResult<CentralReconciliation> {
        self.require_material(material_id).await?;

        let cached = self.ledger.central_stock(material_id).await?.unwrap_or(0);
        let recomputed = self.ledger.ledger_central_total(material_id).await?;
        let report = CentralReconciliation::new(material_id, cached, recomputed);

        if !report.consistent {
            tracing::warn!(
                "Central stock drift for material {}: cached {}, ledger {}",
                material_id,
                cached,
                recomputed
            );
        }
        Ok(report)
    }

    async fn require_material(&self, material_id: Uuid) -> AppResult<()> {
        match self.catalog.get_material(material_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound("Material".to_string())),
        }
    }
}
