//! Fixtures shared by the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use stock_backoffice::models::{
    CreateMovementInput, MaterialInput, MovementAction, ReferenceInput, ReferenceKind,
    StoreInput, SupplierInput,
};
use stock_backoffice::repositories::MemoryRepository;
use stock_backoffice::services::{CatalogService, MovementService, StockService};
use stock_backoffice::{AppState, Config};

/// Services over one in-memory store
pub struct Fixture {
    pub repo: Arc<MemoryRepository>,
    pub catalog: CatalogService,
    pub movements: MovementService,
    pub stock: StockService,
}

impl Fixture {
    pub fn new() -> Self {
        let repo = Arc::new(MemoryRepository::new());
        Self {
            catalog: CatalogService::new(repo.clone()),
            movements: MovementService::new(repo.clone()),
            stock: StockService::new(repo.clone(), repo.clone()),
            repo,
        }
    }

    pub async fn supplier(&self, code: &str, name: &str) -> Uuid {
        self.catalog
            .create_supplier(SupplierInput {
                code: code.to_string(),
                name: name.to_string(),
            })
            .await
            .unwrap()
            .id
    }

    pub async fn material(&self, code: &str, name: &str, price_cents: i64, supplier_id: Option<Uuid>) -> Uuid {
        self.catalog
            .create_material(MaterialInput {
                code: code.to_string(),
                name: name.to_string(),
                description: None,
                unit_price: Decimal::new(price_cents, 2),
                supplier_id,
            })
            .await
            .unwrap()
            .material
            .id
    }

    pub async fn reference(&self, kind: ReferenceKind, name: &str) -> Uuid {
        self.catalog
            .create_reference(
                kind,
                ReferenceInput {
                    name: name.to_string(),
                },
            )
            .await
            .unwrap()
            .id
    }

    pub async fn store_input(&self, code: &str, name: &str) -> StoreInput {
        StoreInput {
            code: code.to_string(),
            name: name.to_string(),
            city_id: self.reference(ReferenceKind::City, &format!("City {}", code)).await,
            chain_id: self.reference(ReferenceKind::Chain, "Centrale Nord").await,
            status_id: self.reference(ReferenceKind::Status, "Ouvert").await,
            project_type_id: self.reference(ReferenceKind::ProjectType, "Ouverture").await,
        }
    }

    pub async fn store(&self, code: &str, name: &str) -> Uuid {
        let input = self.store_input(code, name).await;
        self.catalog.create_store(input).await.unwrap().store.id
    }

    pub async fn record(
        &self,
        action: MovementAction,
        material_id: Uuid,
        store_id: Option<Uuid>,
        quantity: i32,
    ) -> stock_backoffice::error::AppResult<stock_backoffice::models::MovementReceipt> {
        self.movements
            .create(CreateMovementInput {
                action,
                material_id,
                store_id,
                quantity,
                moved_at: None,
            })
            .await
    }

    pub async fn central(&self, material_id: Uuid) -> i64 {
        self.stock.central_stock(material_id).await.unwrap().quantity
    }

    pub async fn store_balance(&self, store_id: Uuid, material_id: Uuid) -> i64 {
        self.stock
            .store_balance(store_id, material_id)
            .await
            .unwrap()
            .quantity
    }

    /// Application state sharing this fixture's store
    pub fn app_state(&self) -> AppState {
        AppState {
            catalog: self.repo.clone(),
            ledger: self.repo.clone(),
            config: Arc::new(Config::in_memory()),
        }
    }
}
