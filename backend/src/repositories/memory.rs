//! In-memory repository
//!
//! A single async mutex guards the whole state. A ledger transaction holds
//! the owned guard for its lifetime and works on a staged copy that replaces
//! the state on commit, so dropping it discards every change.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{still_referenced, CatalogRepository, LedgerRepository, LedgerTransaction};
use crate::error::{AppError, AppResult};
use crate::models::{
    CatalogCounts, Location, Material, MaterialDetail, MaterialFlow, MaterialInput, Movement,
    MovementDetail, MovementFilter, MovementType, NewMovement, Pagination, ReferenceItem,
    ReferenceKind, Store, StoreDetail, StoreInput, StoreStockLine, Supplier, SupplierInput,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    suppliers: BTreeMap<Uuid, Supplier>,
    materials: BTreeMap<Uuid, Material>,
    stores: BTreeMap<Uuid, Store>,
    references: BTreeMap<Uuid, ReferenceItem>,
    central: BTreeMap<Uuid, i64>,
    movements: BTreeMap<Uuid, Movement>,
}

/// Process-local catalog and ledger
#[derive(Clone, Default)]
pub struct MemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(q: Option<&str>, fields: &[&str]) -> bool {
    match q.map(str::trim).filter(|q| !q.is_empty()) {
        None => true,
        Some(q) => {
            let q = q.to_lowercase();
            fields.iter().any(|f| f.to_lowercase().contains(&q))
        }
    }
}

fn paginate<T>(items: Vec<T>, page: Pagination) -> (Vec<T>, u64) {
    let total = items.len() as u64;
    let data = items
        .into_iter()
        .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
        .take(usize::try_from(page.limit()).unwrap_or(usize::MAX))
        .collect();
    (data, total)
}

impl MemoryState {
    fn reference_name(&self, id: Uuid) -> String {
        self.references
            .get(&id)
            .map(|r| r.name.clone())
            .unwrap_or_default()
    }

    fn material_detail(&self, material: &Material) -> MaterialDetail {
        MaterialDetail {
            supplier_name: material
                .supplier_id
                .and_then(|id| self.suppliers.get(&id))
                .map(|s| s.name.clone()),
            central_quantity: self.central.get(&material.id).copied().unwrap_or(0),
            material: material.clone(),
        }
    }

    fn store_detail(&self, store: &Store) -> StoreDetail {
        StoreDetail {
            city: self.reference_name(store.city_id),
            chain: self.reference_name(store.chain_id),
            status: self.reference_name(store.status_id),
            project_type: self.reference_name(store.project_type_id),
            store: store.clone(),
        }
    }

    fn movement_detail(&self, movement: &Movement) -> MovementDetail {
        let material = self.materials.get(&movement.material_id);
        MovementDetail {
            material_code: material.map(|m| m.code.clone()).unwrap_or_default(),
            material_name: material.map(|m| m.name.clone()).unwrap_or_default(),
            store_name: movement
                .location
                .store_id()
                .and_then(|id| self.stores.get(&id))
                .map(|s| s.name.clone()),
            movement: movement.clone(),
        }
    }

    fn store_balance(&self, store_id: Uuid, material_id: Uuid) -> i64 {
        shared::ledger::project_store_balances(self.movements.values())
            .get(&(store_id, material_id))
            .copied()
            .unwrap_or(0)
    }

    fn is_referenced_by_movement(&self, predicate: impl Fn(&Movement) -> bool) -> bool {
        self.movements.values().any(predicate)
    }

    fn supplier_code_taken(&self, code: &str, except: Option<Uuid>) -> bool {
        self.suppliers
            .values()
            .any(|s| s.code == code && Some(s.id) != except)
    }

    fn material_code_taken(&self, code: &str, except: Option<Uuid>) -> bool {
        self.materials
            .values()
            .any(|m| m.code == code && Some(m.id) != except)
    }

    fn store_code_taken(&self, code: &str, except: Option<Uuid>) -> bool {
        self.stores
            .values()
            .any(|s| s.code == code && Some(s.id) != except)
    }

    fn movement_matches(&self, movement: &Movement, filter: &MovementFilter) -> bool {
        if let Some(q) = filter.search_text() {
            let detail = self.movement_detail(movement);
            let text_hit = detail.material_name.to_lowercase().contains(&q)
                || detail
                    .store_name
                    .as_deref()
                    .is_some_and(|s| s.to_lowercase().contains(&q))
                || movement.movement_type.as_str().to_lowercase().contains(&q);
            let quantity_hit = filter.search_quantity() == Some(movement.quantity);
            if !text_hit && !quantity_hit {
                return false;
            }
        }

        filter.movement_type.map_or(true, |t| t == movement.movement_type)
            && filter.material_id.map_or(true, |m| m == movement.material_id)
            && filter
                .store_id
                .map_or(true, |s| movement.location.store_id() == Some(s))
            && filter.date_range().contains(movement.moved_at)
    }
}

// ============================================================================
// Catalog
// ============================================================================

#[async_trait]
impl CatalogRepository for MemoryRepository {
    async fn list_suppliers(&self, q: Option<&str>, page: Pagination) -> AppResult<(Vec<Supplier>, u64)> {
        let state = self.state.lock().await;
        let mut items: Vec<Supplier> = state
            .suppliers
            .values()
            .filter(|s| matches(q, &[s.code.as_str(), s.name.as_str()]))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(paginate(items, page))
    }

    async fn get_supplier(&self, id: Uuid) -> AppResult<Option<Supplier>> {
        Ok(self.state.lock().await.suppliers.get(&id).cloned())
    }

    async fn create_supplier(&self, input: &SupplierInput) -> AppResult<Supplier> {
        let mut state = self.state.lock().await;
        if state.supplier_code_taken(&input.code, None) {
            return Err(AppError::DuplicateCode("code".to_string()));
        }
        let supplier = Supplier {
            id: Uuid::new_v4(),
            code: input.code.clone(),
            name: input.name.clone(),
        };
        state.suppliers.insert(supplier.id, supplier.clone());
        Ok(supplier)
    }

    async fn update_supplier(&self, id: Uuid, input: &SupplierInput) -> AppResult<Option<Supplier>> {
        let mut state = self.state.lock().await;
        if !state.suppliers.contains_key(&id) {
            return Ok(None);
        }
        if state.supplier_code_taken(&input.code, Some(id)) {
            return Err(AppError::DuplicateCode("code".to_string()));
        }
        let supplier = Supplier {
            id,
            code: input.code.clone(),
            name: input.name.clone(),
        };
        state.suppliers.insert(id, supplier.clone());
        Ok(Some(supplier))
    }

    async fn delete_supplier(&self, id: Uuid) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        if state.materials.values().any(|m| m.supplier_id == Some(id)) {
            return Err(still_referenced("Supplier", "materials"));
        }
        Ok(state.suppliers.remove(&id).is_some())
    }

    async fn count_supplier_materials(&self, id: Uuid) -> AppResult<u64> {
        let state = self.state.lock().await;
        Ok(state
            .materials
            .values()
            .filter(|m| m.supplier_id == Some(id))
            .count() as u64)
    }

    async fn list_materials(&self, q: Option<&str>, page: Pagination) -> AppResult<(Vec<MaterialDetail>, u64)> {
        let state = self.state.lock().await;
        let mut items: Vec<MaterialDetail> = state
            .materials
            .values()
            .filter(|m| {
                matches(
                    q,
                    &[
                        m.code.as_str(),
                        m.name.as_str(),
                        m.description.as_deref().unwrap_or_default(),
                    ],
                )
            })
            .map(|m| state.material_detail(m))
            .collect();
        items.sort_by(|a, b| {
            a.material
                .name
                .cmp(&b.material.name)
                .then(a.material.id.cmp(&b.material.id))
        });
        Ok(paginate(items, page))
    }

    async fn all_materials(&self) -> AppResult<Vec<MaterialDetail>> {
        let (items, _) = self
            .list_materials(None, Pagination { page: 1, per_page: u32::MAX })
            .await?;
        Ok(items)
    }

    async fn get_material(&self, id: Uuid) -> AppResult<Option<MaterialDetail>> {
        let state = self.state.lock().await;
        Ok(state.materials.get(&id).map(|m| state.material_detail(m)))
    }

    async fn create_material(&self, input: &MaterialInput) -> AppResult<MaterialDetail> {
        let mut state = self.state.lock().await;
        if state.material_code_taken(&input.code, None) {
            return Err(AppError::DuplicateCode("code".to_string()));
        }
        let material = Material {
            id: Uuid::new_v4(),
            code: input.code.clone(),
            name: input.name.clone(),
            description: input.description.clone(),
            unit_price: input.unit_price,
            supplier_id: input.supplier_id,
        };
        state.materials.insert(material.id, material.clone());
        Ok(state.material_detail(&material))
    }

    async fn update_material(&self, id: Uuid, input: &MaterialInput) -> AppResult<Option<MaterialDetail>> {
        let mut state = self.state.lock().await;
        if !state.materials.contains_key(&id) {
            return Ok(None);
        }
        if state.material_code_taken(&input.code, Some(id)) {
            return Err(AppError::DuplicateCode("code".to_string()));
        }
        let material = Material {
            id,
            code: input.code.clone(),
            name: input.name.clone(),
            description: input.description.clone(),
            unit_price: input.unit_price,
            supplier_id: input.supplier_id,
        };
        state.materials.insert(id, material.clone());
        Ok(Some(state.material_detail(&material)))
    }

    async fn delete_material(&self, id: Uuid) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        if state.is_referenced_by_movement(|m| m.material_id == id) {
            return Err(still_referenced("Material", "movements"));
        }
        state.central.remove(&id);
        Ok(state.materials.remove(&id).is_some())
    }

    async fn list_stores(&self, q: Option<&str>, page: Pagination) -> AppResult<(Vec<StoreDetail>, u64)> {
        let state = self.state.lock().await;
        let mut items: Vec<StoreDetail> = state
            .stores
            .values()
            .map(|s| state.store_detail(s))
            .filter(|d| matches(q, &[d.store.code.as_str(), d.store.name.as_str(), d.city.as_str()]))
            .collect();
        items.sort_by(|a, b| a.store.name.cmp(&b.store.name).then(a.store.id.cmp(&b.store.id)));
        Ok(paginate(items, page))
    }

    async fn get_store(&self, id: Uuid) -> AppResult<Option<StoreDetail>> {
        let state = self.state.lock().await;
        Ok(state.stores.get(&id).map(|s| state.store_detail(s)))
    }

    async fn create_store(&self, input: &StoreInput) -> AppResult<StoreDetail> {
        let mut state = self.state.lock().await;
        if state.store_code_taken(&input.code, None) {
            return Err(AppError::DuplicateCode("code".to_string()));
        }
        let store = Store {
            id: Uuid::new_v4(),
            code: input.code.clone(),
            name: input.name.clone(),
            city_id: input.city_id,
            chain_id: input.chain_id,
            status_id: input.status_id,
            project_type_id: input.project_type_id,
        };
        state.stores.insert(store.id, store.clone());
        Ok(state.store_detail(&store))
    }

    async fn update_store(&self, id: Uuid, input: &StoreInput) -> AppResult<Option<StoreDetail>> {
        let mut state = self.state.lock().await;
        if !state.stores.contains_key(&id) {
            return Ok(None);
        }
        if state.store_code_taken(&input.code, Some(id)) {
            return Err(AppError::DuplicateCode("code".to_string()));
        }
        let store = Store {
            id,
            code: input.code.clone(),
            name: input.name.clone(),
            city_id: input.city_id,
            chain_id: input.chain_id,
            status_id: input.status_id,
            project_type_id: input.project_type_id,
        };
        state.stores.insert(id, store.clone());
        Ok(Some(state.store_detail(&store)))
    }

    async fn delete_store(&self, id: Uuid) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        if state.is_referenced_by_movement(|m| m.location.store_id() == Some(id)) {
            return Err(still_referenced("Store", "movements"));
        }
        Ok(state.stores.remove(&id).is_some())
    }

    async fn list_reference(&self, kind: ReferenceKind) -> AppResult<Vec<ReferenceItem>> {
        let state = self.state.lock().await;
        let mut items: Vec<ReferenceItem> = state
            .references
            .values()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn create_reference(&self, kind: ReferenceKind, name: &str) -> AppResult<ReferenceItem> {
        let mut state = self.state.lock().await;
        if kind.has_unique_name()
            && state
                .references
                .values()
                .any(|r| r.kind == kind && r.name == name)
        {
            return Err(AppError::DuplicateCode("name".to_string()));
        }
        let item = ReferenceItem {
            id: Uuid::new_v4(),
            kind,
            name: name.to_string(),
        };
        state.references.insert(item.id, item.clone());
        Ok(item)
    }

    async fn reference_exists(&self, kind: ReferenceKind, id: Uuid) -> AppResult<bool> {
        let state = self.state.lock().await;
        Ok(state.references.get(&id).is_some_and(|r| r.kind == kind))
    }

    async fn counts(&self) -> AppResult<CatalogCounts> {
        let state = self.state.lock().await;
        Ok(CatalogCounts {
            suppliers: state.suppliers.len() as u64,
            materials: state.materials.len() as u64,
            stores: state.stores.len() as u64,
        })
    }
}

// ============================================================================
// Ledger
// ============================================================================

#[async_trait]
impl LedgerRepository for MemoryRepository {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTransaction>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, staged }))
    }

    async fn central_stock(&self, material_id: Uuid) -> AppResult<Option<i64>> {
        Ok(self.state.lock().await.central.get(&material_id).copied())
    }

    async fn ledger_central_total(&self, material_id: Uuid) -> AppResult<i64> {
        let state = self.state.lock().await;
        Ok(shared::ledger::ledger_central_total(
            state.movements.values(),
            material_id,
        ))
    }

    async fn store_balance(&self, store_id: Uuid, material_id: Uuid) -> AppResult<i64> {
        Ok(self.state.lock().await.store_balance(store_id, material_id))
    }

    async fn store_stock(&self, q: Option<&str>) -> AppResult<Vec<StoreStockLine>> {
        let state = self.state.lock().await;
        let balances = shared::ledger::positive_balances(shared::ledger::project_store_balances(
            state.movements.values(),
        ));

        let mut lines: Vec<StoreStockLine> = balances
            .into_iter()
            .filter_map(|((store_id, material_id), quantity)| {
                let store = state.stores.get(&store_id)?;
                let material = state.materials.get(&material_id)?;
                Some(StoreStockLine {
                    store_id,
                    store_name: store.name.clone(),
                    material_id,
                    material_code: material.code.clone(),
                    material_name: material.name.clone(),
                    description: material.description.clone(),
                    quantity,
                })
            })
            .filter(|l| {
                matches(
                    q,
                    &[
                        l.store_name.as_str(),
                        l.material_name.as_str(),
                        l.material_code.as_str(),
                    ],
                )
            })
            .collect();
        lines.sort_by(|a, b| {
            a.store_name
                .cmp(&b.store_name)
                .then(a.material_name.cmp(&b.material_name))
        });
        Ok(lines)
    }

    async fn get_movement(&self, id: Uuid) -> AppResult<Option<MovementDetail>> {
        let state = self.state.lock().await;
        Ok(state.movements.get(&id).map(|m| state.movement_detail(m)))
    }

    async fn list_movements(
        &self,
        filter: &MovementFilter,
        page: Pagination,
    ) -> AppResult<(Vec<MovementDetail>, u64)> {
        let state = self.state.lock().await;
        let mut items: Vec<&Movement> = state
            .movements
            .values()
            .filter(|m| state.movement_matches(m, filter))
            .collect();
        items.sort_by(|a, b| b.moved_at.cmp(&a.moved_at).then(b.id.cmp(&a.id)));
        let details = items.into_iter().map(|m| state.movement_detail(m)).collect();
        Ok(paginate(details, page))
    }

    async fn count_movements(&self) -> AppResult<u64> {
        Ok(self.state.lock().await.movements.len() as u64)
    }

    async fn material_flows(&self) -> AppResult<Vec<MaterialFlow>> {
        let state = self.state.lock().await;
        let mut flows: BTreeMap<Uuid, MaterialFlow> = BTreeMap::new();
        for movement in state.movements.values() {
            if let Location::Store { .. } = movement.location {
                let flow = flows.entry(movement.material_id).or_insert(MaterialFlow {
                    material_id: movement.material_id,
                    ..Default::default()
                });
                match movement.movement_type {
                    MovementType::Sortie => flow.store_sorties += i64::from(movement.quantity),
                    MovementType::Entree => flow.store_returns += i64::from(movement.quantity),
                }
            }
        }
        Ok(flows.into_values().collect())
    }

    async fn health(&self) -> AppResult<()> {
        Ok(())
    }
}

/// Exclusive transaction over a staged copy of the state
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl LedgerTransaction for MemoryTransaction {
    async fn material_exists(&mut self, material_id: Uuid) -> AppResult<bool> {
        Ok(self.staged.materials.contains_key(&material_id))
    }

    async fn store_exists(&mut self, store_id: Uuid) -> AppResult<bool> {
        Ok(self.staged.stores.contains_key(&store_id))
    }

    async fn ensure_central_stock(&mut self, material_id: Uuid) -> AppResult<i64> {
        Ok(*self.staged.central.entry(material_id).or_insert(0))
    }

    async fn apply_central_delta(&mut self, material_id: Uuid, delta: i64) -> AppResult<i64> {
        let quantity = self.staged.central.entry(material_id).or_insert(0);
        let after = *quantity + delta;
        if after < 0 {
            return Err(AppError::Internal(format!(
                "central stock of {} would become negative",
                material_id
            )));
        }
        *quantity = after;
        Ok(after)
    }

    async fn store_balance(&mut self, store_id: Uuid, material_id: Uuid) -> AppResult<i64> {
        Ok(self.staged.store_balance(store_id, material_id))
    }

    async fn insert_movement(&mut self, movement: &NewMovement) -> AppResult<Movement> {
        let movement = movement.clone().into_movement(Uuid::new_v4());
        self.staged.movements.insert(movement.id, movement.clone());
        Ok(movement)
    }

    async fn movement_for_update(&mut self, id: Uuid) -> AppResult<Option<Movement>> {
        Ok(self.staged.movements.get(&id).cloned())
    }

    async fn update_movement(&mut self, movement: &Movement) -> AppResult<()> {
        match self.staged.movements.get_mut(&movement.id) {
            Some(existing) => {
                *existing = movement.clone();
                Ok(())
            }
            None => Err(AppError::NotFound("Movement".to_string())),
        }
    }

    async fn delete_movement(&mut self, id: Uuid) -> AppResult<()> {
        self.staged
            .movements
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound("Movement".to_string()))
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
