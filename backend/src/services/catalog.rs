//! Catalog service for suppliers, materials, stores and lookup tables

use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{
    MaterialDetail, MaterialInput, PaginatedResponse, Pagination, ReferenceInput, ReferenceItem,
    ReferenceKind, StoreDetail, StoreInput, Supplier, SupplierInput,
};
use crate::repositories::CatalogRepository;

/// Catalog service for reference data management
#[derive(Clone)]
pub struct CatalogService {
    catalog: Arc<dyn CatalogRepository>,
}

fn invalid(field: &str, message: &str) -> AppError {
    AppError::validation(
        field,
        message,
        format!("Valeur invalide pour le champ {}", field),
    )
}

fn check_code(code: &str) -> AppResult<()> {
    shared::validate_code(code).map_err(|msg| invalid("code", msg))
}

fn check_name(name: &str) -> AppResult<()> {
    shared::validate_name(name).map_err(|msg| invalid("name", msg))
}

fn trimmed_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

impl CatalogService {
    pub fn new(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { catalog }
    }

    // ========================================================================
    // Suppliers
    // ========================================================================

    pub async fn list_suppliers(
        &self,
        q: Option<&str>,
        page: Pagination,
    ) -> AppResult<PaginatedResponse<Supplier>> {
        let (items, total) = self.catalog.list_suppliers(q, page).await?;
        Ok(PaginatedResponse::new(items, page, total))
    }

    pub async fn get_supplier(&self, id: Uuid) -> AppResult<Supplier> {
        self.catalog
            .get_supplier(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Supplier".to_string()))
    }

    pub async fn create_supplier(&self, input: SupplierInput) -> AppResult<Supplier> {
        let input = Self::prepare_supplier(input)?;
        let supplier = self.catalog.create_supplier(&input).await?;
        tracing::info!("Supplier created: {} ({})", supplier.code, supplier.id);
        Ok(supplier)
    }

    pub async fn update_supplier(&self, id: Uuid, input: SupplierInput) -> AppResult<Supplier> {
        let input = Self::prepare_supplier(input)?;
        self.catalog
            .update_supplier(id, &input)
            .await?
            .ok_or_else(|| AppError::NotFound("Supplier".to_string()))
    }

    /// Delete a supplier; refused while materials still reference it
    pub async fn delete_supplier(&self, id: Uuid) -> AppResult<()> {
        let supplier = self.get_supplier(id).await?;

        let linked = self.catalog.count_supplier_materials(id).await?;
        if linked > 0 {
            return Err(AppError::Conflict {
                resource: "supplier".to_string(),
                message: format!(
                    "Supplier {} is linked to {} material(s) and cannot be deleted",
                    supplier.code, linked
                ),
                message_fr: format!(
                    "Le fournisseur {} est lié à {} matériel(s) et ne peut pas être supprimé",
                    supplier.code, linked
                ),
            });
        }

        if !self.catalog.delete_supplier(id).await? {
            return Err(AppError::NotFound("Supplier".to_string()));
        }
        tracing::info!("Supplier deleted: {} ({})", supplier.code, id);
        Ok(())
    }

    fn prepare_supplier(input: SupplierInput) -> AppResult<SupplierInput> {
        let input = SupplierInput {
            code: shared::normalize_label(&input.code),
            name: shared::normalize_label(&input.name),
        };
        check_code(&input.code)?;
        check_name(&input.name)?;
        input.validate()?;
        Ok(input)
    }

    // ========================================================================
    // Materials
    // ========================================================================

    pub async fn list_materials(
        &self,
        q: Option<&str>,
        page: Pagination,
    ) -> AppResult<PaginatedResponse<MaterialDetail>> {
        let (items, total) = self.catalog.list_materials(q, page).await?;
        Ok(PaginatedResponse::new(items, page, total))
    }

    pub async fn get_material(&self, id: Uuid) -> AppResult<MaterialDetail> {
        self.catalog
            .get_material(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Material".to_string()))
    }

    pub async fn create_material(&self, input: MaterialInput) -> AppResult<MaterialDetail> {
        let input = self.prepare_material(input).await?;
        let material = self.catalog.create_material(&input).await?;
        tracing::info!(
            "Material created: {} ({})",
            material.material.code,
            material.material.id
        );
        Ok(material)
    }

    pub async fn update_material(&self, id: Uuid, input: MaterialInput) -> AppResult<MaterialDetail> {
        let input = self.prepare_material(input).await?;
        self.catalog
            .update_material(id, &input)
            .await?
            .ok_or_else(|| AppError::NotFound("Material".to_string()))
    }

    /// Delete a material; refused while movements still reference it
    pub async fn delete_material(&self, id: Uuid) -> AppResult<()> {
        if !self.catalog.delete_material(id).await? {
            return Err(AppError::NotFound("Material".to_string()));
        }
        tracing::info!("Material deleted: {}", id);
        Ok(())
    }

    async fn prepare_material(&self, input: MaterialInput) -> AppResult<MaterialInput> {
        let input = MaterialInput {
            code: shared::normalize_label(&input.code),
            name: shared::normalize_label(&input.name),
            description: trimmed_description(input.description),
            unit_price: input.unit_price,
            supplier_id: input.supplier_id,
        };
        check_code(&input.code)?;
        check_name(&input.name)?;
        input.validate()?;
        shared::validate_unit_price(input.unit_price).map_err(|msg| {
            AppError::validation(
                "unit_price",
                msg,
                "Le prix unitaire doit être positif avec au plus deux décimales",
            )
        })?;

        if let Some(supplier_id) = input.supplier_id {
            if self.catalog.get_supplier(supplier_id).await?.is_none() {
                return Err(AppError::NotFound("Supplier".to_string()));
            }
        }
        Ok(input)
    }

    // ========================================================================
    // Stores
    // ========================================================================

    pub async fn list_stores(
        &self,
        q: Option<&str>,
        page: Pagination,
    ) -> AppResult<PaginatedResponse<StoreDetail>> {
        let (items, total) = self.catalog.list_stores(q, page).await?;
        Ok(PaginatedResponse::new(items, page, total))
    }

    pub async fn get_store(&self, id: Uuid) -> AppResult<StoreDetail> {
        self.catalog
            .get_store(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Store".to_string()))
    }

    pub async fn create_store(&self, input: StoreInput) -> AppResult<StoreDetail> {
        let input = self.prepare_store(input).await?;
        let store = self.catalog.create_store(&input).await?;
        tracing::info!("Store created: {} ({})", store.store.code, store.store.id);
        Ok(store)
    }

    pub async fn update_store(&self, id: Uuid, input: StoreInput) -> AppResult<StoreDetail> {
        let input = self.prepare_store(input).await?;
        self.catalog
            .update_store(id, &input)
            .await?
            .ok_or_else(|| AppError::NotFound("Store".to_string()))
    }

    /// Delete a store; refused while movements still reference it
    pub async fn delete_store(&self, id: Uuid) -> AppResult<()> {
        if !self.catalog.delete_store(id).await? {
            return Err(AppError::NotFound("Store".to_string()));
        }
        tracing::info!("Store deleted: {}", id);
        Ok(())
    }

    async fn prepare_store(&self, input: StoreInput) -> AppResult<StoreInput> {
        let input = StoreInput {
            code: shared::normalize_label(&input.code),
            name: shared::normalize_label(&input.name),
            ..input
        };
        check_code(&input.code)?;
        check_name(&input.name)?;
        input.validate()?;

        let references = [
            (ReferenceKind::City, input.city_id),
            (ReferenceKind::Chain, input.chain_id),
            (ReferenceKind::Status, input.status_id),
            (ReferenceKind::ProjectType, input.project_type_id),
        ];
        for (kind, id) in references {
            if !self.catalog.reference_exists(kind, id).await? {
                return Err(AppError::NotFound(kind.label().to_string()));
            }
        }
        Ok(input)
    }

    // ========================================================================
    // Reference tables
    // ========================================================================

    pub async fn list_reference(&self, kind: ReferenceKind) -> AppResult<Vec<ReferenceItem>> {
        self.catalog.list_reference(kind).await
    }

    pub async fn create_reference(
        &self,
        kind: ReferenceKind,
        input: ReferenceInput,
    ) -> AppResult<ReferenceItem> {
        let name = shared::normalize_label(&input.name);
        check_name(&name)?;
        self.catalog.create_reference(kind, &name).await
    }
}
