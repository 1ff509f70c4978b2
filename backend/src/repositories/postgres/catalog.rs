//! Catalog queries

use async_trait::async_trait;
use uuid::Uuid;

use super::{
    like_pattern, map_write_error, reference_table, to_i64, to_u64, MaterialRow, PgRepository,
    StoreRow, MATERIAL_SELECT, STORE_SELECT,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    CatalogCounts, MaterialDetail, MaterialInput, Pagination, ReferenceItem, ReferenceKind,
    StoreDetail, StoreInput, Supplier, SupplierInput,
};
use crate::repositories::CatalogRepository;

#[async_trait]
impl CatalogRepository for PgRepository {
    // ========================================================================
    // Suppliers
    // ========================================================================

    async fn list_suppliers(&self, q: Option<&str>, page: Pagination) -> AppResult<(Vec<Supplier>, u64)> {
        let pattern = like_pattern(q);

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM suppliers WHERE ($1::text IS NULL OR code ILIKE $1 OR name ILIKE $1)",
        )
        .bind(&pattern)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, (Uuid, String, String)>(
            r#"
            SELECT id, code, name FROM suppliers
            WHERE ($1::text IS NULL OR code ILIKE $1 OR name ILIKE $1)
            ORDER BY name, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&pattern)
        .bind(to_i64(page.limit()))
        .bind(to_i64(page.offset()))
        .fetch_all(&self.db)
        .await?;

        let suppliers = rows
            .into_iter()
            .map(|(id, code, name)| Supplier { id, code, name })
            .collect();
        Ok((suppliers, to_u64(total)))
    }

    async fn get_supplier(&self, id: Uuid) -> AppResult<Option<Supplier>> {
        let row = sqlx::query_as::<_, (Uuid, String, String)>(
            "SELECT id, code, name FROM suppliers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(|(id, code, name)| Supplier { id, code, name }))
    }

    async fn create_supplier(&self, input: &SupplierInput) -> AppResult<Supplier> {
        let (id, code, name) = sqlx::query_as::<_, (Uuid, String, String)>(
            "INSERT INTO suppliers (code, name) VALUES ($1, $2) RETURNING id, code, name",
        )
        .bind(&input.code)
        .bind(&input.name)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_write_error(e, "code", "Supplier", "materials"))?;
        Ok(Supplier { id, code, name })
    }

    async fn update_supplier(&self, id: Uuid, input: &SupplierInput) -> AppResult<Option<Supplier>> {
        let row = sqlx::query_as::<_, (Uuid, String, String)>(
            "UPDATE suppliers SET code = $2, name = $3, updated_at = NOW() WHERE id = $1 RETURNING id, code, name",
        )
        .bind(id)
        .bind(&input.code)
        .bind(&input.name)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| map_write_error(e, "code", "Supplier", "materials"))?;
        Ok(row.map(|(id, code, name)| Supplier { id, code, name }))
    }

    async fn delete_supplier(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM suppliers WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| map_write_error(e, "code", "Supplier", "materials"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_supplier_materials(&self, id: Uuid) -> AppResult<u64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM materials WHERE supplier_id = $1")
            .bind(id)
            .fetch_one(&self.db)
            .await?;
        Ok(to_u64(count))
    }

    // ========================================================================
    // Materials
    // ========================================================================

    async fn list_materials(&self, q: Option<&str>, page: Pagination) -> AppResult<(Vec<MaterialDetail>, u64)> {
        let pattern = like_pattern(q);
        let filter = "WHERE ($1::text IS NULL OR m.code ILIKE $1 OR m.name ILIKE $1 OR m.description ILIKE $1)";

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM materials m {}", filter))
            .bind(&pattern)
            .fetch_one(&self.db)
            .await?;

        let rows = sqlx::query_as::<_, MaterialRow>(&format!(
            "{} {} ORDER BY m.name, m.id LIMIT $2 OFFSET $3",
            MATERIAL_SELECT, filter
        ))
        .bind(&pattern)
        .bind(to_i64(page.limit()))
        .bind(to_i64(page.offset()))
        .fetch_all(&self.db)
        .await?;

        Ok((rows.into_iter().map(Into::into).collect(), to_u64(total)))
    }

    async fn all_materials(&self) -> AppResult<Vec<MaterialDetail>> {
        let rows = sqlx::query_as::<_, MaterialRow>(&format!("{} ORDER BY m.name, m.id", MATERIAL_SELECT))
            .fetch_all(&self.db)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_material(&self, id: Uuid) -> AppResult<Option<MaterialDetail>> {
        let row = sqlx::query_as::<_, MaterialRow>(&format!("{} WHERE m.id = $1", MATERIAL_SELECT))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn create_material(&self, input: &MaterialInput) -> AppResult<MaterialDetail> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO materials (code, name, description, unit_price, supplier_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&input.code)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.unit_price)
        .bind(input.supplier_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_write_error(e, "code", "Material", "movements"))?;

        self.get_material(id)
            .await?
            .ok_or_else(|| AppError::Internal("Created material could not be read back".to_string()))
    }

    async fn update_material(&self, id: Uuid, input: &MaterialInput) -> AppResult<Option<MaterialDetail>> {
        let updated = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE materials
            SET code = $2, name = $3, description = $4, unit_price = $5, supplier_id = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(&input.code)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.unit_price)
        .bind(input.supplier_id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| map_write_error(e, "code", "Material", "movements"))?;

        match updated {
            Some(id) => self.get_material(id).await,
            None => Ok(None),
        }
    }

    async fn delete_material(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM materials WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| map_write_error(e, "code", "Material", "movements"))?;
        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // Stores
    // ========================================================================

    async fn list_stores(&self, q: Option<&str>, page: Pagination) -> AppResult<(Vec<StoreDetail>, u64)> {
        let pattern = like_pattern(q);
        let filter = "WHERE ($1::text IS NULL OR st.code ILIKE $1 OR st.name ILIKE $1 OR c.name ILIKE $1)";

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM stores st JOIN cities c ON c.id = st.city_id {}",
            filter
        ))
        .bind(&pattern)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, StoreRow>(&format!(
            "{} {} ORDER BY st.name, st.id LIMIT $2 OFFSET $3",
            STORE_SELECT, filter
        ))
        .bind(&pattern)
        .bind(to_i64(page.limit()))
        .bind(to_i64(page.offset()))
        .fetch_all(&self.db)
        .await?;

        Ok((rows.into_iter().map(Into::into).collect(), to_u64(total)))
    }

    async fn get_store(&self, id: Uuid) -> AppResult<Option<StoreDetail>> {
        let row = sqlx::query_as::<_, StoreRow>(&format!("{} WHERE st.id = $1", STORE_SELECT))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn create_store(&self, input: &StoreInput) -> AppResult<StoreDetail> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO stores (code, name, city_id, chain_id, status_id, project_type_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&input.code)
        .bind(&input.name)
        .bind(input.city_id)
        .bind(input.chain_id)
        .bind(input.status_id)
        .bind(input.project_type_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_write_error(e, "code", "Store", "movements"))?;

        self.get_store(id)
            .await?
            .ok_or_else(|| AppError::Internal("Created store could not be read back".to_string()))
    }

    async fn update_store(&self, id: Uuid, input: &StoreInput) -> AppResult<Option<StoreDetail>> {
        let updated = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE stores
            SET code = $2, name = $3, city_id = $4, chain_id = $5, status_id = $6,
                project_type_id = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(&input.code)
        .bind(&input.name)
        .bind(input.city_id)
        .bind(input.chain_id)
        .bind(input.status_id)
        .bind(input.project_type_id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| map_write_error(e, "code", "Store", "movements"))?;

        match updated {
            Some(id) => self.get_store(id).await,
            None => Ok(None),
        }
    }

    async fn delete_store(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM stores WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| map_write_error(e, "code", "Store", "movements"))?;
        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // Reference tables
    // ========================================================================

    async fn list_reference(&self, kind: ReferenceKind) -> AppResult<Vec<ReferenceItem>> {
        let rows = sqlx::query_as::<_, (Uuid, String)>(&format!(
            "SELECT id, name FROM {} ORDER BY name, id",
            reference_table(kind)
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name)| ReferenceItem { id, kind, name })
            .collect())
    }

    async fn create_reference(&self, kind: ReferenceKind, name: &str) -> AppResult<ReferenceItem> {
        let id = sqlx::query_scalar::<_, Uuid>(&format!(
            "INSERT INTO {} (name) VALUES ($1) RETURNING id",
            reference_table(kind)
        ))
        .bind(name)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_write_error(e, "name", kind.label(), "stores"))?;

        Ok(ReferenceItem {
            id,
            kind,
            name: name.to_string(),
        })
    }

    async fn reference_exists(&self, kind: ReferenceKind, id: Uuid) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(&format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
            reference_table(kind)
        ))
        .bind(id)
        .fetch_one(&self.db)
        .await?;
        Ok(exists)
    }

    async fn counts(&self) -> AppResult<CatalogCounts> {
        let (suppliers, materials, stores) = sqlx::query_as::<_, (i64, i64, i64)>(
            r#"
            SELECT (SELECT COUNT(*) FROM suppliers),
                   (SELECT COUNT(*) FROM materials),
                   (SELECT COUNT(*) FROM stores)
            "#,
        )
        .fetch_one(&self.db)
        .await?;

        Ok(CatalogCounts {
            suppliers: to_u64(suppliers),
            materials: to_u64(materials),
            stores: to_u64(stores),
        })
    }
}
