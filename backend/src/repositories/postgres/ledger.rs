//! Ledger queries and the row-locking write transaction

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::{
    like_pattern, to_i64, to_u64, MovementDetailRow, MovementRow, PgRepository,
    MOVEMENT_COLUMNS, MOVEMENT_DETAIL_SELECT,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    MaterialFlow, Movement, MovementDetail, MovementFilter, NewMovement, Pagination,
    StoreStockLine,
};
use crate::repositories::{LedgerRepository, LedgerTransaction};

/// Signed contribution of a movement to its store balance
const STORE_SIGNED_QTY: &str = "CASE WHEN sm.movement_type = 'SORTIE' THEN sm.quantity ELSE -sm.quantity END";

const MOVEMENT_FILTER: &str = r#"
    WHERE ($1::text IS NULL
           OR m.name ILIKE $1 OR st.name ILIKE $1 OR sm.movement_type ILIKE $1
           OR sm.quantity = $2::int)
      AND ($3::text IS NULL OR sm.movement_type = $3)
      AND ($4::uuid IS NULL OR sm.material_id = $4)
      AND ($5::uuid IS NULL OR sm.store_id = $5)
      AND ($6::timestamptz IS NULL OR sm.moved_at >= $6)
      AND ($7::timestamptz IS NULL OR sm.moved_at <= $7)
"#;

#[derive(Debug, sqlx::FromRow)]
struct StoreStockRow {
    store_id: Uuid,
    store_name: String,
    material_id: Uuid,
    material_code: String,
    material_name: String,
    description: Option<String>,
    quantity: i64,
}

#[async_trait]
impl LedgerRepository for PgRepository {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTransaction>> {
        let tx = self.db.begin().await?;
        Ok(Box::new(PgLedgerTransaction { tx }))
    }

    async fn central_stock(&self, material_id: Uuid) -> AppResult<Option<i64>> {
        let quantity = sqlx::query_scalar::<_, i64>(
            "SELECT quantity FROM central_stock WHERE material_id = $1",
        )
        .bind(material_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(quantity)
    }

    async fn ledger_central_total(&self, material_id: Uuid) -> AppResult<i64> {
        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(CASE WHEN movement_type = 'ENTREE' THEN quantity ELSE -quantity END), 0)::BIGINT
            FROM stock_movements
            WHERE material_id = $1
            "#,
        )
        .bind(material_id)
        .fetch_one(&self.db)
        .await?;
        Ok(total)
    }

    async fn store_balance(&self, store_id: Uuid, material_id: Uuid) -> AppResult<i64> {
        let balance = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COALESCE(SUM({}), 0)::BIGINT FROM stock_movements sm WHERE sm.store_id = $1 AND sm.material_id = $2",
            STORE_SIGNED_QTY
        ))
        .bind(store_id)
        .bind(material_id)
        .fetch_one(&self.db)
        .await?;
        Ok(balance)
    }

    async fn store_stock(&self, q: Option<&str>) -> AppResult<Vec<StoreStockLine>> {
        let rows = sqlx::query_as::<_, StoreStockRow>(&format!(
            r#"
            SELECT st.id AS store_id, st.name AS store_name,
                   m.id AS material_id, m.code AS material_code, m.name AS material_name,
                   m.description,
                   SUM({signed})::BIGINT AS quantity
            FROM stock_movements sm
            JOIN stores st ON st.id = sm.store_id
            JOIN materials m ON m.id = sm.material_id
            WHERE ($1::text IS NULL OR st.name ILIKE $1 OR m.name ILIKE $1 OR m.code ILIKE $1)
            GROUP BY st.id, st.name, m.id, m.code, m.name, m.description
            HAVING SUM({signed}) > 0
            ORDER BY st.name, m.name
            "#,
            signed = STORE_SIGNED_QTY
        ))
        .bind(like_pattern(q))
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| StoreStockLine {
                store_id: r.store_id,
                store_name: r.store_name,
                material_id: r.material_id,
                material_code: r.material_code,
                material_name: r.material_name,
                description: r.description,
                quantity: r.quantity,
            })
            .collect())
    }

    async fn get_movement(&self, id: Uuid) -> AppResult<Option<MovementDetail>> {
        let row = sqlx::query_as::<_, MovementDetailRow>(&format!(
            "{} WHERE sm.id = $1",
            MOVEMENT_DETAIL_SELECT
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_movements(
        &self,
        filter: &MovementFilter,
        page: Pagination,
    ) -> AppResult<(Vec<MovementDetail>, u64)> {
        let pattern = like_pattern(filter.q.as_deref());
        let quantity = filter.search_quantity();
        let movement_type = filter.movement_type.map(|t| t.as_str());
        let range = filter.date_range();
        let (from, to) = (range.start_bound(), range.end_bound());

        let total = sqlx::query_scalar::<_, i64>(&format!(
            r#"
            SELECT COUNT(*)
            FROM stock_movements sm
            JOIN materials m ON m.id = sm.material_id
            LEFT JOIN stores st ON st.id = sm.store_id
            {}
            "#,
            MOVEMENT_FILTER
        ))
        .bind(&pattern)
        .bind(quantity)
        .bind(movement_type)
        .bind(filter.material_id)
        .bind(filter.store_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, MovementDetailRow>(&format!(
            "{} {} ORDER BY sm.moved_at DESC, sm.id DESC LIMIT $8 OFFSET $9",
            MOVEMENT_DETAIL_SELECT, MOVEMENT_FILTER
        ))
        .bind(&pattern)
        .bind(quantity)
        .bind(movement_type)
        .bind(filter.material_id)
        .bind(filter.store_id)
        .bind(from)
        .bind(to)
        .bind(to_i64(page.limit()))
        .bind(to_i64(page.offset()))
        .fetch_all(&self.db)
        .await?;

        let movements = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<AppResult<Vec<MovementDetail>>>()?;
        Ok((movements, to_u64(total)))
    }

    async fn count_movements(&self) -> AppResult<u64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM stock_movements")
            .fetch_one(&self.db)
            .await?;
        Ok(to_u64(count))
    }

    async fn material_flows(&self) -> AppResult<Vec<MaterialFlow>> {
        let rows = sqlx::query_as::<_, (Uuid, i64, i64)>(
            r#"
            SELECT material_id,
                   COALESCE(SUM(quantity) FILTER (WHERE movement_type = 'SORTIE'), 0)::BIGINT,
                   COALESCE(SUM(quantity) FILTER (WHERE movement_type = 'ENTREE'), 0)::BIGINT
            FROM stock_movements
            WHERE store_id IS NOT NULL
            GROUP BY material_id
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(material_id, store_sorties, store_returns)| MaterialFlow {
                material_id,
                store_sorties,
                store_returns,
            })
            .collect())
    }

    async fn health(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}

/// Ledger transaction holding row locks until commit
pub struct PgLedgerTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTransaction for PgLedgerTransaction {
    async fn material_exists(&mut self, material_id: Uuid) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM materials WHERE id = $1)")
            .bind(material_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(exists)
    }

    async fn store_exists(&mut self, store_id: Uuid) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM stores WHERE id = $1)")
            .bind(store_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(exists)
    }

    async fn ensure_central_stock(&mut self, material_id: Uuid) -> AppResult<i64> {
        sqlx::query(
            "INSERT INTO central_stock (material_id, quantity) VALUES ($1, 0) ON CONFLICT (material_id) DO NOTHING",
        )
        .bind(material_id)
        .execute(&mut *self.tx)
        .await?;

        let quantity = sqlx::query_scalar::<_, i64>(
            "SELECT quantity FROM central_stock WHERE material_id = $1 FOR UPDATE",
        )
        .bind(material_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(quantity)
    }

    async fn apply_central_delta(&mut self, material_id: Uuid, delta: i64) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE central_stock
            SET quantity = quantity + $2, updated_at = NOW()
            WHERE material_id = $1
            RETURNING quantity
            "#,
        )
        .bind(material_id)
        .bind(delta)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::Internal(format!("central stock of {} is not locked", material_id)))
    }

    async fn store_balance(&mut self, store_id: Uuid, material_id: Uuid) -> AppResult<i64> {
        let balance = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COALESCE(SUM({}), 0)::BIGINT FROM stock_movements sm WHERE sm.store_id = $1 AND sm.material_id = $2",
            STORE_SIGNED_QTY
        ))
        .bind(store_id)
        .bind(material_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(balance)
    }

    async fn insert_movement(&mut self, movement: &NewMovement) -> AppResult<Movement> {
        let row = sqlx::query_as::<_, MovementRow>(&format!(
            r#"
            INSERT INTO stock_movements (moved_at, movement_type, quantity, material_id, store_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            MOVEMENT_COLUMNS
        ))
        .bind(movement.moved_at)
        .bind(movement.movement_type.as_str())
        .bind(movement.quantity)
        .bind(movement.material_id)
        .bind(movement.location.store_id())
        .fetch_one(&mut *self.tx)
        .await?;
        row.try_into()
    }

    async fn movement_for_update(&mut self, id: Uuid) -> AppResult<Option<Movement>> {
        let row = sqlx::query_as::<_, MovementRow>(&format!(
            "SELECT {} FROM stock_movements WHERE id = $1 FOR UPDATE",
            MOVEMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update_movement(&mut self, movement: &Movement) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE stock_movements
            SET moved_at = $2, quantity = $3, material_id = $4, store_id = $5
            WHERE id = $1
            "#,
        )
        .bind(movement.id)
        .bind(movement.moved_at)
        .bind(movement.quantity)
        .bind(movement.material_id)
        .bind(movement.location.store_id())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Movement".to_string()));
        }
        Ok(())
    }

    async fn delete_movement(&mut self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM stock_movements WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Movement".to_string()));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
