//! PostgreSQL inventory ledger using row locks.

use std::collections::BTreeMap;

use async_trait::async_trait;
use common::ProductId;
use domain::{InventoryDemand, Product, ReservationResult};
use sqlx::{PgPool, Postgres, Row, Transaction};
use store::StoreError;
use store::postgres::{count_to_db, count_from_db, row_to_product};

use super::inventory::{InventoryLedger, check_demand, record_release, record_reservation};

/// Ledger that reserves inside one database transaction.
///
/// Product rows are locked with `SELECT ... FOR UPDATE` in ascending id
/// order, so concurrent reservations over overlapping products cannot
/// deadlock and never observe each other's partial writes.
#[derive(Clone)]
pub struct PostgresInventoryLedger {
    pool: PgPool,
}

impl PostgresInventoryLedger {
    /// Creates a ledger over the `products` table.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn ids(demand: &InventoryDemand) -> Vec<i64> {
        demand.iter().map(|(id, _)| id.get()).collect()
    }

    async fn lock_rows(
        tx: &mut Transaction<'static, Postgres>,
        ids: &[i64],
    ) -> Result<BTreeMap<ProductId, Product>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, price_cents, stock_quantity, active
            FROM products
            WHERE id = ANY($1)
            ORDER BY id ASC
            FOR UPDATE
            "#,
        )
        .bind(ids)
        .fetch_all(&mut **tx)
        .await?;

        rows.iter()
            .map(|row| row_to_product(row).map(|p| (p.id, p)))
            .collect()
    }

    async fn read_rows(&self, ids: &[i64]) -> Result<BTreeMap<ProductId, Product>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, price_cents, stock_quantity, active FROM products WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row_to_product(row).map(|p| (p.id, p)))
            .collect()
    }
}

#[async_trait]
impl InventoryLedger for PostgresInventoryLedger {
    #[tracing::instrument(skip(self, demand), fields(products = demand.len(), units = demand.total_units()))]
    async fn reserve(&self, demand: &InventoryDemand) -> Result<ReservationResult, StoreError> {
        let mut tx = self.pool.begin().await?;

        let products = Self::lock_rows(&mut tx, &Self::ids(demand)).await?;
        let result = check_demand(demand, &products);
        if !result.is_reserved() {
            tx.rollback().await?;
            tracing::info!(outcome = result.as_str(), "reservation rejected");
            record_reservation(&result);
            return Ok(result);
        }

        for (id, requested) in demand.iter() {
            sqlx::query(
                "UPDATE products SET stock_quantity = stock_quantity - $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(id.get())
            .bind(count_to_db(requested)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        record_reservation(&result);
        Ok(result)
    }

    #[tracing::instrument(skip(self, demand), fields(products = demand.len()))]
    async fn release(&self, demand: &InventoryDemand) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let locked = Self::lock_rows(&mut tx, &Self::ids(demand)).await?;

        for (id, quantity) in demand.iter() {
            if !locked.contains_key(&id) {
                tracing::warn!(product_id = %id, quantity, "released product no longer exists");
                continue;
            }
            sqlx::query(
                "UPDATE products SET stock_quantity = stock_quantity + $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(id.get())
            .bind(count_to_db(quantity)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        record_release();
        Ok(())
    }

    async fn check_availability(&self, demand: &InventoryDemand) -> Result<bool, StoreError> {
        let products = self.read_rows(&Self::ids(demand)).await?;
        Ok(check_demand(demand, &products).is_reserved())
    }

    async fn stock_levels(
        &self,
        product_ids: &[ProductId],
    ) -> Result<BTreeMap<ProductId, u32>, StoreError> {
        let ids: Vec<i64> = product_ids.iter().map(|id| id.get()).collect();
        let rows = sqlx::query("SELECT id, stock_quantity FROM products WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;

        let mut levels: BTreeMap<ProductId, u32> =
            product_ids.iter().map(|id| (*id, 0)).collect();
        for row in &rows {
            let id = ProductId::new(row.try_get("id")?);
            levels.insert(id, count_from_db(row.try_get("stock_quantity")?, "stock_quantity")?);
        }
        Ok(levels)
    }
}
