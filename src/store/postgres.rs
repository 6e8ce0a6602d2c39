//! `PostgreSQL` implementation of `VariantStore`.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{ReplaceOutcome, Replacement, StoreError, VariantStore};
use crate::domain::aggregates::{Color, Combination, Item, Size, VariantSnapshot};
use crate::domain::value_objects::{ColorId, SizeId, Sku, StockLevel};

const LOCK_NOT_AVAILABLE: &str = "55P03";
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

/// Create a `PostgreSQL` connection pool.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &SecretString, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ItemRow { sku: String, name: String, stock_level: i64 }

#[derive(Debug, sqlx::FromRow)]
struct SizeRow { id: Uuid, code: String, name: String, price_adjustment: Decimal, display_order: i32, parent_color_id: Option<Uuid> }

#[derive(Debug, sqlx::FromRow)]
struct ColorRow { id: Uuid, color_name: String, color_code: Option<String>, display_order: i32 }

#[derive(Debug, sqlx::FromRow)]
struct CombinationRow { size_id: Uuid, color_id: Uuid, stock_level: i32 }

impl TryFrom<ItemRow> for Item {
    type Error = StoreError;
    fn try_from(row: ItemRow) -> Result<Self, StoreError> {
        let sku = Sku::new(&row.sku).map_err(|e| StoreError::DataCorruption(format!("item sku {:?}: {e}", row.sku)))?;
        Ok(Self { sku, name: row.name, stock_level: row.stock_level })
    }
}

impl From<SizeRow> for Size {
    fn from(row: SizeRow) -> Self {
        Self {
            id: SizeId::from_uuid(row.id), code: row.code, name: row.name,
            price_adjustment: row.price_adjustment, display_order: row.display_order,
            parent_color_id: row.parent_color_id.map(ColorId::from_uuid),
        }
    }
}

impl From<ColorRow> for Color {
    fn from(row: ColorRow) -> Self {
        Self { id: ColorId::from_uuid(row.id), color_name: row.color_name, color_code: row.color_code, display_order: row.display_order }
    }
}

impl TryFrom<CombinationRow> for Combination {
    type Error = StoreError;
    fn try_from(row: CombinationRow) -> Result<Self, StoreError> {
        let stock_level = StockLevel::from_db(row.stock_level)
            .map_err(|e| StoreError::DataCorruption(format!("combination {}/{}: {e}", row.size_id, row.color_id)))?;
        Ok(Self { size_id: SizeId::from_uuid(row.size_id), color_id: ColorId::from_uuid(row.color_id), stock_level })
    }
}

// =============================================================================
// Queries
// =============================================================================

async fn fetch_item(conn: &mut PgConnection, sku: &Sku) -> Result<Option<Item>, StoreError> {
    sqlx::query_as::<_, ItemRow>("SELECT sku, name, stock_level FROM items WHERE sku = $1")
        .bind(sku.as_str()).fetch_optional(conn).await?
        .map(Item::try_from).transpose()
}

async fn fetch_sizes(conn: &mut PgConnection, sku: &Sku) -> Result<Vec<Size>, StoreError> {
    let rows = sqlx::query_as::<_, SizeRow>(
        "SELECT id, code, name, price_adjustment, display_order, parent_color_id FROM item_sizes WHERE item_sku = $1 ORDER BY display_order, code, id",
    ).bind(sku.as_str()).fetch_all(conn).await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

async fn fetch_colors(conn: &mut PgConnection, sku: &Sku) -> Result<Vec<Color>, StoreError> {
    let rows = sqlx::query_as::<_, ColorRow>(
        "SELECT id, color_name, color_code, display_order FROM item_colors WHERE item_sku = $1 ORDER BY display_order, color_name, id",
    ).bind(sku.as_str()).fetch_all(conn).await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

async fn fetch_combinations(conn: &mut PgConnection, sku: &Sku) -> Result<Vec<Combination>, StoreError> {
    // Ids are v7, so id order is insertion order.
    let rows = sqlx::query_as::<_, CombinationRow>(
        "SELECT size_id, color_id, stock_level FROM item_variant_stock WHERE item_sku = $1 ORDER BY id",
    ).bind(sku.as_str()).fetch_all(conn).await?;
    rows.into_iter().map(Combination::try_from).collect()
}

fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some(LOCK_NOT_AVAILABLE) => return StoreError::LockTimeout,
            Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED) => return StoreError::Conflict(db.message().to_string()),
            _ => {}
        }
    }
    if matches!(err, sqlx::Error::PoolTimedOut) { return StoreError::LockTimeout; }
    StoreError::Database(err)
}

// =============================================================================
// Store
// =============================================================================

#[derive(Clone)]
pub struct PgVariantStore { pool: PgPool, lock_timeout: Duration }

impl PgVariantStore {
    pub const fn new(pool: PgPool, lock_timeout: Duration) -> Self { Self { pool, lock_timeout } }
}

#[async_trait]
impl VariantStore for PgVariantStore {
    async fn load_item(&self, sku: &Sku) -> Result<Option<Item>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        fetch_item(&mut conn, sku).await
    }

    async fn load_sizes(&self, sku: &Sku) -> Result<Vec<Size>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        fetch_sizes(&mut conn, sku).await
    }

    async fn load_colors(&self, sku: &Sku) -> Result<Vec<Color>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        fetch_colors(&mut conn, sku).await
    }

    async fn load_combinations(&self, sku: &Sku) -> Result<Vec<Combination>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        fetch_combinations(&mut conn, sku).await
    }

    async fn load_snapshot(&self, sku: &Sku) -> Result<Option<VariantSnapshot>, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY").execute(&mut *tx).await?;
        let Some(item) = fetch_item(&mut tx, sku).await? else {
            tx.rollback().await?;
            return Ok(None);
        };
        let sizes = fetch_sizes(&mut tx, sku).await?;
        let colors = fetch_colors(&mut tx, sku).await?;
        let combinations = fetch_combinations(&mut tx, sku).await?;
        tx.commit().await?;
        Ok(Some(VariantSnapshot { item, sizes, colors, combinations }))
    }

    async fn replace_all(&self, sku: &Sku, replacement: &Replacement) -> Result<ReplaceOutcome, StoreError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;
        // SET does not take bind parameters; the value is an integer we format ourselves.
        sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout.as_millis()))
            .execute(&mut *tx).await.map_err(classify)?;

        let locked: Option<(String,)> = sqlx::query_as("SELECT sku FROM items WHERE sku = $1 FOR UPDATE")
            .bind(sku.as_str()).fetch_optional(&mut *tx).await.map_err(classify)?;
        if locked.is_none() { return Err(StoreError::ItemNotFound); }

        let (previous_total_stock,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(stock_level), 0)::BIGINT FROM item_variant_stock WHERE item_sku = $1",
        ).bind(sku.as_str()).fetch_one(&mut *tx).await.map_err(classify)?;

        let removed_combinations = sqlx::query("DELETE FROM item_variant_stock WHERE item_sku = $1")
            .bind(sku.as_str()).execute(&mut *tx).await.map_err(classify)?.rows_affected();
        let removed_sizes = sqlx::query("DELETE FROM item_sizes WHERE item_sku = $1")
            .bind(sku.as_str()).execute(&mut *tx).await.map_err(classify)?.rows_affected();
        let removed_colors = sqlx::query("DELETE FROM item_colors WHERE item_sku = $1")
            .bind(sku.as_str()).execute(&mut *tx).await.map_err(classify)?.rows_affected();

        for color in &replacement.colors {
            sqlx::query("INSERT INTO item_colors (id, item_sku, color_name, color_code, display_order) VALUES ($1, $2, $3, $4, $5)")
                .bind(color.id.as_uuid()).bind(sku.as_str()).bind(&color.color_name).bind(&color.color_code).bind(color.display_order)
                .execute(&mut *tx).await.map_err(classify)?;
        }
        for size in &replacement.sizes {
            sqlx::query("INSERT INTO item_sizes (id, item_sku, code, name, price_adjustment, display_order, parent_color_id) VALUES ($1, $2, $3, $4, $5, $6, $7)")
                .bind(size.id.as_uuid()).bind(sku.as_str()).bind(&size.code).bind(&size.name).bind(size.price_adjustment)
                .bind(size.display_order).bind(size.parent_color_id.map(|c| c.as_uuid()))
                .execute(&mut *tx).await.map_err(classify)?;
        }
        for combo in &replacement.combinations {
            sqlx::query("INSERT INTO item_variant_stock (id, item_sku, size_id, color_id, stock_level) VALUES ($1, $2, $3, $4, $5)")
                .bind(Uuid::now_v7()).bind(sku.as_str()).bind(combo.size_id.as_uuid()).bind(combo.color_id.as_uuid())
                .bind(combo.stock_level.to_db())
                .execute(&mut *tx).await.map_err(classify)?;
        }

        sqlx::query("UPDATE items SET stock_level = $2, updated_at = NOW() WHERE sku = $1")
            .bind(sku.as_str()).bind(replacement.total_stock)
            .execute(&mut *tx).await.map_err(classify)?;

        tx.commit().await.map_err(classify)?;
        tracing::debug!(%sku, removed_sizes, removed_colors, removed_combinations, "variant rows replaced");
        Ok(ReplaceOutcome { previous_total_stock, removed_sizes, removed_colors, removed_combinations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_pool_timeout_is_retryable() {
        assert!(matches!(classify(sqlx::Error::PoolTimedOut), StoreError::LockTimeout));
        assert!(matches!(classify(sqlx::Error::RowNotFound), StoreError::Database(_)));
    }

    #[test]
    fn test_negative_stock_row_is_corruption() {
        let row = CombinationRow { size_id: Uuid::now_v7(), color_id: Uuid::now_v7(), stock_level: -1 };
        assert!(matches!(Combination::try_from(row), Err(StoreError::DataCorruption(_))));
    }
}
