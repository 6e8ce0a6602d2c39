//! Variant persistence.
//!
//! `VariantStore` owns the size, color and combination rows of each item.
//! It carries no policy: the engine decides what to write, the store makes
//! the write atomic.
//!
//! # Tables
//!
//! - `items` - catalog items (only `stock_level` is written here)
//! - `item_sizes` - sizes, optionally nested under a color (legacy shape)
//! - `item_colors` - colors
//! - `item_variant_stock` - size x color stock combinations

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::aggregates::{Color, Combination, Item, Size, VariantSnapshot};
use crate::domain::value_objects::Sku;

pub use memory::MemoryStore;
pub use postgres::PgVariantStore;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored data violates a domain invariant.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Non-sqlx backend failure.
    #[error("backend error: {0}")]
    Backend(String),

    /// The item row does not exist.
    #[error("item not found")]
    ItemNotFound,

    /// The item lock could not be acquired in time.
    #[error("timed out waiting for item lock")]
    LockTimeout,

    /// A concurrent writer won (serialization failure, deadlock).
    #[error("conflict: {0}")]
    Conflict(String),
}

/// The complete variant set written by `replace_all`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Replacement {
    pub sizes: Vec<Size>,
    pub colors: Vec<Color>,
    pub combinations: Vec<Combination>,
    /// New aggregate stock for the item row.
    pub total_stock: i64,
}

/// What `replace_all` observed while holding the item lock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplaceOutcome {
    pub previous_total_stock: i64,
    pub removed_sizes: u64,
    pub removed_colors: u64,
    pub removed_combinations: u64,
}

#[async_trait]
pub trait VariantStore: Send + Sync {
    async fn load_item(&self, sku: &Sku) -> Result<Option<Item>, StoreError>;

    async fn load_sizes(&self, sku: &Sku) -> Result<Vec<Size>, StoreError>;

    async fn load_colors(&self, sku: &Sku) -> Result<Vec<Color>, StoreError>;

    async fn load_combinations(&self, sku: &Sku) -> Result<Vec<Combination>, StoreError>;

    /// Item plus all variant rows from one consistent read.
    ///
    /// Returns `None` for an unknown SKU. An item with no variants yields
    /// empty collections.
    async fn load_snapshot(&self, sku: &Sku) -> Result<Option<VariantSnapshot>, StoreError>;

    /// Atomically replace every size, color and combination of the item and
    /// set its aggregate stock.
    ///
    /// Writers on the same SKU are serialized; a writer that cannot take the
    /// item lock within the configured timeout fails with
    /// `StoreError::LockTimeout` and leaves the item untouched.
    async fn replace_all(&self, sku: &Sku, replacement: &Replacement) -> Result<ReplaceOutcome, StoreError>;
}
