//! In-process `VariantStore` with the same atomicity contract as Postgres.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ReplaceOutcome, Replacement, StoreError, VariantStore};
use crate::domain::aggregates::{Color, Combination, Item, Size, VariantSnapshot};
use crate::domain::value_objects::Sku;

/// Items keyed by SKU behind one lock. Writes build the new state and swap it
/// in while holding the write guard, so readers see either side of a
/// replacement and never a mix.
pub struct MemoryStore {
    items: RwLock<HashMap<Sku, VariantSnapshot>>,
    lock_timeout: Duration,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self { items: RwLock::new(HashMap::new()), lock_timeout, fail_writes: AtomicBool::new(false) }
    }

    pub fn with_items(lock_timeout: Duration, snapshots: impl IntoIterator<Item = VariantSnapshot>) -> Self {
        let items = snapshots.into_iter().map(|s| (s.item.sku.clone(), s)).collect();
        Self { items: RwLock::new(items), lock_timeout, fail_writes: AtomicBool::new(false) }
    }

    /// Make every following `replace_all` fail as a backend error.
    pub fn fail_writes(&self, fail: bool) { self.fail_writes.store(fail, Ordering::SeqCst); }

    /// Hold the write lock for `hold`, simulating a long-running writer.
    pub async fn hold_write_lock(&self, hold: Duration) {
        let _guard = self.items.write().await;
        tokio::time::sleep(hold).await;
    }

    /// Reads wait on a writer no longer than writes wait on each other.
    async fn read<T>(&self, sku: &Sku, f: impl FnOnce(&VariantSnapshot) -> T) -> Result<Option<T>, StoreError> {
        let items = tokio::time::timeout(self.lock_timeout, self.items.read())
            .await
            .map_err(|_| StoreError::LockTimeout)?;
        Ok(items.get(sku).map(f))
    }
}

#[async_trait]
impl VariantStore for MemoryStore {
    async fn load_item(&self, sku: &Sku) -> Result<Option<Item>, StoreError> {
        self.read(sku, |s| s.item.clone()).await
    }

    async fn load_sizes(&self, sku: &Sku) -> Result<Vec<Size>, StoreError> {
        Ok(self.read(sku, |s| s.sizes.clone()).await?.unwrap_or_default())
    }

    async fn load_colors(&self, sku: &Sku) -> Result<Vec<Color>, StoreError> {
        Ok(self.read(sku, |s| s.colors.clone()).await?.unwrap_or_default())
    }

    async fn load_combinations(&self, sku: &Sku) -> Result<Vec<Combination>, StoreError> {
        Ok(self.read(sku, |s| s.combinations.clone()).await?.unwrap_or_default())
    }

    async fn load_snapshot(&self, sku: &Sku) -> Result<Option<VariantSnapshot>, StoreError> {
        self.read(sku, |s| s.clone()).await
    }

    async fn replace_all(&self, sku: &Sku, replacement: &Replacement) -> Result<ReplaceOutcome, StoreError> {
        let mut items = tokio::time::timeout(self.lock_timeout, self.items.write())
            .await
            .map_err(|_| StoreError::LockTimeout)?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("write rejected".to_string()));
        }
        let current = items.get_mut(sku).ok_or(StoreError::ItemNotFound)?;
        let outcome = ReplaceOutcome {
            previous_total_stock: current.raw_total_stock(),
            removed_sizes: current.sizes.len() as u64,
            removed_colors: current.colors.len() as u64,
            removed_combinations: current.combinations.len() as u64,
        };
        *current = VariantSnapshot {
            item: Item { stock_level: replacement.total_stock, ..current.item.clone() },
            sizes: replacement.sizes.clone(),
            colors: replacement.colors.clone(),
            combinations: replacement.combinations.clone(),
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn snapshot() -> VariantSnapshot {
        let red = Color::new("Red");
        let s = Size::new("S", "Small");
        VariantSnapshot {
            item: Item::new(Sku::new("WF-TS-002").unwrap(), "Tee", 5),
            combinations: vec![Combination::new(s.id, red.id, 5)],
            sizes: vec![s],
            colors: vec![red],
        }
    }

    #[tokio::test]
    async fn test_unknown_item_reads_empty() {
        let store = MemoryStore::new(Duration::from_millis(50));
        let sku = Sku::new("NOPE").unwrap();
        assert!(store.load_item(&sku).await.unwrap().is_none());
        assert!(store.load_sizes(&sku).await.unwrap().is_empty());
        assert!(store.load_snapshot(&sku).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_all_swaps_and_updates_item_stock() {
        let store = MemoryStore::with_items(Duration::from_millis(50), [snapshot()]);
        let sku = Sku::new("WF-TS-002").unwrap();
        let blue = Color::new("Blue");
        let m = Size::new("M", "Medium");
        let replacement = Replacement {
            combinations: vec![Combination::new(m.id, blue.id, 9)],
            sizes: vec![m],
            colors: vec![blue],
            total_stock: 9,
        };
        let outcome = store.replace_all(&sku, &replacement).await.unwrap();
        assert_eq!(outcome.previous_total_stock, 5);
        assert_eq!(outcome.removed_combinations, 1);
        let after = store.load_snapshot(&sku).await.unwrap().unwrap();
        assert_eq!(after.item.stock_level, 9);
        assert_eq!(after.sizes[0].code, "M");
    }

    #[tokio::test]
    async fn test_failed_write_leaves_state() {
        let store = MemoryStore::with_items(Duration::from_millis(50), [snapshot()]);
        let sku = Sku::new("WF-TS-002").unwrap();
        let before = store.load_combinations(&sku).await.unwrap();
        store.fail_writes(true);
        let err = store.replace_all(&sku, &Replacement::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
        assert_eq!(store.load_combinations(&sku).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_lock_timeout() {
        let store = Arc::new(MemoryStore::with_items(Duration::from_millis(20), [snapshot()]));
        let holder = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.hold_write_lock(Duration::from_millis(200)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let sku = Sku::new("WF-TS-002").unwrap();
        let err = store.replace_all(&sku, &Replacement::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::LockTimeout));
        assert!(matches!(store.load_snapshot(&sku).await, Err(StoreError::LockTimeout)));
        holder.await.unwrap();
    }
}
