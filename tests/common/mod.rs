//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use variant_engine::domain::aggregates::{Color, Combination, Item, Size, VariantSnapshot};
use variant_engine::domain::value_objects::Sku;
use variant_engine::{EngineConfig, MemoryStore, VariantEngine};

pub const SKU: &str = "WF-TS-002";

pub fn sku() -> Sku { Sku::new(SKU).unwrap() }

/// Sizes S, M, L; S carries Red 5 and Blue 3; M and L have no combinations.
pub fn partially_stocked() -> VariantSnapshot {
    let red = Color::new("Red").with_code("#ff0000").with_order(1);
    let blue = Color::new("Blue").with_code("#0000ff").with_order(2);
    let s = Size::new("S", "Small").with_order(1);
    let m = Size::new("M", "Medium").with_order(2);
    let l = Size::new("L", "Large").with_order(3);
    VariantSnapshot {
        item: Item::new(sku(), "Wolf Tee", 8),
        combinations: vec![Combination::new(s.id, red.id, 5), Combination::new(s.id, blue.id, 3)],
        sizes: vec![s, m, l],
        colors: vec![red, blue],
    }
}

/// Colors own their sizes: Red -> {S: 5, M: 2}, Blue -> {S: 3}.
pub fn backwards() -> VariantSnapshot {
    let red = Color::new("Red").with_order(1);
    let blue = Color::new("Blue").with_order(2);
    let red_s = Size::new("S", "Small").with_order(1).nested_under(red.id);
    let red_m = Size::new("M", "Medium").with_order(2).nested_under(red.id);
    let blue_s = Size::new("S", "Small").with_order(1).nested_under(blue.id);
    VariantSnapshot {
        item: Item::new(sku(), "Wolf Tee", 10),
        combinations: vec![
            Combination::new(red_s.id, red.id, 5),
            Combination::new(red_m.id, red.id, 2),
            Combination::new(blue_s.id, blue.id, 3),
        ],
        sizes: vec![red_s, red_m, blue_s],
        colors: vec![red, blue],
    }
}

/// `partially_stocked` plus a second (S, Red) record holding 3.
pub fn with_duplicate() -> VariantSnapshot {
    let mut snapshot = partially_stocked();
    let (s, red) = (snapshot.sizes[0].id, snapshot.colors[0].id);
    snapshot.combinations.push(Combination::new(s, red, 3));
    snapshot.item.stock_level = 11;
    snapshot
}

pub fn engine_with(snapshots: impl IntoIterator<Item = VariantSnapshot>) -> (Arc<MemoryStore>, VariantEngine) {
    engine_with_config(snapshots, EngineConfig::default(), Duration::from_millis(200))
}

pub fn engine_with_config(
    snapshots: impl IntoIterator<Item = VariantSnapshot>,
    config: EngineConfig,
    lock_timeout: Duration,
) -> (Arc<MemoryStore>, VariantEngine) {
    let store = Arc::new(MemoryStore::with_items(lock_timeout, snapshots));
    let engine = VariantEngine::new(store.clone(), config);
    (store, engine)
}
