//! Engine behaviour against the in-memory store.

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use variant_engine::domain::aggregates::{Color, Combination};
use variant_engine::domain::value_objects::Sku;
use variant_engine::engine::{IssueKind, MigrationRequest, Orientation, Severity};
use variant_engine::{EngineConfig, VariantError, VariantStore};

use common::*;

fn request(value: serde_json::Value) -> MigrationRequest { serde_json::from_value(value).unwrap() }

fn s_red_blue() -> MigrationRequest {
    request(json!({
        "new_structure": [{"size": "S", "colors": [{"color": "Red", "stock_level": 5}, {"color": "Blue", "stock_level": 3}]}],
        "preserve_stock": true
    }))
}

#[tokio::test]
async fn test_propose_partially_stocked_item() {
    let (_, engine) = engine_with([partially_stocked()]);
    let proposal = engine.propose(&sku()).await.unwrap();

    assert_eq!(proposal.total_combinations, 2);
    let totals: Vec<_> = proposal.proposed_sizes.iter().map(|s| (s.code.as_str(), s.size_total_stock)).collect();
    assert_eq!(totals, vec![("S", 8), ("M", 0), ("L", 0)]);
}

#[tokio::test]
async fn test_analyze_reports_duplicate_as_high() {
    let (_, engine) = engine_with([with_duplicate()]);
    let report = engine.analyze(&sku()).await.unwrap();

    let duplicates: Vec<_> = report.issues.iter().filter(|i| i.kind == IssueKind::DuplicateCombination).collect();
    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[0].severity, Severity::High);
    assert!(!report.recommendations.is_empty());
}

#[tokio::test]
async fn test_same_named_color_rows_surface_as_duplicate() {
    let mut snapshot = partially_stocked();
    let s = snapshot.sizes[0].id;
    let second_red = Color::new("Red").with_order(3);
    snapshot.combinations.push(Combination::new(s, second_red.id, 3));
    snapshot.colors.push(second_red);
    snapshot.item.stock_level = 11;
    let (_, engine) = engine_with([snapshot]);

    let report = engine.analyze(&sku()).await.unwrap();
    assert!(report.has(IssueKind::DuplicateCombination));
    let proposal = engine.propose(&sku()).await.unwrap();
    assert!(!proposal.already_canonical);
}

#[tokio::test]
async fn test_analyze_is_idempotent() {
    let (_, engine) = engine_with([with_duplicate()]);
    let first = engine.analyze(&sku()).await.unwrap();
    let second = engine.analyze(&sku()).await.unwrap();
    assert_eq!(serde_json::to_value(&first).unwrap(), serde_json::to_value(&second).unwrap());
}

#[tokio::test]
async fn test_migrate_preserves_stock_without_warnings() {
    let (store, engine) = engine_with([partially_stocked()]);
    let result = engine.migrate(&sku(), &s_red_blue()).await.unwrap();

    assert_eq!(result.previous_total_stock, 8);
    assert_eq!(result.new_total_stock, 8);
    assert_eq!(result.created_combinations, 2);
    assert!(result.errors.is_empty());
    assert!(!result.dry_run);

    let item = store.load_item(&sku()).await.unwrap().unwrap();
    assert_eq!(item.stock_level, 8);
    assert_eq!(store.load_sizes(&sku()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_migrate_empty_colors_writes_nothing() {
    let (store, engine) = engine_with([partially_stocked()]);
    let before = store.load_snapshot(&sku()).await.unwrap();

    let err = engine.migrate(&sku(), &request(json!({"new_structure": [{"size": "S", "colors": []}]}))).await.unwrap_err();
    assert!(matches!(err, VariantError::EmptyStructure { ref size_code, .. } if size_code.as_deref() == Some("S")));
    assert_eq!(store.load_snapshot(&sku()).await.unwrap(), before);
}

#[tokio::test]
async fn test_migrate_rejects_invalid_stock_before_writing() {
    let (store, engine) = engine_with([partially_stocked()]);
    let before = store.load_combinations(&sku()).await.unwrap();

    for stock in [json!(-1), json!(2.5), json!("5")] {
        let req = request(json!({"new_structure": [{"size": "S", "colors": [{"color": "Red", "stock_level": stock}]}]}));
        let err = engine.migrate(&sku(), &req).await.unwrap_err();
        assert!(matches!(err, VariantError::InvalidStock { .. }), "{stock}: {err:?}");
    }
    assert_eq!(store.load_combinations(&sku()).await.unwrap(), before);
}

#[tokio::test]
async fn test_migrate_rejects_duplicate_pair_across_merged_sizes() {
    let (_, engine) = engine_with([partially_stocked()]);
    let req = request(json!({"new_structure": [
        {"size": "S", "colors": [{"color": "Red", "stock_level": 1}]},
        {"size": "S", "colors": [{"color": "Red", "stock_level": 2}]}
    ]}));
    let err = engine.migrate(&sku(), &req).await.unwrap_err();
    assert_eq!(err.offending_pair(), (Some("S"), Some("Red")));
}

#[tokio::test]
async fn test_failed_write_leaves_state_intact() {
    let (store, engine) = engine_with([with_duplicate()]);
    let before = store.load_snapshot(&sku()).await.unwrap();
    store.fail_writes(true);

    let err = engine.migrate(&sku(), &s_red_blue()).await.unwrap_err();
    assert!(matches!(err, VariantError::PersistenceFailed));
    assert!(err.is_retryable());
    assert_eq!(store.load_snapshot(&sku()).await.unwrap(), before);
}

#[tokio::test]
async fn test_migration_removes_duplicates_and_becomes_canonical() {
    let (store, engine) = engine_with([with_duplicate()]);
    let result = engine.migrate(&sku(), &s_red_blue()).await.unwrap();
    assert_eq!(result.previous_total_stock, 11);
    assert_eq!(result.new_total_stock, 8);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code, "stock_not_preserved");

    let combinations = store.load_combinations(&sku()).await.unwrap();
    let pairs: HashSet<_> = combinations.iter().map(|c| (c.size_id, c.color_id)).collect();
    assert_eq!(pairs.len(), combinations.len());

    let report = engine.analyze(&sku()).await.unwrap();
    assert!(report.issues.is_empty(), "{:?}", report.issues);
    assert!(!engine.check_if_backwards(&sku()).await.unwrap());
}

#[tokio::test]
async fn test_stock_warning_respects_tolerance() {
    let config = EngineConfig { stock_tolerance: 3 };
    let (_, engine) = engine_with_config([with_duplicate()], config, Duration::from_millis(200));
    let result = engine.migrate(&sku(), &s_red_blue()).await.unwrap();
    assert!(result.errors.is_empty());

    let (_, engine) = engine_with([with_duplicate()]);
    let mut req = s_red_blue();
    req.preserve_stock = false;
    assert!(engine.migrate(&sku(), &req).await.unwrap().errors.is_empty());
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let (store, engine) = engine_with([backwards()]);
    let before = store.load_snapshot(&sku()).await.unwrap();
    let mut req = s_red_blue();
    req.dry_run = true;

    let result = engine.migrate(&sku(), &req).await.unwrap();
    assert!(result.dry_run);
    assert_eq!(result.previous_total_stock, 10);
    assert_eq!(result.created_combinations, 2);
    assert_eq!(store.load_snapshot(&sku()).await.unwrap(), before);
}

#[tokio::test]
async fn test_backwards_detection_and_fix() {
    let (_, engine) = engine_with([backwards(), {
        let mut other = partially_stocked();
        other.item.sku = Sku::new("WF-TS-003").unwrap();
        other
    }]);
    assert!(engine.check_if_backwards(&sku()).await.unwrap());
    assert_eq!(engine.analyze(&sku()).await.unwrap().orientation, Orientation::Backwards);
    assert!(!engine.check_if_backwards(&Sku::new("WF-TS-003").unwrap()).await.unwrap());

    let proposal = engine.propose(&sku()).await.unwrap();
    assert!(!proposal.already_canonical);
    let codes: Vec<_> = proposal.proposed_sizes.iter().map(|s| s.code.as_str()).collect();
    assert_eq!(codes, vec!["S", "M"]);
    assert_eq!(proposal.proposed_sizes[0].size_total_stock, 8);
    assert_eq!(proposal.total_combinations, 3);

    let req = request(json!({"new_structure": [
        {"size": "S", "colors": [{"color": "Red", "stock_level": 5}, {"color": "Blue", "stock_level": 3}]},
        {"size": "M", "colors": [{"color": "Red", "stock_level": 2}]}
    ]}));
    let result = engine.migrate(&sku(), &req).await.unwrap();
    assert_eq!((result.previous_total_stock, result.new_total_stock), (10, 10));
    assert!(!engine.check_if_backwards(&sku()).await.unwrap());
}

#[tokio::test]
async fn test_unknown_sku_is_not_found() {
    let (_, engine) = engine_with([partially_stocked()]);
    let missing = Sku::new("MISSING").unwrap();
    assert!(matches!(engine.analyze(&missing).await, Err(VariantError::NotFound(_))));
    assert!(matches!(engine.propose(&missing).await, Err(VariantError::NotFound(_))));
    assert!(matches!(engine.migrate(&missing, &s_red_blue()).await, Err(VariantError::NotFound(_))));
}

#[tokio::test]
async fn test_concurrent_migrations_serialize() {
    let (store, engine) = engine_with([partially_stocked()]);
    let first = s_red_blue();
    let second = request(json!({"new_structure": [{"size": "M", "colors": [{"color": "Green", "stock_level": 4}]}]}));

    let sku = sku();
    let (a, b) = tokio::join!(engine.migrate(&sku, &first), engine.migrate(&sku, &second));
    let (a, b) = (a.unwrap(), b.unwrap());
    // The later writer reports the earlier writer's total as its previous stock.
    let totals = (a.previous_total_stock, b.previous_total_stock);
    assert!(totals == (8, 8) || totals == (4, 8), "{totals:?}");
    let sizes = store.load_sizes(&sku).await.unwrap();
    assert_eq!(sizes.len(), 1);
    let combinations = store.load_combinations(&sku).await.unwrap();
    assert!(combinations.len() == 1 || combinations.len() == 2);
}

#[tokio::test]
async fn test_held_lock_reports_concurrent_modification() {
    let (store, engine) = engine_with_config([partially_stocked()], EngineConfig::default(), Duration::from_millis(20));
    let holder = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.hold_write_lock(Duration::from_millis(300)).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = engine.migrate(&sku(), &s_red_blue()).await;
    holder.await.unwrap();
    match err {
        Err(VariantError::ConcurrentModification) => {}
        other => panic!("expected ConcurrentModification, got {other:?}"),
    }
}
