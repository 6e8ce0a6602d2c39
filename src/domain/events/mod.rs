//! Domain events
use chrono::{DateTime, Utc};
use serde::Serialize;
use crate::domain::value_objects::Sku;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VariantEvent {
    Migrated { sku: Sku, created_combinations: usize, new_total_stock: i64, occurred_at: DateTime<Utc> },
}

impl VariantEvent {
    pub fn migrated(sku: Sku, created_combinations: usize, new_total_stock: i64) -> Self {
        Self::Migrated { sku, created_combinations, new_total_stock, occurred_at: Utc::now() }
    }

    pub fn subject(&self) -> &'static str {
        match self { Self::Migrated { .. } => "variants.migrated" }
    }
}
