//! Variant hierarchy engine.
//!
//! Every operation reads a fresh snapshot from the store; nothing is cached
//! between requests. Only `migrate` writes, and it writes through a single
//! `VariantStore::replace_all` call.

pub mod analyzer;
pub mod proposal;
pub mod restructure;

use std::sync::Arc;

use tracing::instrument;

use crate::domain::aggregates::VariantSnapshot;
use crate::domain::value_objects::Sku;
use crate::store::{StoreError, VariantStore};
use crate::{Result, VariantError};

pub use analyzer::{Issue, IssueKind, Orientation, Severity, StructureReport};
pub use proposal::{Proposal, RestructuredView};
pub use restructure::{MigrationNotice, MigrationRequest, MigrationResult, SizeInput};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Allowed absolute stock difference before a migration records a warning.
    pub stock_tolerance: u64,
}

#[derive(Clone)]
pub struct VariantEngine {
    store: Arc<dyn VariantStore>,
    config: EngineConfig,
}

impl VariantEngine {
    pub fn new(store: Arc<dyn VariantStore>, config: EngineConfig) -> Self { Self { store, config } }

    #[instrument(skip(self, sku), fields(sku = %sku))]
    pub async fn analyze(&self, sku: &Sku) -> Result<StructureReport> {
        let snapshot = self.snapshot(sku).await?;
        let report = analyzer::analyze_snapshot(&snapshot);
        tracing::debug!(orientation = ?report.orientation, issues = report.issues.len(), "structure analyzed");
        Ok(report)
    }

    #[instrument(skip(self, sku), fields(sku = %sku))]
    pub async fn check_if_backwards(&self, sku: &Sku) -> Result<bool> {
        let snapshot = self.snapshot(sku).await?;
        Ok(analyzer::classify_orientation(&snapshot) != Orientation::Canonical)
    }

    #[instrument(skip(self, sku), fields(sku = %sku))]
    pub async fn propose(&self, sku: &Sku) -> Result<Proposal> {
        let snapshot = self.snapshot(sku).await?;
        let report = analyzer::analyze_snapshot(&snapshot);
        Ok(proposal::build_proposal(&snapshot, &report))
    }

    #[instrument(skip(self, sku), fields(sku = %sku))]
    pub async fn restructured_view(&self, sku: &Sku) -> Result<RestructuredView> {
        let snapshot = self.snapshot(sku).await?;
        Ok(proposal::build_view(&snapshot))
    }

    /// Validate `request` and atomically replace the item's variants.
    ///
    /// Validation failures return before any write. A dry run stops after
    /// planning and reports what would have been written.
    #[instrument(skip(self, sku, request), fields(sku = %sku, sizes = request.new_structure.len(), dry_run = request.dry_run))]
    pub async fn migrate(&self, sku: &Sku, request: &MigrationRequest) -> Result<MigrationResult> {
        let structure = restructure::validate(&request.new_structure)?;
        let snapshot = self.snapshot(sku).await?;
        let replacement = restructure::plan_replacement(&snapshot, &structure);

        let previous_total_stock = if request.dry_run {
            snapshot.raw_total_stock()
        } else {
            let outcome = self.store.replace_all(sku, &replacement).await.map_err(|e| store_error(sku, e))?;
            tracing::info!(
                removed_sizes = outcome.removed_sizes,
                removed_colors = outcome.removed_colors,
                removed_combinations = outcome.removed_combinations,
                created_combinations = replacement.combinations.len(),
                new_total_stock = replacement.total_stock,
                "variant structure migrated"
            );
            outcome.previous_total_stock
        };

        let mut errors = Vec::new();
        if request.preserve_stock {
            if let Some(notice) = restructure::stock_notice(previous_total_stock, replacement.total_stock, self.config.stock_tolerance) {
                tracing::warn!(previous_total_stock, new_total_stock = replacement.total_stock, "{}", notice.message);
                errors.push(notice);
            }
        }

        Ok(MigrationResult {
            created_sizes: replacement.sizes.len(),
            created_colors: replacement.colors.len(),
            created_combinations: replacement.combinations.len(),
            previous_total_stock,
            new_total_stock: replacement.total_stock,
            dry_run: request.dry_run,
            errors,
        })
    }

    async fn snapshot(&self, sku: &Sku) -> Result<VariantSnapshot> {
        self.store.load_snapshot(sku).await
            .map_err(|e| store_error(sku, e))?
            .ok_or_else(|| VariantError::NotFound(sku.to_string()))
    }
}

fn store_error(sku: &Sku, err: StoreError) -> VariantError {
    match err {
        StoreError::ItemNotFound => VariantError::NotFound(sku.to_string()),
        StoreError::LockTimeout | StoreError::Conflict(_) => {
            tracing::warn!(%sku, error = %err, "variant write contended");
            VariantError::ConcurrentModification
        }
        StoreError::Database(_) | StoreError::DataCorruption(_) | StoreError::Backend(_) => {
            tracing::error!(%sku, error = %err, "variant store failure");
            VariantError::PersistenceFailed
        }
    }
}
