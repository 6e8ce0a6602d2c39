//! Variant Engine
//!
//! Size/color variant hierarchy analysis and restructuring for catalog items.
//!
//! ## Features
//! - Orientation classification (size-major, legacy color-major, mixed)
//! - Structural issue detection with fixed recommendations
//! - Canonical size-major proposals
//! - Atomic, validated migration to the canonical structure

pub mod api;
pub mod config;
pub mod domain;
pub mod engine;
pub mod store;

pub use config::Config;
pub use engine::{EngineConfig, VariantEngine};
pub use store::{MemoryStore, PgVariantStore, StoreError, VariantStore};

use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum VariantError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Empty structure: {detail}")]
    EmptyStructure { detail: String, size_code: Option<String> },

    #[error("Duplicate combination: size {size_code}, color {color_name}")]
    DuplicateCombination { size_code: String, color_name: String },

    #[error("Invalid stock level for size {size_code}, color {color_name}: {reason}")]
    InvalidStock { size_code: String, color_name: String, reason: String },

    #[error("Persistence failed, no changes were made")]
    PersistenceFailed,

    #[error("Item is being modified by another request, retry later")]
    ConcurrentModification,
}

impl VariantError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidRequest(_) => "invalid_request",
            Self::EmptyStructure { .. } => "empty_structure",
            Self::DuplicateCombination { .. } => "duplicate_combination",
            Self::InvalidStock { .. } => "invalid_stock",
            Self::PersistenceFailed => "persistence_failed",
            Self::ConcurrentModification => "concurrent_modification",
        }
    }

    /// The offending (size, color) pair, when the error names one.
    pub fn offending_pair(&self) -> (Option<&str>, Option<&str>) {
        match self {
            Self::EmptyStructure { size_code, .. } => (size_code.as_deref(), None),
            Self::DuplicateCombination { size_code, color_name } | Self::InvalidStock { size_code, color_name, .. } => {
                (Some(size_code), Some(color_name))
            }
            _ => (None, None),
        }
    }

    pub fn is_retryable(&self) -> bool { matches!(self, Self::PersistenceFailed | Self::ConcurrentModification) }
}

pub type Result<T> = std::result::Result<T, VariantError>;
