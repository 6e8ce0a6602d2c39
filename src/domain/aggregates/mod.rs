//! Aggregates module
pub mod variant;

pub use variant::{Color, ColorStock, Combination, Item, Size, SizeGroup, VariantSnapshot};
