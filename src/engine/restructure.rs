//! Migration to the canonical structure: input validation, replacement
//! planning and the stock-preservation check.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::domain::aggregates::{Color, Combination, Size, VariantSnapshot};
use crate::domain::value_objects::{ColorId, SizeId, StockLevel};
use crate::store::Replacement;
use crate::VariantError;

#[derive(Clone, Debug, Deserialize)]
pub struct ColorInput {
    #[serde(alias = "color_name")]
    pub color: String,
    #[serde(default)]
    pub color_code: Option<String>,
    /// Raw JSON so non-integers surface as `InvalidStock` rather than a decode failure.
    #[serde(default)]
    pub stock_level: serde_json::Value,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SizeInput {
    #[serde(alias = "size_code")]
    pub size: String,
    #[serde(default)]
    pub size_name: Option<String>,
    #[serde(default)]
    pub price_adjustment: Option<Decimal>,
    #[serde(default)]
    pub colors: Vec<ColorInput>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MigrationRequest {
    #[serde(default, alias = "structure")]
    pub new_structure: Vec<SizeInput>,
    #[serde(default = "default_true")]
    pub preserve_stock: bool,
    #[serde(default)]
    pub dry_run: bool,
}

fn default_true() -> bool { true }

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidColor { pub name: String, pub code: Option<String>, pub stock: StockLevel }

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidSize { pub code: String, pub name: String, pub price_adjustment: Option<Decimal>, pub colors: Vec<ValidColor> }

/// Validate the requested structure before anything is written.
///
/// Entries repeating a size code are merged into the first one; the pair
/// (size code, color name) must still be unique across the whole input.
pub fn validate(input: &[SizeInput]) -> Result<Vec<ValidSize>, VariantError> {
    if input.is_empty() {
        return Err(VariantError::EmptyStructure { detail: "new structure has no sizes".to_string(), size_code: None });
    }
    let mut sizes: Vec<ValidSize> = Vec::new();
    let mut index_by_code: HashMap<String, usize> = HashMap::new();
    let mut pairs: HashSet<(String, String)> = HashSet::new();

    for entry in input {
        let code = entry.size.trim();
        if code.is_empty() {
            return Err(VariantError::EmptyStructure { detail: "size code is empty".to_string(), size_code: None });
        }
        if entry.colors.is_empty() {
            return Err(VariantError::EmptyStructure { detail: format!("size {code} has no colors"), size_code: Some(code.to_string()) });
        }
        if let Some(price) = entry.price_adjustment {
            check_price_adjustment(code, price)?;
        }
        let idx = *index_by_code.entry(code.to_string()).or_insert_with(|| {
            sizes.push(ValidSize {
                code: code.to_string(),
                name: entry.size_name.as_deref().map(str::trim).filter(|n| !n.is_empty()).unwrap_or(code).to_string(),
                price_adjustment: entry.price_adjustment,
                colors: vec![],
            });
            sizes.len() - 1
        });

        for color in &entry.colors {
            let name = color.color.trim();
            if name.is_empty() {
                return Err(VariantError::EmptyStructure { detail: format!("size {code} has a color without a name"), size_code: Some(code.to_string()) });
            }
            let stock = StockLevel::from_json(&color.stock_level).map_err(|e| VariantError::InvalidStock {
                size_code: code.to_string(), color_name: name.to_string(), reason: e.to_string(),
            })?;
            if !pairs.insert((code.to_string(), name.to_string())) {
                return Err(VariantError::DuplicateCombination { size_code: code.to_string(), color_name: name.to_string() });
            }
            sizes[idx].colors.push(ValidColor {
                name: name.to_string(),
                code: color.color_code.as_deref().map(str::trim).filter(|c| !c.is_empty()).map(str::to_string),
                stock,
            });
        }
    }
    Ok(sizes)
}

/// Scale and precision of the `NUMERIC(10, 2)` column.
const PRICE_SCALE: u32 = 2;
const PRICE_MAX_UNITS: i64 = 9_999_999_999;

fn check_price_adjustment(code: &str, price: Decimal) -> Result<(), VariantError> {
    if price.normalize().scale() > PRICE_SCALE {
        return Err(VariantError::InvalidRequest(format!(
            "price_adjustment for size {code} has more than {PRICE_SCALE} decimal places"
        )));
    }
    if price.abs() > Decimal::new(PRICE_MAX_UNITS, PRICE_SCALE) {
        return Err(VariantError::InvalidRequest(format!("price_adjustment for size {code} is out of range")));
    }
    Ok(())
}

/// Build the full replacement, reusing ids of existing sizes (by code) and
/// colors (by name). Item-level size records win over legacy nested ones.
pub fn plan_replacement(snapshot: &VariantSnapshot, structure: &[ValidSize]) -> Replacement {
    let mut existing_sizes: HashMap<&str, &Size> = HashMap::new();
    for size in snapshot.sizes.iter().filter(|s| !s.is_nested()).chain(snapshot.sizes.iter().filter(|s| s.is_nested())) {
        existing_sizes.entry(size.code.as_str()).or_insert(size);
    }
    let mut existing_colors: HashMap<&str, &Color> = HashMap::new();
    for color in &snapshot.colors {
        existing_colors.entry(color.color_name.as_str()).or_insert(color);
    }

    let mut colors: Vec<Color> = Vec::new();
    let mut color_ids: HashMap<&str, ColorId> = HashMap::new();
    for valid in structure.iter().flat_map(|s| &s.colors) {
        if color_ids.contains_key(valid.name.as_str()) { continue; }
        let existing = existing_colors.get(valid.name.as_str());
        let color = Color {
            id: existing.map_or_else(ColorId::generate, |c| c.id),
            color_name: valid.name.clone(),
            color_code: valid.code.clone().or_else(|| existing.and_then(|c| c.color_code.clone())),
            display_order: i32::try_from(colors.len() + 1).unwrap_or(i32::MAX),
        };
        color_ids.insert(valid.name.as_str(), color.id);
        colors.push(color);
    }

    let mut sizes = Vec::with_capacity(structure.len());
    let mut combinations = Vec::new();
    let mut total_stock = 0i64;
    for (position, valid) in structure.iter().enumerate() {
        let existing = existing_sizes.get(valid.code.as_str());
        let size = Size {
            id: existing.map_or_else(SizeId::generate, |s| s.id),
            code: valid.code.clone(),
            name: valid.name.clone(),
            price_adjustment: valid.price_adjustment
                .or_else(|| existing.map(|s| s.price_adjustment))
                .unwrap_or(Decimal::ZERO),
            display_order: i32::try_from(position + 1).unwrap_or(i32::MAX),
            parent_color_id: None,
        };
        for color in &valid.colors {
            // Every color name was registered above.
            let Some(&color_id) = color_ids.get(color.name.as_str()) else { continue };
            combinations.push(Combination { size_id: size.id, color_id, stock_level: color.stock });
            total_stock += i64::from(color.stock.value());
        }
        sizes.push(size);
    }
    Replacement { sizes, colors, combinations, total_stock }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel { Warning }

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MigrationNotice { pub level: NoticeLevel, pub code: &'static str, pub message: String }

/// Flag a stock total that moved further than `tolerance` units.
pub fn stock_notice(previous: i64, new: i64, tolerance: u64) -> Option<MigrationNotice> {
    let difference = new.abs_diff(previous);
    (difference > tolerance).then(|| MigrationNotice {
        level: NoticeLevel::Warning,
        code: "stock_not_preserved",
        message: format!("Total stock changed from {previous} to {new} (difference {difference} exceeds tolerance {tolerance})"),
    })
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MigrationResult {
    pub created_sizes: usize,
    pub created_colors: usize,
    pub created_combinations: usize,
    pub previous_total_stock: i64,
    pub new_total_stock: i64,
    pub dry_run: bool,
    pub errors: Vec<MigrationNotice>,
}
