//! Canonical size-major proposals and the read-only restructured view.

use rust_decimal::Decimal;
use serde::Serialize;

use super::analyzer::StructureReport;
use crate::domain::aggregates::{SizeGroup, VariantSnapshot};
use crate::domain::value_objects::{ColorId, SizeId, StockLevel};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProposedColor {
    pub id: ColorId,
    pub color_name: String,
    pub color_code: Option<String>,
    pub stock_level: StockLevel,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProposedSize {
    pub id: SizeId,
    pub code: String,
    pub name: String,
    pub price_adjustment: Decimal,
    pub colors: Vec<ProposedColor>,
    pub size_total_stock: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ColorSwatch { pub name: String, pub code: Option<String> }

/// Size-major view offered before a migration. Never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub proposed_sizes: Vec<ProposedSize>,
    pub all_colors: Vec<ColorSwatch>,
    pub total_combinations: usize,
    pub already_canonical: bool,
    pub message: String,
}

impl From<SizeGroup> for ProposedSize {
    fn from(group: SizeGroup) -> Self {
        let size_total_stock = group.total_stock();
        Self {
            id: group.size.id,
            code: group.size.code,
            name: group.size.name,
            price_adjustment: group.size.price_adjustment,
            colors: group.colors.into_iter().map(|c| ProposedColor {
                id: c.color.id,
                color_name: c.color.color_name,
                color_code: c.color.color_code,
                stock_level: c.stock_level,
            }).collect(),
            size_total_stock,
        }
    }
}

pub fn build_proposal(snapshot: &VariantSnapshot, report: &StructureReport) -> Proposal {
    let proposed_sizes: Vec<ProposedSize> = snapshot.size_major().into_iter().map(Into::into).collect();
    let all_colors: Vec<ColorSwatch> = snapshot.distinct_colors().into_iter()
        .map(|c| ColorSwatch { name: c.color_name.clone(), code: c.color_code.clone() })
        .collect();
    let total_combinations = proposed_sizes.iter().map(|s| s.colors.len()).sum();
    let already_canonical = report.is_canonical();
    let summary = format!("{} sizes with {} colors = {total_combinations} combinations", proposed_sizes.len(), all_colors.len());
    let message = if already_canonical {
        format!("Hierarchy is CORRECT: {summary}")
    } else {
        format!("Restructure recommended: {summary}")
    };
    Proposal { proposed_sizes, all_colors, total_combinations, already_canonical, message }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ViewColor { pub color_name: String, pub color_code: Option<String>, pub stock_level: StockLevel }

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ViewSize {
    pub size_code: String,
    pub size_name: String,
    pub price_adjustment: Decimal,
    pub colors: Vec<ViewColor>,
    pub total_stock: i64,
}

/// Persisted combinations grouped by size; sizes without stock records are left out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RestructuredView {
    pub item_sku: String,
    pub structure: Vec<ViewSize>,
    pub total_combinations: usize,
}

pub fn build_view(snapshot: &VariantSnapshot) -> RestructuredView {
    let structure: Vec<ViewSize> = if snapshot.combinations.is_empty() {
        vec![]
    } else {
        snapshot.size_major().into_iter()
            .filter(|g| !g.colors.is_empty())
            .map(|g| ViewSize {
                total_stock: g.total_stock(),
                size_code: g.size.code,
                size_name: g.size.name,
                price_adjustment: g.size.price_adjustment,
                colors: g.colors.into_iter().map(|c| ViewColor {
                    color_name: c.color.color_name, color_code: c.color.color_code, stock_level: c.stock_level,
                }).collect(),
            })
            .collect()
    };
    let total_combinations = structure.iter().map(|s| s.colors.len()).sum();
    RestructuredView { item_sku: snapshot.item.sku.to_string(), structure, total_combinations }
}
