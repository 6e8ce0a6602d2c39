//! Variant Aggregate
//!
//! An item's sizes, colors and the size x color stock combinations that join
//! them. Legacy data may nest sizes under a color (`parent_color_id`); every
//! read path folds both shapes into one size-major grouping.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use crate::domain::value_objects::{ColorId, SizeId, Sku, StockLevel};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item { pub sku: Sku, pub name: String, pub stock_level: i64 }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub id: SizeId,
    pub code: String,
    pub name: String,
    pub price_adjustment: Decimal,
    pub display_order: i32,
    /// Set only on legacy records where a color owns its own size list.
    pub parent_color_id: Option<ColorId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub id: ColorId,
    pub color_name: String,
    pub color_code: Option<String>,
    pub display_order: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combination { pub size_id: SizeId, pub color_id: ColorId, pub stock_level: StockLevel }

impl Item {
    pub fn new(sku: Sku, name: impl Into<String>, stock_level: i64) -> Self {
        Self { sku, name: name.into(), stock_level }
    }
}

impl Size {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: SizeId::generate(), code: code.into(), name: name.into(),
            price_adjustment: Decimal::ZERO, display_order: 0, parent_color_id: None,
        }
    }
    pub fn with_order(mut self, display_order: i32) -> Self { self.display_order = display_order; self }
    pub fn with_price_adjustment(mut self, price_adjustment: Decimal) -> Self { self.price_adjustment = price_adjustment; self }
    /// Legacy shape: this size record belongs to one color.
    pub fn nested_under(mut self, color: ColorId) -> Self { self.parent_color_id = Some(color); self }
    pub fn is_nested(&self) -> bool { self.parent_color_id.is_some() }
}

impl Color {
    pub fn new(color_name: impl Into<String>) -> Self {
        Self { id: ColorId::generate(), color_name: color_name.into(), color_code: None, display_order: 0 }
    }
    pub fn with_code(mut self, color_code: impl Into<String>) -> Self { self.color_code = Some(color_code.into()); self }
    pub fn with_order(mut self, display_order: i32) -> Self { self.display_order = display_order; self }
}

impl Combination {
    pub fn new(size_id: SizeId, color_id: ColorId, stock_level: u32) -> Self {
        Self { size_id, color_id, stock_level: StockLevel::new(stock_level) }
    }
}

/// Everything persisted for one item, read at a single point in time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantSnapshot {
    pub item: Item,
    pub sizes: Vec<Size>,
    pub colors: Vec<Color>,
    pub combinations: Vec<Combination>,
}

/// A color with the stock it holds inside one size group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorStock { pub color: Color, pub stock_level: StockLevel }

/// One size and its colors, after folding legacy records that share a size code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SizeGroup { pub size: Size, pub colors: Vec<ColorStock> }

impl SizeGroup {
    pub fn total_stock(&self) -> i64 { self.colors.iter().map(|c| i64::from(c.stock_level.value())).sum() }
}

impl VariantSnapshot {
    pub fn empty(item: Item) -> Self { Self { item, sizes: vec![], colors: vec![], combinations: vec![] } }

    pub fn sku(&self) -> &Sku { &self.item.sku }

    /// Sum of every stored combination, duplicates included.
    pub fn raw_total_stock(&self) -> i64 {
        self.combinations.iter().map(|c| i64::from(c.stock_level.value())).sum()
    }

    pub fn size(&self, id: SizeId) -> Option<&Size> { self.sizes.iter().find(|s| s.id == id) }
    pub fn color(&self, id: ColorId) -> Option<&Color> { self.colors.iter().find(|c| c.id == id) }

    /// Size-major grouping keyed by size code, then color name.
    ///
    /// Groups follow size display order. When several records map to the same
    /// (size code, color name) pair the first stored combination is kept.
    /// Combinations pointing at unknown rows are skipped. An item with no
    /// combinations at all fans every color out under every size at zero stock.
    pub fn size_major(&self) -> Vec<SizeGroup> {
        let mut groups: Vec<SizeGroup> = Vec::new();
        let mut group_by_code: HashMap<&str, usize> = HashMap::new();
        for size in self.ordered_sizes() {
            if !group_by_code.contains_key(size.code.as_str()) {
                group_by_code.insert(size.code.as_str(), groups.len());
                groups.push(SizeGroup { size: Size { parent_color_id: None, ..size.clone() }, colors: vec![] });
            }
        }

        if self.combinations.is_empty() {
            let colors = self.distinct_colors();
            for group in &mut groups {
                group.colors = colors.iter().map(|c| ColorStock { color: (*c).clone(), stock_level: StockLevel::ZERO }).collect();
            }
            return groups;
        }

        let sizes: HashMap<SizeId, &Size> = self.sizes.iter().map(|s| (s.id, s)).collect();
        let colors: HashMap<ColorId, &Color> = self.colors.iter().map(|c| (c.id, c)).collect();
        let mut seen: HashSet<(usize, &str)> = HashSet::new();
        for combo in &self.combinations {
            let (Some(size), Some(color)) = (sizes.get(&combo.size_id), colors.get(&combo.color_id)) else { continue };
            let Some(&idx) = group_by_code.get(size.code.as_str()) else { continue };
            if seen.insert((idx, color.color_name.as_str())) {
                groups[idx].colors.push(ColorStock { color: (*color).clone(), stock_level: combo.stock_level });
            }
        }
        for group in &mut groups {
            group.colors.sort_by(|a, b| {
                (a.color.display_order, &a.color.color_name).cmp(&(b.color.display_order, &b.color.color_name))
            });
        }
        groups
    }

    /// Colors deduplicated by name, in display order.
    pub fn distinct_colors(&self) -> Vec<&Color> {
        let mut ordered: Vec<&Color> = self.colors.iter().collect();
        ordered.sort_by(|a, b| (a.display_order, &a.color_name).cmp(&(b.display_order, &b.color_name)));
        let mut seen = HashSet::new();
        ordered.retain(|c| seen.insert(c.color_name.as_str()));
        ordered
    }

    fn ordered_sizes(&self) -> Vec<&Size> {
        let mut ordered: Vec<&Size> = self.sizes.iter().collect();
        // Item-level records win over legacy nested ones when picking a group's representative.
        ordered.sort_by(|a, b| (a.display_order, a.is_nested()).cmp(&(b.display_order, b.is_nested())));
        ordered
    }
}
