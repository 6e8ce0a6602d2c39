//! Structure analysis: orientation classification and issue detection.
//!
//! Anomalies in the data are reported as issues, never as errors.

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::domain::aggregates::VariantSnapshot;
use crate::domain::value_objects::{ColorId, SizeId};

/// Which entity is the outer grouping key for stock records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Sizes own colors (Item -> Size -> Color -> Stock).
    Canonical,
    /// Legacy: colors own their own size records.
    Backwards,
    /// Both shapes present, or nested sizes shared across colors.
    Mixed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity { Low, Medium, High }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    NonCanonicalOrientation,
    /// More than one record for the same (size code, color name) pair.
    DuplicateCombination,
    DanglingCombination,
    /// A size nested under a color that holds no stock records.
    OrphanedSize,
    OrphanedColor,
    /// An item-level size with no stock records. Reported instead of
    /// `OrphanedSize` for such sizes, never alongside it.
    MissingPairing,
    StockMismatch,
}

impl IssueKind {
    pub const fn severity(self) -> Severity {
        match self {
            Self::DuplicateCombination => Severity::High,
            Self::NonCanonicalOrientation | Self::DanglingCombination | Self::OrphanedSize
            | Self::OrphanedColor | Self::StockMismatch => Severity::Medium,
            Self::MissingPairing => Severity::Low,
        }
    }

    fn recommendation(self, count: usize) -> String {
        match self {
            Self::NonCanonicalOrientation => "Run restructure to normalize orientation (sizes first, then colors for each size)".to_string(),
            Self::DuplicateCombination => format!("Merge {count} duplicate combination(s)"),
            Self::DanglingCombination => format!("Remove {count} combination(s) that reference missing sizes or colors"),
            Self::OrphanedSize => format!("Remove or re-attach {count} orphaned size record(s)"),
            Self::OrphanedColor => format!("Assign {count} orphaned color(s) to at least one size"),
            Self::MissingPairing => format!("Add colors to {count} size(s) that have none"),
            Self::StockMismatch => "Recalculate the item's aggregate stock from its combinations".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_name: Option<String>,
}

impl Issue {
    fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self { kind, severity: kind.severity(), message: message.into(), size_code: None, color_name: None }
    }
    fn at(mut self, size_code: Option<&str>, color_name: Option<&str>) -> Self {
        self.size_code = size_code.map(str::to_string);
        self.color_name = color_name.map(str::to_string);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StructureReport {
    pub item_sku: String,
    pub orientation: Orientation,
    pub is_backwards: bool,
    pub total_sizes: usize,
    pub total_colors: usize,
    pub total_combinations: usize,
    pub combination_stock: i64,
    pub item_stock_level: i64,
    pub issues: Vec<Issue>,
    pub recommendations: Vec<String>,
}

impl StructureReport {
    pub fn has(&self, kind: IssueKind) -> bool { self.issues.iter().any(|i| i.kind == kind) }

    /// Canonical orientation with one combination per pair and nothing dangling.
    pub fn is_canonical(&self) -> bool {
        self.orientation == Orientation::Canonical
            && !self.has(IssueKind::DuplicateCombination)
            && !self.has(IssueKind::DanglingCombination)
    }
}

/// Identity of a stock record's pair. Unresolvable records fall back to ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum PairKey<'a> {
    Named(&'a str, &'a str),
    Raw(SizeId, ColorId),
}

/// Classify the outer grouping key of the item's stock records.
pub fn classify_orientation(snapshot: &VariantSnapshot) -> Orientation {
    let has_item_level = snapshot.sizes.iter().any(|s| !s.is_nested());
    let nested: HashMap<SizeId, ColorId> = snapshot.sizes.iter()
        .filter_map(|s| s.parent_color_id.map(|parent| (s.id, parent)))
        .collect();
    if nested.is_empty() { return Orientation::Canonical; }

    let shared_across_colors = snapshot.combinations.iter()
        .any(|c| nested.get(&c.size_id).is_some_and(|parent| *parent != c.color_id));
    if has_item_level || shared_across_colors { Orientation::Mixed } else { Orientation::Backwards }
}

pub fn analyze_snapshot(snapshot: &VariantSnapshot) -> StructureReport {
    let orientation = classify_orientation(snapshot);
    let mut issues = Vec::new();

    match orientation {
        Orientation::Canonical => {}
        Orientation::Backwards => issues.push(Issue::new(
            IssueKind::NonCanonicalOrientation,
            "Colors are the outer grouping key with sizes nested under each color - this is backwards",
        )),
        Orientation::Mixed => issues.push(Issue::new(
            IssueKind::NonCanonicalOrientation,
            "Size-first and color-first records coexist for this item",
        )),
    }

    let size_code = move |id: SizeId| snapshot.size(id).map(|s| s.code.as_str());
    let color_name = move |id: ColorId| snapshot.color(id).map(|c| c.color_name.as_str());

    // Same key as the size-major fold: records that resolve to one (size code,
    // color name) pair collide there even when their ids differ.
    let mut pair_counts: HashMap<PairKey<'_>, usize> = HashMap::new();
    let mut pair_order: Vec<PairKey<'_>> = Vec::new();
    for combo in &snapshot.combinations {
        let key = match (size_code(combo.size_id), color_name(combo.color_id)) {
            (Some(size), Some(color)) => PairKey::Named(size, color),
            _ => PairKey::Raw(combo.size_id, combo.color_id),
        };
        let count = pair_counts.entry(key).or_insert(0);
        if *count == 0 { pair_order.push(key); }
        *count += 1;
    }
    for key in &pair_order {
        let count = pair_counts[key];
        if count > 1 {
            let (size, color) = match *key {
                PairKey::Named(size, color) => (Some(size), Some(color)),
                PairKey::Raw(size, color) => (size_code(size), color_name(color)),
            };
            issues.push(Issue::new(
                IssueKind::DuplicateCombination,
                format!("Combination {} / {} appears {count} times", size.unwrap_or("?"), color.unwrap_or("?")),
            ).at(size, color));
        }
    }

    for combo in &snapshot.combinations {
        let (size, color) = (size_code(combo.size_id), color_name(combo.color_id));
        if size.is_none() || color.is_none() {
            issues.push(Issue::new(
                IssueKind::DanglingCombination,
                format!("Combination references a missing {}", if size.is_none() { "size" } else { "color" }),
            ).at(size, color));
        }
    }

    let used_sizes: HashSet<SizeId> = snapshot.combinations.iter().map(|c| c.size_id).collect();
    let used_colors: HashSet<ColorId> = snapshot.combinations.iter().map(|c| c.color_id).collect();

    for size in snapshot.sizes.iter().filter(|s| !used_sizes.contains(&s.id)) {
        let issue = if size.is_nested() {
            Issue::new(IssueKind::OrphanedSize, format!("Size \"{}\" is nested under a color but holds no stock records", size.code))
        } else {
            Issue::new(IssueKind::MissingPairing, format!("Size \"{}\" has no colors attached", size.code))
        };
        issues.push(issue.at(Some(size.code.as_str()), None));
    }
    for color in snapshot.colors.iter().filter(|c| !used_colors.contains(&c.id)) {
        issues.push(Issue::new(
            IssueKind::OrphanedColor,
            format!("Color \"{}\" is not attached to any size", color.color_name),
        ).at(None, Some(color.color_name.as_str())));
    }

    let combination_stock = snapshot.raw_total_stock();
    if combination_stock != snapshot.item.stock_level {
        issues.push(Issue::new(
            IssueKind::StockMismatch,
            format!("Combinations hold {combination_stock} units but the item records {}", snapshot.item.stock_level),
        ));
    }

    let recommendations = recommend(&issues);
    StructureReport {
        item_sku: snapshot.item.sku.to_string(),
        orientation,
        is_backwards: orientation != Orientation::Canonical,
        total_sizes: snapshot.sizes.len(),
        total_colors: snapshot.colors.len(),
        total_combinations: snapshot.combinations.len(),
        combination_stock,
        item_stock_level: snapshot.item.stock_level,
        issues,
        recommendations,
    }
}

/// One recommendation per issue kind present, in order of first occurrence.
fn recommend(issues: &[Issue]) -> Vec<String> {
    let mut order: Vec<IssueKind> = Vec::new();
    let mut counts: HashMap<IssueKind, usize> = HashMap::new();
    for issue in issues {
        let count = counts.entry(issue.kind).or_insert(0);
        if *count == 0 { order.push(issue.kind); }
        *count += 1;
    }
    order.into_iter().map(|kind| kind.recommendation(counts[&kind])).collect()
}
