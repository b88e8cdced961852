//! AutoFilter and Sort - row view layer
//!
//! The filter never moves data. It computes which storage rows under the
//! header are hidden, and a permutation of the visible ones, so callers can
//! translate between what the user sees and where data is stored:
//! - View space: row indices as presented (affected by sort)
//! - Storage space: row indices in [`crate::rows::Rows`]
//!
//! Sorting orders visible rows by their storage index, not by cell value.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use sheetgrid_core::CellRange;

use crate::formula::parse_number;

// =============================================================================
// Filter / Sort records
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    #[default]
    All,
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    /// Between `value[0]` and `value[1]`, inclusive.
    Be,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub ci: usize,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: Vec<String>,
}

/// Numeric ordering when both sides are numbers, string ordering otherwise.
fn compare_text(a: &str, b: &str) -> Ordering {
    match (parse_number(a), parse_number(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

impl Filter {
    pub fn new(ci: usize, operator: FilterOperator, value: Vec<String>) -> Self {
        Self { ci, operator, value }
    }

    /// Does a cell with this text pass the filter?
    pub fn includes(&self, text: &str) -> bool {
        let first = self.value.first().map(String::as_str);
        let cmp = |pred: fn(Ordering) -> bool| first.is_some_and(|v| pred(compare_text(text, v)));
        match self.operator {
            FilterOperator::All => true,
            FilterOperator::In => self.value.iter().any(|v| v == text),
            FilterOperator::Eq => cmp(Ordering::is_eq),
            FilterOperator::Neq => cmp(Ordering::is_ne),
            FilterOperator::Gt => cmp(Ordering::is_gt),
            FilterOperator::Gte => cmp(Ordering::is_ge),
            FilterOperator::Lt => cmp(Ordering::is_lt),
            FilterOperator::Lte => cmp(Ordering::is_le),
            FilterOperator::Be => match self.value.as_slice() {
                [min, max, ..] => compare_text(text, min).is_ge() && compare_text(text, max).is_le(),
                _ => false,
            },
        }
    }

    /// Number of accepted values for an `in` filter, 0 otherwise.
    pub fn vlength(&self) -> usize {
        match self.operator {
            FilterOperator::In => self.value.len(),
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub ci: usize,
    pub order: SortOrder,
}

// =============================================================================
// AutoFilter
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoFilter {
    /// Header row plus data rows. `None` when the filter is off.
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub range: Option<CellRange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Sort>,
}

/// Result of applying the filters: storage rows that fail, and storage rows
/// that pass in scan order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilteredRows {
    pub hidden: BTreeSet<usize>,
    pub visible: Vec<usize>,
}

impl AutoFilter {
    pub fn active(&self) -> bool {
        self.range.is_some()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Add a filter for column `ci`, replacing any existing one.
    pub fn add_filter(&mut self, ci: usize, operator: FilterOperator, value: Vec<String>) {
        match self.get_filter_mut(ci) {
            Some(filter) => {
                filter.operator = operator;
                filter.value = value;
            }
            None => self.filters.push(Filter::new(ci, operator, value)),
        }
    }

    pub fn set_sort(&mut self, ci: usize, order: Option<SortOrder>) {
        self.sort = order.map(|order| Sort { ci, order });
    }

    pub fn get_filter(&self, ci: usize) -> Option<&Filter> {
        self.filters.iter().find(|f| f.ci == ci)
    }

    pub fn get_filter_mut(&mut self, ci: usize) -> Option<&mut Filter> {
        self.filters.iter_mut().find(|f| f.ci == ci)
    }

    pub fn get_sort(&self, ci: usize) -> Option<&Sort> {
        self.sort.as_ref().filter(|s| s.ci == ci)
    }

    /// The header row of the filter range.
    pub fn header_range(&self) -> Option<CellRange> {
        self.range
            .map(|r| CellRange::new(r.sri, r.sci, r.sri, r.eci))
    }

    /// Is `(ri, ci)` a header cell?
    pub fn includes(&self, ri: usize, ci: usize) -> bool {
        self.header_range().is_some_and(|h| h.includes(ri, ci))
    }

    /// Partition the data rows under the header. A row is visible only when
    /// it passes every filter.
    pub fn filtered_rows<'a>(&self, text: impl Fn(usize, usize) -> &'a str) -> FilteredRows {
        let mut out = FilteredRows::default();
        let Some(range) = self.range else {
            return out;
        };
        for ri in range.sri + 1..=range.eri {
            if self.filters.iter().all(|f| f.includes(text(ri, f.ci))) {
                out.visible.push(ri);
            } else {
                out.hidden.insert(ri);
            }
        }
        out
    }

    /// Distinct values in column `ci` under the header with their counts.
    /// Blank cells are counted under `""`.
    pub fn items<'a>(&self, ci: usize, text: impl Fn(usize, usize) -> &'a str) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        let Some(range) = self.range else {
            return counts;
        };
        for ri in range.sri + 1..=range.eri {
            let value = text(ri, ci);
            let key = if value.trim().is_empty() { "" } else { value };
            *counts.entry(key.to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Apply filters and sort, producing the row view.
    pub fn row_view<'a>(&self, text: impl Fn(usize, usize) -> &'a str) -> RowView {
        let FilteredRows { hidden, visible } = self.filtered_rows(text);
        let mut sorted = visible.clone();
        match self.sort.map(|s| s.order) {
            Some(SortOrder::Asc) => sorted.sort_unstable(),
            Some(SortOrder::Desc) => sorted.sort_unstable_by(|a, b| b.cmp(a)),
            None => {}
        }
        let mut view = RowView {
            hidden,
            ..RowView::default()
        };
        for (&position, &row) in visible.iter().zip(&sorted) {
            view.view_to_storage.insert(position, row);
            view.storage_to_view.insert(row, position);
        }
        view
    }
}

// =============================================================================
// RowView: visible position <-> storage row
// =============================================================================

/// Rows without an entry map to themselves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowView {
    hidden: BTreeSet<usize>,
    view_to_storage: FxHashMap<usize, usize>,
    storage_to_view: FxHashMap<usize, usize>,
}

impl RowView {
    /// Storage rows hidden by a filter.
    pub fn hidden(&self) -> &BTreeSet<usize> {
        &self.hidden
    }

    pub fn is_hidden(&self, ri: usize) -> bool {
        self.hidden.contains(&ri)
    }

    pub fn to_storage(&self, view_row: usize) -> usize {
        self.view_to_storage.get(&view_row).copied().unwrap_or(view_row)
    }

    pub fn to_view(&self, storage_row: usize) -> usize {
        self.storage_to_view.get(&storage_row).copied().unwrap_or(storage_row)
    }

    pub fn is_empty(&self) -> bool {
        self.hidden.is_empty() && self.view_to_storage.is_empty()
    }
}
