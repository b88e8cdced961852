//! Sparse column metadata. Cell data lives in [`crate::rows`]; this only
//! tracks per-column width, visibility and style.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::rows::{remove_keys, shift_keys_up};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Col {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<usize>,
}

/// Persisted form of the column store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColsData {
    pub len: usize,
    #[serde(default)]
    pub cols: BTreeMap<usize, Col>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cols {
    cols: BTreeMap<usize, Col>,
    pub len: usize,
    pub default_width: f64,
    /// Width of the row-number gutter.
    pub index_width: f64,
    pub min_width: f64,
}

impl Cols {
    pub fn new(len: usize, default_width: f64, index_width: f64, min_width: f64) -> Self {
        Self {
            cols: BTreeMap::new(),
            len,
            default_width,
            index_width,
            min_width,
        }
    }

    pub fn get(&self, ci: usize) -> Option<&Col> {
        self.cols.get(&ci)
    }

    pub fn get_or_new(&mut self, ci: usize) -> &mut Col {
        self.cols.entry(ci).or_default()
    }

    /// Effective width: 0 when hidden.
    pub fn width(&self, ci: usize) -> f64 {
        match self.cols.get(&ci) {
            Some(col) if col.hidden => 0.0,
            Some(col) => col.width.unwrap_or(self.default_width),
            None => self.default_width,
        }
    }

    pub fn set_width(&mut self, ci: usize, width: f64) {
        let min = self.min_width;
        self.get_or_new(ci).width = Some(width.max(min));
    }

    pub fn is_hidden(&self, ci: usize) -> bool {
        self.cols.get(&ci).is_some_and(|col| col.hidden)
    }

    pub fn set_hidden(&mut self, ci: usize, hidden: bool) {
        self.get_or_new(ci).hidden = hidden;
    }

    /// Unhide the run of hidden columns directly left of `index`.
    pub fn unhide(&mut self, index: usize) {
        let mut ci = index;
        while ci > 0 {
            ci -= 1;
            if !self.is_hidden(ci) {
                break;
            }
            self.set_hidden(ci, false);
        }
    }

    pub fn set_style(&mut self, ci: usize, style: usize) {
        self.get_or_new(ci).style = Some(style);
    }

    /// Sum of widths over `lo..hi`.
    pub fn sum_width(&self, lo: usize, hi: usize) -> f64 {
        (lo..hi).map(|ci| self.width(ci)).sum()
    }

    pub fn total_width(&self) -> f64 {
        self.sum_width(0, self.len)
    }

    pub fn insert(&mut self, sci: usize, n: usize) {
        shift_keys_up(&mut self.cols, sci, n);
        self.len += n;
    }

    pub fn delete(&mut self, sci: usize, eci: usize) {
        remove_keys(&mut self.cols, sci, eci);
        self.len = self.len.saturating_sub(eci - sci + 1);
    }

    pub fn data(&self) -> ColsData {
        ColsData {
            len: self.len,
            cols: self.cols.clone(),
        }
    }

    pub fn set_data(&mut self, data: ColsData) {
        self.len = data.len;
        self.cols = data.cols;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols() -> Cols {
        Cols::new(26, 100.0, 60.0, 60.0)
    }

    #[test]
    fn test_width_defaults_and_hidden() {
        let mut cols = cols();
        cols.set_width(1, 150.0);
        cols.set_hidden(2, true);
        assert_eq!(cols.width(0), 100.0);
        assert_eq!(cols.width(1), 150.0);
        assert_eq!(cols.width(2), 0.0);
        assert_eq!(cols.sum_width(0, 3), 250.0);
        assert_eq!(cols.total_width(), 100.0 * 24.0 + 150.0);
    }

    #[test]
    fn test_set_width_clamps_to_min() {
        let mut cols = cols();
        cols.set_width(0, 10.0);
        assert_eq!(cols.width(0), 60.0);
    }

    #[test]
    fn test_unhide_run() {
        let mut cols = cols();
        cols.set_hidden(2, true);
        cols.set_hidden(3, true);
        cols.unhide(4);
        assert!(!cols.is_hidden(2));
        assert!(!cols.is_hidden(3));
    }

    #[test]
    fn test_insert_and_delete_relabel() {
        let mut cols = cols();
        cols.set_width(3, 200.0);
        cols.insert(1, 2);
        assert_eq!(cols.width(5), 200.0);
        assert_eq!(cols.len, 28);
        cols.delete(0, 1);
        assert_eq!(cols.width(3), 200.0);
        assert_eq!(cols.len, 26);
    }
}
