//! Sparse row store.
//!
//! Only rows and cells that were explicitly touched are stored; an absent
//! row has the default height, is visible, and holds no cells. Keys are
//! kept in `BTreeMap`s so iteration is always in index order.
//!
//! Structural edits (insert/delete of rows or columns) relabel keys and
//! rewrite every formula reference that points at or past the edit.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sheetgrid_core::cell_ref::{shift_ref, translate_refs};
use sheetgrid_core::CellRange;

use crate::cell::{Cell, ClearMode, CopyMode};
use crate::formula::{format_number, Evaluator};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cells: BTreeMap<usize, Cell>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<usize>,
}

/// Persisted form of the row store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowsData {
    pub len: usize,
    #[serde(default)]
    pub rows: BTreeMap<usize, Row>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rows {
    rows: BTreeMap<usize, Row>,
    /// Logical row count.
    pub len: usize,
    /// Height of a row without an override.
    pub default_height: f64,
}

/// Move every key `>= at` up by `n`.
pub(crate) fn shift_keys_up<V>(map: &mut BTreeMap<usize, V>, at: usize, n: usize) {
    let tail = map.split_off(&at);
    map.extend(tail.into_iter().map(|(k, v)| (k + n, v)));
}

/// Drop keys in `start..=end` and move every key past `end` down to close the gap.
pub(crate) fn remove_keys<V>(map: &mut BTreeMap<usize, V>, start: usize, end: usize) {
    let n = end - start + 1;
    let mut tail = map.split_off(&start);
    let kept = tail.split_off(&(end + 1));
    map.extend(kept.into_iter().map(|(k, v)| (k - n, v)));
}

fn trailing_number() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[.\d]+$").expect("static pattern"))
}

/// `"Item 3"` + 2 -> `"Item 5"`. Text without a numeric tail is unchanged.
fn increment_series(text: &str, delta: isize) -> String {
    let Some(m) = trailing_number().find(text) else {
        return text.to_string();
    };
    match m.as_str().parse::<f64>() {
        Ok(n) => format!("{}{}", &text[..m.start()], format_number(n + delta as f64)),
        Err(_) => text.to_string(),
    }
}

impl Rows {
    pub fn new(len: usize, default_height: f64) -> Self {
        Self {
            rows: BTreeMap::new(),
            len,
            default_height,
        }
    }

    // ========================================================================
    // Row metadata
    // ========================================================================

    pub fn get(&self, ri: usize) -> Option<&Row> {
        self.rows.get(&ri)
    }

    pub fn get_or_new(&mut self, ri: usize) -> &mut Row {
        self.rows.entry(ri).or_default()
    }

    /// Effective height: 0 when hidden.
    pub fn height(&self, ri: usize) -> f64 {
        match self.rows.get(&ri) {
            Some(row) if row.hidden => 0.0,
            Some(row) => row.height.unwrap_or(self.default_height),
            None => self.default_height,
        }
    }

    pub fn set_height(&mut self, ri: usize, height: f64) {
        self.get_or_new(ri).height = Some(height);
    }

    pub fn is_hidden(&self, ri: usize) -> bool {
        self.rows.get(&ri).is_some_and(|row| row.hidden)
    }

    pub fn set_hidden(&mut self, ri: usize, hidden: bool) {
        self.get_or_new(ri).hidden = hidden;
    }

    /// Unhide the run of hidden rows directly above `index`.
    pub fn unhide(&mut self, index: usize) {
        let mut ri = index;
        while ri > 0 {
            ri -= 1;
            if !self.is_hidden(ri) {
                break;
            }
            self.set_hidden(ri, false);
        }
    }

    pub fn set_style(&mut self, ri: usize, style: usize) {
        self.get_or_new(ri).style = Some(style);
    }

    /// Sum of heights over `lo..hi`, counting rows in `except` as 0.
    pub fn sum_height(&self, lo: usize, hi: usize, except: Option<&BTreeSet<usize>>) -> f64 {
        (lo..hi)
            .filter(|ri| except.map_or(true, |set| !set.contains(ri)))
            .map(|ri| self.height(ri))
            .sum()
    }

    pub fn total_height(&self) -> f64 {
        self.sum_height(0, self.len, None)
    }

    // ========================================================================
    // Cells
    // ========================================================================

    pub fn cell(&self, ri: usize, ci: usize) -> Option<&Cell> {
        self.rows.get(&ri)?.cells.get(&ci)
    }

    pub fn cell_mut(&mut self, ri: usize, ci: usize) -> Option<&mut Cell> {
        self.rows.get_mut(&ri)?.cells.get_mut(&ci)
    }

    pub fn cell_or_new(&mut self, ri: usize, ci: usize) -> &mut Cell {
        self.get_or_new(ri).cells.entry(ci).or_default()
    }

    /// Raw text of a cell, empty when absent.
    pub fn cell_text(&self, ri: usize, ci: usize) -> &str {
        self.cell(ri, ci).map_or("", Cell::text)
    }

    /// Merge span anchored at a cell, `(0, 0)` when none.
    pub fn cell_merge(&self, ri: usize, ci: usize) -> (usize, usize) {
        self.cell(ri, ci).map_or((0, 0), Cell::merge_span)
    }

    pub fn set_cell(&mut self, ri: usize, ci: usize, cell: Cell, mode: CopyMode) {
        let row = self.get_or_new(ri);
        match mode {
            CopyMode::All => {
                row.cells.insert(ci, cell);
            }
            CopyMode::Text => {
                row.cells.entry(ci).or_default().text = cell.text;
            }
            CopyMode::Format => {
                let target = row.cells.entry(ci).or_default();
                target.style = cell.style;
                if cell.merge.is_some() {
                    target.merge = cell.merge;
                }
            }
        }
    }

    /// Set text unless the cell is locked.
    pub fn set_cell_text(&mut self, ri: usize, ci: usize, text: &str) {
        let cell = self.cell_or_new(ri, ci);
        if cell.editable {
            cell.text = Some(text.to_string());
        }
    }

    pub fn delete_cells(&mut self, range: &CellRange, mode: ClearMode) {
        range.each(|ri, ci| self.delete_cell(ri, ci, mode));
    }

    /// Clear part of a cell. Locked cells are left alone.
    pub fn delete_cell(&mut self, ri: usize, ci: usize, mode: ClearMode) {
        let Some(row) = self.rows.get_mut(&ri) else {
            return;
        };
        let Some(cell) = row.cells.get_mut(&ci) else {
            return;
        };
        if !cell.editable {
            return;
        }
        match mode {
            ClearMode::All => {
                row.cells.remove(&ci);
            }
            ClearMode::Text => cell.text = None,
            ClearMode::Format => {
                cell.style = None;
                cell.merge = None;
            }
            ClearMode::Merge => cell.merge = None,
        }
    }

    /// Bottom-most populated row and right-most populated column.
    pub fn max_cell(&self) -> (usize, usize) {
        let mut max = (0, 0);
        for (&ri, row) in &self.rows {
            if let Some((&ci, _)) = row.cells.last_key_value() {
                max = (max.0.max(ri), max.1.max(ci));
            }
        }
        max
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Row)> {
        self.rows.iter().map(|(&ri, row)| (ri, row))
    }

    /// Every stored cell as `(ri, ci, cell)` in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, &Cell)> {
        self.rows
            .iter()
            .flat_map(|(&ri, row)| row.cells.iter().map(move |(&ci, cell)| (ri, ci, cell)))
    }

    // ========================================================================
    // Copy / cut / paste
    // ========================================================================

    /// Copy `src` into `dst`, tiling the source when the destination is
    /// larger. Formula references move with each copy. With `autofill`,
    /// numeric tails of plain text continue as a series along the fill axis
    /// when the source is a single cell, a single row filled vertically, or
    /// a single column filled horizontally.
    ///
    /// `on_cell` sees every written cell, so the caller can re-register merges.
    pub fn copy_paste(
        &mut self,
        src: &CellRange,
        dst: &CellRange,
        mode: CopyMode,
        autofill: bool,
        mut on_cell: impl FnMut(usize, usize, &Cell),
    ) {
        let (rn, cn) = src.size();
        let vertical = dst.sri > src.eri || dst.eri < src.sri;
        let horizontal = dst.sci > src.eci || dst.eci < src.sci;
        let series = (rn == 1 && cn == 1) || (rn == 1 && vertical) || (cn == 1 && horizontal);

        let mut pasted = Vec::new();
        for (&i, row) in self.rows.range(src.sri..=src.eri) {
            for (&j, cell) in row.cells.range(src.sci..=src.eci) {
                for ii in (dst.sri..=dst.eri).step_by(rn) {
                    for jj in (dst.sci..=dst.eci).step_by(cn) {
                        let nri = ii + (i - src.sri);
                        let nci = jj + (j - src.sci);
                        let drow = nri as isize - i as isize;
                        let dcol = nci as isize - j as isize;
                        let mut ncell = cell.clone();
                        if let Some(text) = ncell.text.as_deref().filter(|t| !t.is_empty()) {
                            if text.starts_with('=') {
                                let moved = translate_refs(text, |r| shift_ref(r, dcol, drow, |_, _| true));
                                ncell.text = Some(moved);
                            } else if autofill && series {
                                let delta = if vertical { drow } else { dcol };
                                ncell.text = Some(increment_series(text, delta));
                            }
                        }
                        pasted.push((nri, nci, ncell));
                    }
                }
            }
        }
        for (nri, nci, ncell) in pasted {
            on_cell(nri, nci, &ncell);
            self.set_cell(nri, nci, ncell, mode);
        }
    }

    /// Move the cells of `src` so its top-left lands on `dst`'s top-left.
    /// References are not rewritten; moved cells overwrite what was there.
    pub fn cut_paste(&mut self, src: &CellRange, dst: &CellRange) {
        let mut moved = Vec::new();
        for (&ri, row) in self.rows.range_mut(src.sri..=src.eri) {
            let mut inside = row.cells.split_off(&src.sci);
            let after = inside.split_off(&(src.eci + 1));
            row.cells.extend(after);
            moved.extend(inside.into_iter().map(|(ci, cell)| (ri, ci, cell)));
        }
        for (ri, ci, cell) in moved {
            let nri = dst.sri + (ri - src.sri);
            let nci = dst.sci + (ci - src.sci);
            self.get_or_new(nri).cells.insert(nci, cell);
        }
    }

    /// Write a block of text starting at `dst`'s top-left corner.
    pub fn paste_text(&mut self, block: &[Vec<String>], dst: &CellRange) {
        for (i, line) in block.iter().enumerate() {
            for (j, text) in line.iter().enumerate() {
                self.set_cell_text(dst.sri + i, dst.sci + j, text);
            }
        }
    }

    // ========================================================================
    // Structural edits
    // ========================================================================

    /// Rewrite every formula through `f`, applied to each reference token.
    fn rewrite_formulas(&mut self, f: impl Fn(&str) -> String) {
        for row in self.rows.values_mut() {
            for cell in row.cells.values_mut() {
                if let Some(text) = cell.text.as_mut().filter(|t| t.starts_with('=')) {
                    *text = translate_refs(text, &f);
                }
            }
        }
    }

    pub fn insert(&mut self, sri: usize, n: usize) {
        shift_keys_up(&mut self.rows, sri, n);
        self.rewrite_formulas(|r| shift_ref(r, 0, n as isize, |_, row| row >= sri));
        self.len += n;
    }

    pub fn delete(&mut self, sri: usize, eri: usize) {
        let n = eri - sri + 1;
        remove_keys(&mut self.rows, sri, eri);
        self.rewrite_formulas(|r| shift_ref(r, 0, -(n as isize), |_, row| row > eri));
        self.len = self.len.saturating_sub(n);
    }

    pub fn insert_columns(&mut self, sci: usize, n: usize) {
        for row in self.rows.values_mut() {
            shift_keys_up(&mut row.cells, sci, n);
        }
        self.rewrite_formulas(|r| shift_ref(r, n as isize, 0, |col, _| col >= sci));
    }

    pub fn delete_columns(&mut self, sci: usize, eci: usize) {
        let n = eci - sci + 1;
        for row in self.rows.values_mut() {
            remove_keys(&mut row.cells, sci, eci);
        }
        self.rewrite_formulas(|r| shift_ref(r, -(n as isize), 0, |col, _| col > eci));
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    pub fn data(&self) -> RowsData {
        RowsData {
            len: self.len,
            rows: self.rows.clone(),
        }
    }

    pub fn set_data(&mut self, data: RowsData) {
        self.len = data.len;
        self.rows = data.rows;
    }

    /// Rows with every formula cell's `text` replaced by its rendered value
    /// and the source kept in `formula`.
    pub fn export_data(&self, max_depth: usize, max_range_cells: usize) -> RowsData {
        let lookup = |col: usize, row: usize| self.cell_text(row, col).to_string();
        let eval = Evaluator::new(&lookup)
            .with_max_depth(max_depth)
            .with_max_range_cells(max_range_cells);
        let mut data = self.data();
        for (&ri, row) in data.rows.iter_mut() {
            for (&ci, cell) in row.cells.iter_mut() {
                if cell.is_formula() {
                    cell.formula = cell.text.take();
                    cell.text = Some(eval.evaluate_cell(ci, ri).to_text());
                }
            }
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(text: &str) -> CellRange {
        text.parse().unwrap()
    }

    fn rows_with(cells: &[(usize, usize, &str)]) -> Rows {
        let mut rows = Rows::new(100, 25.0);
        for &(ri, ci, text) in cells {
            rows.set_cell_text(ri, ci, text);
        }
        rows
    }

    #[test]
    fn test_heights_and_hidden() {
        let mut rows = Rows::new(10, 25.0);
        rows.set_height(1, 40.0);
        rows.set_hidden(2, true);
        assert_eq!(rows.height(0), 25.0);
        assert_eq!(rows.height(1), 40.0);
        assert_eq!(rows.height(2), 0.0);
        assert_eq!(rows.sum_height(0, 4, None), 90.0);
        let except: BTreeSet<usize> = [1].into_iter().collect();
        assert_eq!(rows.sum_height(0, 4, Some(&except)), 50.0);
        assert_eq!(rows.total_height(), 25.0 * 8.0 + 40.0);
    }

    #[test]
    fn test_unhide_clears_run_above() {
        let mut rows = Rows::new(10, 25.0);
        rows.set_hidden(1, true);
        rows.set_hidden(3, true);
        rows.set_hidden(4, true);
        rows.unhide(5);
        assert!(!rows.is_hidden(3));
        assert!(!rows.is_hidden(4));
        assert!(rows.is_hidden(1));
    }

    #[test]
    fn test_set_cell_text_respects_editable() {
        let mut rows = rows_with(&[(0, 0, "a")]);
        rows.cell_or_new(0, 0).editable = false;
        rows.set_cell_text(0, 0, "b");
        assert_eq!(rows.cell_text(0, 0), "a");
        rows.delete_cell(0, 0, ClearMode::All);
        assert_eq!(rows.cell_text(0, 0), "a");
    }

    #[test]
    fn test_delete_cell_modes() {
        let mut rows = rows_with(&[(0, 0, "a")]);
        {
            let cell = rows.cell_or_new(0, 0);
            cell.style = Some(1);
            cell.merge = Some((1, 1));
        }
        rows.delete_cell(0, 0, ClearMode::Merge);
        assert_eq!(rows.cell(0, 0).unwrap().merge, None);
        rows.delete_cell(0, 0, ClearMode::Format);
        assert_eq!(rows.cell(0, 0).unwrap().style, None);
        rows.delete_cell(0, 0, ClearMode::Text);
        assert_eq!(rows.cell(0, 0).unwrap().text, None);
        rows.delete_cell(0, 0, ClearMode::All);
        assert!(rows.cell(0, 0).is_none());
    }

    #[test]
    fn test_insert_rows_relocates_and_rewrites() {
        let mut rows = rows_with(&[(0, 0, "5"), (0, 1, "=A1+1"), (3, 0, "=A1+A4")]);
        rows.insert(0, 1);
        assert_eq!(rows.cell_text(1, 1), "=A2+1");
        assert_eq!(rows.cell_text(1, 0), "5");
        assert_eq!(rows.cell_text(4, 0), "=A2+A5");
        assert!(rows.cell(0, 1).is_none());
        assert_eq!(rows.len, 101);
    }

    #[test]
    fn test_insert_rows_leaves_refs_above_alone() {
        let mut rows = rows_with(&[(0, 0, "=A1+A5")]);
        rows.insert(2, 3);
        assert_eq!(rows.cell_text(0, 0), "=A1+A8");
    }

    #[test]
    fn test_delete_rows() {
        let mut rows = rows_with(&[(0, 0, "=A6"), (2, 0, "gone"), (5, 0, "x")]);
        rows.delete(1, 3);
        assert_eq!(rows.cell_text(2, 0), "x");
        assert_eq!(rows.cell_text(0, 0), "=A3");
        assert!(rows.iter().all(|(_, row)| row.cells.values().all(|c| c.text() != "gone")));
        assert_eq!(rows.len, 97);
    }

    #[test]
    fn test_insert_and_delete_columns() {
        let mut rows = rows_with(&[(0, 0, "=B1+C1"), (0, 2, "c")]);
        rows.insert_columns(1, 2);
        assert_eq!(rows.cell_text(0, 0), "=D1+E1");
        assert_eq!(rows.cell_text(0, 4), "c");
        rows.delete_columns(1, 2);
        assert_eq!(rows.cell_text(0, 0), "=B1+C1");
        assert_eq!(rows.cell_text(0, 2), "c");
    }

    #[test]
    fn test_copy_paste_tiles_and_shifts_formulas() {
        let mut rows = rows_with(&[(0, 0, "1"), (0, 1, "=A1*2")]);
        rows.copy_paste(&r("A1:B1"), &r("A3:B4"), CopyMode::All, false, |_, _, _| {});
        assert_eq!(rows.cell_text(2, 0), "1");
        assert_eq!(rows.cell_text(2, 1), "=A3*2");
        assert_eq!(rows.cell_text(3, 1), "=A4*2");
    }

    #[test]
    fn test_copy_paste_text_only_keeps_style() {
        let mut rows = rows_with(&[(0, 0, "new")]);
        rows.cell_or_new(5, 5).style = Some(3);
        rows.copy_paste(&r("A1"), &r("F6"), CopyMode::Text, false, |_, _, _| {});
        let cell = rows.cell(5, 5).unwrap();
        assert_eq!(cell.text(), "new");
        assert_eq!(cell.style, Some(3));
    }

    #[test]
    fn test_autofill_series_down_and_up() {
        let mut rows = rows_with(&[(2, 0, "Item 3")]);
        rows.copy_paste(&r("A3"), &r("A4:A5"), CopyMode::All, true, |_, _, _| {});
        assert_eq!(rows.cell_text(3, 0), "Item 4");
        assert_eq!(rows.cell_text(4, 0), "Item 5");
        rows.copy_paste(&r("A3"), &r("A1:A2"), CopyMode::All, true, |_, _, _| {});
        assert_eq!(rows.cell_text(0, 0), "Item 1");
        assert_eq!(rows.cell_text(1, 0), "Item 2");
    }

    #[test]
    fn test_autofill_block_does_not_increment() {
        let mut rows = rows_with(&[(0, 0, "a1"), (0, 1, "b1"), (1, 0, "a2"), (1, 1, "b2")]);
        rows.copy_paste(&r("A1:B2"), &r("A3:B4"), CopyMode::All, true, |_, _, _| {});
        assert_eq!(rows.cell_text(2, 0), "a1");
        assert_eq!(rows.cell_text(3, 1), "b2");
    }

    #[test]
    fn test_autofill_formula_right() {
        let mut rows = rows_with(&[(0, 0, "=A2+1")]);
        rows.copy_paste(&r("A1"), &r("B1:C1"), CopyMode::All, true, |_, _, _| {});
        assert_eq!(rows.cell_text(0, 1), "=B2+1");
        assert_eq!(rows.cell_text(0, 2), "=C2+1");
    }

    #[test]
    fn test_copy_paste_reports_cells() {
        let mut rows = rows_with(&[(0, 0, "x")]);
        rows.cell_or_new(0, 0).merge = Some((1, 0));
        let mut seen = Vec::new();
        rows.copy_paste(&r("A1:A2"), &r("C1:C2"), CopyMode::All, false, |ri, ci, cell| {
            seen.push((ri, ci, cell.merge));
        });
        assert_eq!(seen, vec![(0, 2, Some((1, 0)))]);
    }

    #[test]
    fn test_cut_paste_moves_without_rewriting() {
        let mut rows = rows_with(&[(0, 0, "=B1"), (0, 1, "keep"), (1, 0, "x")]);
        rows.cut_paste(&r("A1:A2"), &r("D5:D6"));
        assert!(rows.cell(0, 0).is_none());
        assert_eq!(rows.cell_text(0, 1), "keep");
        assert_eq!(rows.cell_text(4, 3), "=B1");
        assert_eq!(rows.cell_text(5, 3), "x");
    }

    #[test]
    fn test_paste_text_block() {
        let mut rows = Rows::new(10, 25.0);
        let block = vec![vec!["a".to_string(), "b".to_string()], vec!["c".to_string()]];
        rows.paste_text(&block, &r("B2"));
        assert_eq!(rows.cell_text(1, 1), "a");
        assert_eq!(rows.cell_text(1, 2), "b");
        assert_eq!(rows.cell_text(2, 1), "c");
    }

    #[test]
    fn test_max_cell() {
        let rows = rows_with(&[(2, 1, "a"), (5, 0, "b"), (1, 7, "c")]);
        assert_eq!(rows.max_cell(), (5, 7));
        assert_eq!(Rows::new(10, 25.0).max_cell(), (0, 0));
    }

    #[test]
    fn test_export_data_renders_formulas() {
        let rows = rows_with(&[(0, 0, "10"), (1, 0, "20"), (2, 0, "=SUM(A1,A2)")]);
        let data = rows.export_data(64, 100);
        let cell = &data.rows[&2].cells[&0];
        assert_eq!(cell.text(), "30");
        assert_eq!(cell.formula.as_deref(), Some("=SUM(A1,A2)"));
    }

    #[test]
    fn test_data_round_trip() {
        let mut rows = rows_with(&[(3, 2, "x")]);
        rows.set_height(3, 30.0);
        let json = serde_json::to_string(&rows.data()).unwrap();
        let mut back = Rows::new(1, 25.0);
        back.set_data(serde_json::from_str(&json).unwrap());
        assert_eq!(back, rows);
    }
}
