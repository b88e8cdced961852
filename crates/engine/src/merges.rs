//! Merged-cell registry.
//!
//! Registered merges never overlap. `add` absorbs merges fully contained in
//! the new range; rejecting partial overlaps is the caller's job (see
//! [`Merges::intersects`]).

use serde::{Deserialize, Serialize};
use sheetgrid_core::CellRange;

/// Which dimension a structural edit runs along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Row,
    Column,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Merges(Vec<CellRange>);

impl Merges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CellRange> {
        self.0.iter()
    }

    /// First merge covering `(ri, ci)`.
    pub fn get_first_includes(&self, ri: usize, ci: usize) -> Option<&CellRange> {
        self.0.iter().find(|m| m.includes(ri, ci))
    }

    pub fn filter_intersects(&self, range: &CellRange) -> Vec<CellRange> {
        self.0.iter().filter(|m| m.intersects(range)).copied().collect()
    }

    pub fn intersects(&self, range: &CellRange) -> bool {
        self.0.iter().any(|m| m.intersects(range))
    }

    /// Grow `range` until no merge sticks out of it.
    pub fn union(&self, range: &CellRange) -> CellRange {
        let mut out = *range;
        loop {
            let grown = self
                .0
                .iter()
                .filter(|m| m.intersects(&out))
                .fold(out, |acc, m| acc.union(m));
            if grown == out {
                return out;
            }
            out = grown;
        }
    }

    /// Drop every merge lying entirely inside `range`.
    pub fn delete_within(&mut self, range: &CellRange) {
        self.0.retain(|m| !m.within(range));
    }

    pub fn add(&mut self, range: CellRange) {
        self.delete_within(&range);
        self.0.push(range);
    }

    /// Adjust merges for `n` rows or columns inserted (`n > 0`) or deleted
    /// (`n < 0`) at `index`.
    ///
    /// Merges past the edit move. A merge straddling the edit grows or
    /// shrinks, and `on_within(anchor_ri, anchor_ci, drows, dcols)` is called
    /// with the span change so the anchor cell can follow. Merges whose
    /// anchor is deleted, or that shrink to a single cell, are dropped.
    pub fn shift(
        &mut self,
        axis: Axis,
        index: usize,
        n: isize,
        mut on_within: impl FnMut(usize, usize, isize, isize),
    ) {
        if n == 0 {
            return;
        }
        let delta = |d: isize| match axis {
            Axis::Row => (d, 0),
            Axis::Column => (0, d),
        };
        let removed = n.unsigned_abs();
        let mut kept = Vec::with_capacity(self.0.len());
        for m in self.0.drain(..) {
            let (start, end) = match axis {
                Axis::Row => (m.sri, m.eri),
                Axis::Column => (m.sci, m.eci),
            };
            if n > 0 {
                if start >= index {
                    let (dr, dc) = delta(n);
                    kept.extend(m.offset(dr, dc));
                } else if end >= index {
                    let (dr, dc) = delta(n);
                    on_within(m.sri, m.sci, dr, dc);
                    kept.push(grow(m, axis, removed as isize));
                } else {
                    kept.push(m);
                }
                continue;
            }
            let last = index + removed - 1;
            if start > last {
                let (dr, dc) = delta(n);
                kept.extend(m.offset(dr, dc));
            } else if end < index {
                kept.push(m);
            } else if start < index {
                let overlap = (end.min(last) - index + 1) as isize;
                let (dr, dc) = delta(-overlap);
                on_within(m.sri, m.sci, dr, dc);
                let shrunk = grow(m, axis, -overlap);
                if shrunk.is_multiple() {
                    kept.push(shrunk);
                }
            }
        }
        self.0 = kept;
    }

    /// Translate every merge inside `range` by `(drow, dcol)`.
    pub fn move_within(&mut self, range: &CellRange, drow: isize, dcol: isize) {
        for m in self.0.iter_mut() {
            if m.within(range) {
                if let Some(moved) = m.offset(drow, dcol) {
                    *m = moved;
                }
            }
        }
    }
}

/// Extend the far edge of `m` along `axis` by `d`.
fn grow(m: CellRange, axis: Axis, d: isize) -> CellRange {
    match axis {
        Axis::Row => CellRange::new(m.sri, m.sci, m.eri.saturating_add_signed(d), m.eci),
        Axis::Column => CellRange::new(m.sri, m.sci, m.eri, m.eci.saturating_add_signed(d)),
    }
}

impl FromIterator<CellRange> for Merges {
    fn from_iter<I: IntoIterator<Item = CellRange>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(text: &str) -> CellRange {
        text.parse().unwrap()
    }

    fn merges(list: &[&str]) -> Merges {
        list.iter().map(|s| r(s)).collect()
    }

    fn names(m: &Merges) -> Vec<String> {
        m.iter().map(|r| r.to_string()).collect()
    }

    #[test]
    fn test_add_absorbs_contained() {
        let mut m = merges(&["B2:C3", "E5:F6", "H1:H2"]);
        m.add(r("A1:F6"));
        assert_eq!(names(&m), vec!["H1:H2", "A1:F6"]);
    }

    #[test]
    fn test_get_first_includes() {
        let m = merges(&["B2:C3"]);
        assert_eq!(m.get_first_includes(0, 0), None);
        r("B2:C3").each(|ri, ci| assert_eq!(m.get_first_includes(ri, ci), Some(&r("B2:C3"))));
    }

    #[test]
    fn test_union_reaches_fixpoint() {
        let m = merges(&["A1:A3", "B3:C3", "E5:F6"]);
        assert_eq!(m.union(&r("A2")), r("A1:A3"));
        assert_eq!(m.union(&r("A1:B1")), r("A1:C3"));
    }

    #[test]
    fn test_shift_insert_rows() {
        let mut m = merges(&["A1:B2", "A5:B6", "D2:D4"]);
        let mut grown = Vec::new();
        m.shift(Axis::Row, 2, 2, |ri, ci, dr, dc| grown.push((ri, ci, dr, dc)));
        assert_eq!(names(&m), vec!["A1:B2", "A7:B8", "D2:D6"]);
        assert_eq!(grown, vec![(1, 3, 2, 0)]);
    }

    #[test]
    fn test_shift_delete_columns() {
        let mut m = merges(&["A1:D1", "C2:C3", "F1:G1", "B5:C5"]);
        let mut shrunk = Vec::new();
        m.shift(Axis::Column, 1, -2, |ri, ci, dr, dc| shrunk.push((ri, ci, dr, dc)));
        // A1:D1 loses B and C; C2:C3 and B5:C5 are anchored in the deleted span.
        assert_eq!(names(&m), vec!["A1:B1", "D1:E1"]);
        assert_eq!(shrunk, vec![(0, 0, 0, -2)]);
    }

    #[test]
    fn test_shift_delete_drops_single_cell_leftover() {
        let mut m = merges(&["A1:A2"]);
        let mut calls = 0;
        m.shift(Axis::Row, 1, -1, |_, _, _, _| calls += 1);
        assert!(m.is_empty());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_move_within() {
        let mut m = merges(&["B2:C3", "F6:G7"]);
        m.move_within(&r("A1:D4"), 3, 1);
        assert_eq!(names(&m), vec!["C5:D6", "F6:G7"]);
    }

    #[test]
    fn test_serializes_as_strings() {
        let m = merges(&["B2:C3"]);
        assert_eq!(serde_json::to_string(&m).unwrap(), r#"["B2:C3"]"#);
    }
}
