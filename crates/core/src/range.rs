//! Rectangular cell ranges.
//!
//! A range is a value type: `(sri, sci)` is the top-left corner, `(eri, eci)`
//! the bottom-right, both inclusive. The invariant `sri <= eri && sci <= eci`
//! is established by every constructor. The optional pixel size (`w`, `h`)
//! is a cache for geometry queries and takes no part in equality.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::cell_ref::CellRef;
use crate::error::RefError;

#[derive(Debug, Clone, Copy)]
pub struct CellRange {
    pub sri: usize,
    pub sci: usize,
    pub eri: usize,
    pub eci: usize,
    /// Cached pixel width (0 when unknown).
    pub w: f64,
    /// Cached pixel height (0 when unknown).
    pub h: f64,
}

impl CellRange {
    /// Create a range from two corners in any order.
    pub fn new(sri: usize, sci: usize, eri: usize, eci: usize) -> Self {
        Self {
            sri: sri.min(eri),
            sci: sci.min(eci),
            eri: sri.max(eri),
            eci: sci.max(eci),
            w: 0.0,
            h: 0.0,
        }
    }

    /// Create a range covering a single cell.
    pub fn single(ri: usize, ci: usize) -> Self {
        Self::new(ri, ci, ri, ci)
    }

    /// Attach a cached pixel size.
    pub fn with_size(mut self, w: f64, h: f64) -> Self {
        self.w = w;
        self.h = h;
        self
    }

    /// `(row_count, col_count)`
    pub fn size(&self) -> (usize, usize) {
        (self.eri - self.sri + 1, self.eci - self.sci + 1)
    }

    pub fn cell_count(&self) -> usize {
        let (rows, cols) = self.size();
        rows * cols
    }

    /// True when the range covers more than one cell.
    pub fn is_multiple(&self) -> bool {
        self.cell_count() > 1
    }

    pub fn start(&self) -> CellRef {
        CellRef::new(self.sci, self.sri)
    }

    pub fn end(&self) -> CellRef {
        CellRef::new(self.eci, self.eri)
    }

    pub fn includes(&self, ri: usize, ci: usize) -> bool {
        self.sri <= ri && ri <= self.eri && self.sci <= ci && ci <= self.eci
    }

    pub fn intersects(&self, other: &CellRange) -> bool {
        self.sri <= other.eri
            && other.sri <= self.eri
            && self.sci <= other.eci
            && other.sci <= self.eci
    }

    /// Smallest range enclosing both.
    pub fn union(&self, other: &CellRange) -> CellRange {
        CellRange::new(
            self.sri.min(other.sri),
            self.sci.min(other.sci),
            self.eri.max(other.eri),
            self.eci.max(other.eci),
        )
    }

    /// True when `self` lies entirely inside `other`.
    pub fn within(&self, other: &CellRange) -> bool {
        other.sri <= self.sri
            && self.eri <= other.eri
            && other.sci <= self.sci
            && self.eci <= other.eci
    }

    pub fn contains_range(&self, other: &CellRange) -> bool {
        other.within(self)
    }

    /// Cells of `self` not covered by `other`, as at most four disjoint
    /// rectangles: full-width bands above and below, then left and right
    /// pieces of the overlapping rows.
    pub fn difference(&self, other: &CellRange) -> Vec<CellRange> {
        if !self.intersects(other) {
            return vec![*self];
        }
        let mut parts = Vec::with_capacity(4);
        if other.sri > self.sri {
            parts.push(CellRange::new(self.sri, self.sci, other.sri - 1, self.eci));
        }
        if other.eri < self.eri {
            parts.push(CellRange::new(other.eri + 1, self.sci, self.eri, self.eci));
        }
        let mid_sri = self.sri.max(other.sri);
        let mid_eri = self.eri.min(other.eri);
        if other.sci > self.sci {
            parts.push(CellRange::new(mid_sri, self.sci, mid_eri, other.sci - 1));
        }
        if other.eci < self.eci {
            parts.push(CellRange::new(mid_sri, other.eci + 1, mid_eri, self.eci));
        }
        parts
    }

    /// Translate by a signed row/column delta. `None` when the result leaves the grid.
    pub fn offset(&self, drow: isize, dcol: isize) -> Option<CellRange> {
        Some(CellRange {
            sri: self.sri.checked_add_signed(drow)?,
            sci: self.sci.checked_add_signed(dcol)?,
            eri: self.eri.checked_add_signed(drow)?,
            eci: self.eci.checked_add_signed(dcol)?,
            w: self.w,
            h: self.h,
        })
    }

    /// Visit every cell row-major.
    pub fn each(&self, mut f: impl FnMut(usize, usize)) {
        for ri in self.sri..=self.eri {
            for ci in self.sci..=self.eci {
                f(ri, ci);
            }
        }
    }

    /// Every cell reference in row-major order.
    pub fn refs(&self) -> Vec<CellRef> {
        let mut refs = Vec::with_capacity(self.cell_count());
        self.each(|ri, ci| refs.push(CellRef::new(ci, ri)));
        refs
    }
}

impl PartialEq for CellRange {
    fn eq(&self, other: &Self) -> bool {
        (self.sri, self.sci, self.eri, self.eci) == (other.sri, other.sci, other.eri, other.eci)
    }
}

impl Eq for CellRange {}

impl Hash for CellRange {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.sri, self.sci, self.eri, self.eci).hash(state);
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_multiple() {
            write!(f, "{}:{}", self.start(), self.end())
        } else {
            write!(f, "{}", self.start())
        }
    }
}

impl FromStr for CellRange {
    type Err = RefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |_| RefError::InvalidRange(s.to_string());
        match s.split_once(':') {
            Some((start, end)) => {
                let start: CellRef = start.parse().map_err(invalid)?;
                let end: CellRef = end.parse().map_err(invalid)?;
                Ok(CellRange::new(start.row, start.col, end.row, end.col))
            }
            None => {
                let cell: CellRef = s.parse().map_err(invalid)?;
                Ok(CellRange::single(cell.row, cell.col))
            }
        }
    }
}

impl Serialize for CellRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CellRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
