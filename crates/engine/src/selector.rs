use sheetgrid_core::CellRange;

/// Current selection: the selected range plus the active cell inside it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Selector {
    pub range: Option<CellRange>,
    pub ri: usize,
    pub ci: usize,
}

impl Selector {
    /// Select `range` with `(ri, ci)` as the active cell.
    pub fn set(&mut self, range: CellRange, ri: usize, ci: usize) {
        self.range = Some(range);
        self.ri = ri;
        self.ci = ci;
    }

    pub fn is_multiple(&self) -> bool {
        self.range.is_some_and(|r| r.is_multiple())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
