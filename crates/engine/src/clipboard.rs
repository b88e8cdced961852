use sheetgrid_core::CellRange;

/// Pending copy or cut source.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum Clipboard {
    #[default]
    Clear,
    Copy(CellRange),
    Cut(CellRange),
}

impl Clipboard {
    pub fn range(&self) -> Option<&CellRange> {
        match self {
            Clipboard::Clear => None,
            Clipboard::Copy(range) | Clipboard::Cut(range) => Some(range),
        }
    }

    pub fn is_copy(&self) -> bool {
        matches!(self, Clipboard::Copy(_))
    }

    pub fn is_cut(&self) -> bool {
        matches!(self, Clipboard::Cut(_))
    }

    pub fn is_clear(&self) -> bool {
        matches!(self, Clipboard::Clear)
    }

    pub fn clear(&mut self) {
        *self = Clipboard::Clear;
    }
}
