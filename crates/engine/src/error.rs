use std::fmt;

use sheetgrid_core::{CellRange, RefError};

#[derive(Debug, Clone, PartialEq)]
pub enum GridError {
    /// Settings document could not be parsed.
    Settings(String),
    /// Snapshot could not be encoded or decoded.
    Snapshot(String),
    /// Paste footprint would overlap a merged cell it does not exactly cover.
    PasteIntoMerge,
    /// Cut source holds only part of this merge.
    CutSplitsMerge(CellRange),
    /// New merge partially overlaps an existing one.
    MergeOverlap(CellRange),
    /// Operation needs a selection and there is none.
    NoSelection,
    /// Clipboard holds nothing to paste.
    EmptyClipboard,
    /// Sheet is in read mode.
    ReadOnly,
    /// Malformed cell reference or range.
    Ref(RefError),
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Settings(msg) => write!(f, "settings parse error: {msg}"),
            Self::Snapshot(msg) => write!(f, "snapshot error: {msg}"),
            Self::PasteIntoMerge => write!(f, "Unable to paste into merged cells"),
            Self::CutSplitsMerge(range) => write!(f, "Unable to cut part of merged cells {range}"),
            Self::MergeOverlap(range) => {
                write!(f, "merge would partially overlap existing merge {range}")
            }
            Self::NoSelection => write!(f, "no cells selected"),
            Self::EmptyClipboard => write!(f, "clipboard is empty"),
            Self::ReadOnly => write!(f, "sheet is read-only"),
            Self::Ref(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for GridError {}

impl From<RefError> for GridError {
    fn from(e: RefError) -> Self {
        Self::Ref(e)
    }
}
