//! Persisted sheet state.
//!
//! `SheetData` is what undo/redo history stores and what `get_data`/`set_data`
//! exchange with callers. Encoding it and decoding it again must reproduce the
//! same value.

use serde::{Deserialize, Serialize};
use sheetgrid_core::CellRef;

use crate::auto_filter::AutoFilter;
use crate::cols::ColsData;
use crate::merges::Merges;
use crate::rows::RowsData;
use crate::style::StyleTable;
use crate::validation::Validation;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetData {
    pub name: String,
    /// Top-left cell of the scrollable pane; `A1` means no freeze.
    pub freeze: CellRef,
    pub styles: StyleTable,
    pub merges: Merges,
    pub rows: RowsData,
    pub cols: ColsData,
    pub validations: Vec<Validation>,
    pub autofilter: AutoFilter,
}

impl SheetData {
    pub fn to_json(&self) -> Result<String, crate::GridError> {
        serde_json::to_string(self).map_err(|e| crate::GridError::Snapshot(e.to_string()))
    }

    pub fn from_json(input: &str) -> Result<Self, crate::GridError> {
        serde_json::from_str(input).map_err(|e| crate::GridError::Snapshot(e.to_string()))
    }
}
