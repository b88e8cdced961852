//! Core value types shared by the grid engine: A1-style cell references and
//! rectangular cell ranges.

pub mod cell_ref;
pub mod error;
pub mod range;

pub use cell_ref::{col_to_letters, letters_to_col, CellRef};
pub use error::RefError;
pub use range::CellRange;
