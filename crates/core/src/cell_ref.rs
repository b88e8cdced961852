//! A1-style cell references.
//!
//! Columns are bijective base-26 letters (`A`..`Z`, `AA`, `AB`, ...). There is
//! no letter for zero, so every division step decrements before dividing.
//! Rows are 1-based in text and 0-based everywhere else.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::RefError;

/// Text written in place of a reference that was shifted off the grid.
pub const REF_ERROR: &str = "#REF!";

/// Convert 0-based column index to Excel-style letter(s).
pub fn col_to_letters(col: usize) -> String {
    let mut letters = Vec::new();
    let mut n = col + 1;
    while n > 0 {
        n -= 1;
        letters.push((b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    letters.iter().rev().collect()
}

/// Convert Excel-style column letters (case-insensitive) to a 0-based index.
pub fn letters_to_col(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut acc: usize = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A' + 1) as usize;
        acc = acc.checked_mul(26)?.checked_add(digit)?;
    }
    Some(acc - 1)
}

/// A single cell address. Defaults to `A1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    /// Row index (0-based). Ordered first so refs sort row-major.
    pub row: usize,
    /// Column index (0-based)
    pub col: usize,
}

impl CellRef {
    #[inline]
    pub fn new(col: usize, row: usize) -> Self {
        Self { row, col }
    }

    /// Translate by a signed delta. `None` when the result leaves the grid.
    pub fn offset(self, dcol: isize, drow: isize) -> Option<Self> {
        Some(Self {
            col: self.col.checked_add_signed(dcol)?,
            row: self.row.checked_add_signed(drow)?,
        })
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", col_to_letters(self.col), self.row + 1)
    }
}

impl FromStr for CellRef {
    type Err = RefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RefError::InvalidRef(s.to_string());
        let split = s.find(|c: char| c.is_ascii_digit()).ok_or_else(invalid)?;
        let (letters, digits) = s.split_at(split);
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let col = letters_to_col(letters).ok_or_else(invalid)?;
        let row: usize = digits.parse().map_err(|_| invalid())?;
        if row == 0 {
            return Err(invalid());
        }
        Ok(Self { row: row - 1, col })
    }
}

impl Serialize for CellRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CellRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// `"B12"` -> `(col=1, row=11)`.
pub fn parse_ref(text: &str) -> Result<(usize, usize), RefError> {
    let r: CellRef = text.parse()?;
    Ok((r.col, r.row))
}

/// `(col=1, row=11)` -> `"B12"`.
pub fn format_ref(col: usize, row: usize) -> String {
    CellRef::new(col, row).to_string()
}

/// Translate `reference` by `(dcol, drow)` when `predicate(col, row)` holds
/// for its original coordinates. Anything that does not parse is returned
/// as-is; a translation that leaves the grid yields `#REF!`.
pub fn shift_ref(
    reference: &str,
    dcol: isize,
    drow: isize,
    predicate: impl Fn(usize, usize) -> bool,
) -> String {
    let Ok(r) = reference.parse::<CellRef>() else {
        return reference.to_string();
    };
    if !predicate(r.col, r.row) {
        return reference.to_string();
    }
    match r.offset(dcol, drow) {
        Some(moved) => moved.to_string(),
        None => REF_ERROR.to_string(),
    }
}

fn ref_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b[A-Za-z]{1,3}\d+\b").expect("static pattern"))
}

/// Rewrite every reference-shaped token of a formula through `f`.
///
/// Double-quoted literals are copied verbatim, and a token directly followed
/// by `(` is a function name (`MD5(`, `LOG10(`), not a reference.
pub fn translate_refs(formula: &str, mut f: impl FnMut(&str) -> String) -> String {
    let mut out = String::with_capacity(formula.len());
    let mut rest = formula;
    while let Some(open) = rest.find('"') {
        translate_segment(&rest[..open], &mut f, &mut out);
        let after = &rest[open + 1..];
        match after.find('"') {
            Some(close) => {
                out.push_str(&rest[open..open + close + 2]);
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    translate_segment(rest, &mut f, &mut out);
    out
}

fn translate_segment(segment: &str, f: &mut impl FnMut(&str) -> String, out: &mut String) {
    let mut last = 0;
    for m in ref_pattern().find_iter(segment) {
        out.push_str(&segment[last..m.start()]);
        if segment[m.end()..].starts_with('(') {
            out.push_str(m.as_str());
        } else {
            out.push_str(&f(m.as_str()));
        }
        last = m.end();
    }
    out.push_str(&segment[last..]);
}
