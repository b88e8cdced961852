use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefError {
    /// Text is not a valid `A1`-style cell reference.
    InvalidRef(String),
    /// Text is not a valid `A1:B2`-style range.
    InvalidRange(String),
}

impl fmt::Display for RefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRef(text) => write!(f, "invalid cell reference: '{text}'"),
            Self::InvalidRange(text) => write!(f, "invalid cell range: '{text}'"),
        }
    }
}

impl std::error::Error for RefError {}
