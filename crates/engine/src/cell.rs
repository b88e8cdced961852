use serde::{Deserialize, Serialize};

/// A stored cell. Everything is optional; an absent cell is the same as an
/// empty default one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Raw content. Formulas start with `=`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Index into the sheet's style table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<usize>,
    /// Extra rows and columns covered when this cell anchors a merge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge: Option<(usize, usize)>,
    #[serde(default = "default_editable", skip_serializing_if = "is_editable")]
    pub editable: bool,
    /// Formula source, only set on exported rows where `text` holds the value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
}

fn default_editable() -> bool {
    true
}

fn is_editable(editable: &bool) -> bool {
    *editable
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            text: None,
            style: None,
            merge: None,
            editable: true,
            formula: None,
        }
    }
}

impl Cell {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Text or the empty string.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    pub fn is_formula(&self) -> bool {
        self.text().starts_with('=')
    }

    /// Merge span as `(rows, cols)` extra cells, `(0, 0)` when not merged.
    pub fn merge_span(&self) -> (usize, usize) {
        self.merge.unwrap_or((0, 0))
    }
}

/// What part of a cell a copy transfers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyMode {
    #[default]
    All,
    Text,
    Format,
}

/// What part of a cell a delete clears.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClearMode {
    #[default]
    All,
    Text,
    Format,
    Merge,
}
