use serde::{Deserialize, Serialize};

use crate::error::GridError;
use crate::formula::eval::DEFAULT_MAX_DEPTH;
use crate::formula::postfix::DEFAULT_MAX_RANGE_CELLS;
use crate::style::{Align, Font, Format, Style, VAlign};

// ---------------------------------------------------------------------------
// Sheet settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Edit,
    /// Every mutation is refused.
    Read,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowSettings {
    pub len: usize,
    pub height: f64,
}

impl Default for RowSettings {
    fn default() -> Self {
        Self { len: 100, height: 25.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColSettings {
    pub len: usize,
    pub width: f64,
    /// Width of the row-number gutter.
    pub index_width: f64,
    pub min_width: f64,
}

impl Default for ColSettings {
    fn default() -> Self {
        Self {
            len: 26,
            width: 100.0,
            index_width: 60.0,
            min_width: 60.0,
        }
    }
}

/// Sheet-level configuration. Every field has a default, so partial
/// documents are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetSettings {
    pub mode: Mode,
    pub rows: RowSettings,
    pub cols: ColSettings,
    /// Base style every cell style is resolved against.
    pub style: Style,
    /// Longest reference chain followed while evaluating a formula.
    pub max_eval_depth: usize,
    /// Largest range a formula may expand; bigger ranges evaluate to `#REF!`.
    pub max_range_cells: usize,
}

pub fn default_style() -> Style {
    Style {
        bgcolor: Some("#ffffff".to_string()),
        align: Some(Align::Left),
        valign: Some(VAlign::Middle),
        textwrap: Some(false),
        strike: Some(false),
        underline: Some(false),
        color: Some("#0a0a0a".to_string()),
        font: Some(Font {
            name: Some("Arial".to_string()),
            size: Some(10),
            bold: Some(false),
            italic: Some(false),
        }),
        format: Some(Format::Normal),
        border: None,
    }
}

impl Default for SheetSettings {
    fn default() -> Self {
        Self {
            mode: Mode::Edit,
            rows: RowSettings::default(),
            cols: ColSettings::default(),
            style: default_style(),
            max_eval_depth: DEFAULT_MAX_DEPTH,
            max_range_cells: DEFAULT_MAX_RANGE_CELLS,
        }
    }
}

impl SheetSettings {
    pub fn from_toml(input: &str) -> Result<Self, GridError> {
        let settings: SheetSettings =
            toml::from_str(input).map_err(|e| GridError::Settings(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json(input: &str) -> Result<Self, GridError> {
        let settings: SheetSettings =
            serde_json::from_str(input).map_err(|e| GridError::Settings(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), GridError> {
        if self.rows.height <= 0.0 || self.cols.width <= 0.0 {
            return Err(GridError::Settings(
                "default row height and column width must be positive".to_string(),
            ));
        }
        if self.cols.min_width > self.cols.width {
            return Err(GridError::Settings(format!(
                "min_width {} exceeds default width {}",
                self.cols.min_width, self.cols.width
            )));
        }
        if self.max_eval_depth == 0 {
            return Err(GridError::Settings("max_eval_depth must be at least 1".to_string()));
        }
        if self.max_range_cells == 0 {
            return Err(GridError::Settings("max_range_cells must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn is_read_only(&self) -> bool {
        self.mode == Mode::Read
    }
}
