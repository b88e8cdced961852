//! Cell styles and the per-sheet interning table.
//!
//! Cells never hold a style inline; they hold an index into `StyleTable`.
//! A `Style` only records overrides (every field optional) and is resolved
//! against the sheet default when rendered.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::formula::parse_number;

/// Horizontal text alignment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

/// Vertical text alignment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VAlign {
    Top,
    #[default]
    Middle,
    Bottom,
}

/// Display format applied to the cell value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Normal,
    Text,
    Number,
    Percent,
    Rmb,
    Usd,
    Eur,
    Date,
    Time,
    Datetime,
    Duration,
}

impl Format {
    /// Display text for a rendered cell value. Number and currency formats
    /// show two decimals with thousands separators; only numeric text is
    /// decorated, everything else passes through.
    pub fn render(self, text: &str) -> String {
        let Some(n) = parse_number(text) else {
            return text.to_string();
        };
        match self {
            Format::Number => grouped(n),
            Format::Percent => format!("{}%", text.trim()),
            Format::Rmb => format!("￥{}", grouped(n)),
            Format::Usd => format!("${}", grouped(n)),
            Format::Eur => format!("€{}", grouped(n)),
            _ => text.to_string(),
        }
    }
}

/// `1234567.891` -> `1,234,567.89`
fn grouped(n: f64) -> String {
    let fixed = format!("{n:.2}");
    let (sign, unsigned) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (int, frac) = unsigned.split_once('.').unwrap_or((unsigned, "00"));
    let mut out = String::with_capacity(fixed.len() + int.len() / 3);
    out.push_str(sign);
    for (i, digit) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    out.push('.');
    out.push_str(frac);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    Thin,
    Medium,
    Thick,
    Dashed,
    Dotted,
    Double,
}

/// One border edge: `[style, color]` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BorderEdge(pub LineStyle, pub String);

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Border {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<BorderEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom: Option<BorderEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<BorderEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<BorderEdge>,
}

impl Border {
    /// Overlay `other`'s edges onto this border.
    pub fn merge(&mut self, other: &Border) {
        if other.top.is_some() {
            self.top = other.top.clone();
        }
        if other.bottom.is_some() {
            self.bottom = other.bottom.clone();
        }
        if other.left.is_some() {
            self.left = other.left.clone();
        }
        if other.right.is_some() {
            self.right = other.right.clone();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.top.is_none() && self.bottom.is_none() && self.left.is_none() && self.right.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Font {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Style {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bgcolor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<Align>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valign: Option<VAlign>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub textwrap: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strike: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<Font>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<Format>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<Border>,
}

impl Style {
    /// Fill every unset field of `self` from `base`.
    pub fn resolved(&self, base: &Style) -> Style {
        let font = match (&self.font, &base.font) {
            (Some(own), Some(fallback)) => Some(Font {
                name: own.name.clone().or_else(|| fallback.name.clone()),
                size: own.size.or(fallback.size),
                bold: own.bold.or(fallback.bold),
                italic: own.italic.or(fallback.italic),
            }),
            (own, fallback) => own.clone().or_else(|| fallback.clone()),
        };
        Style {
            bgcolor: self.bgcolor.clone().or_else(|| base.bgcolor.clone()),
            align: self.align.or(base.align),
            valign: self.valign.or(base.valign),
            textwrap: self.textwrap.or(base.textwrap),
            strike: self.strike.or(base.strike),
            underline: self.underline.or(base.underline),
            color: self.color.clone().or_else(|| base.color.clone()),
            font,
            format: self.format.or(base.format),
            border: self.border.clone().or_else(|| base.border.clone()),
        }
    }

    fn font_mut(&mut self) -> &mut Font {
        self.font.get_or_insert_with(Font::default)
    }
}

/// A single style property edit.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleAttr {
    Bold(bool),
    Italic(bool),
    FontName(String),
    FontSize(u16),
    Color(String),
    BgColor(String),
    Align(Align),
    VAlign(VAlign),
    TextWrap(bool),
    Strike(bool),
    Underline(bool),
    Format(Format),
}

impl StyleAttr {
    pub fn apply(&self, style: &mut Style) {
        match self {
            StyleAttr::Bold(v) => style.font_mut().bold = Some(*v),
            StyleAttr::Italic(v) => style.font_mut().italic = Some(*v),
            StyleAttr::FontName(v) => style.font_mut().name = Some(v.clone()),
            StyleAttr::FontSize(v) => style.font_mut().size = Some(*v),
            StyleAttr::Color(v) => style.color = Some(v.clone()),
            StyleAttr::BgColor(v) => style.bgcolor = Some(v.clone()),
            StyleAttr::Align(v) => style.align = Some(*v),
            StyleAttr::VAlign(v) => style.valign = Some(*v),
            StyleAttr::TextWrap(v) => style.textwrap = Some(*v),
            StyleAttr::Strike(v) => style.strike = Some(*v),
            StyleAttr::Underline(v) => style.underline = Some(*v),
            StyleAttr::Format(v) => style.format = Some(*v),
        }
    }
}

/// Which edges a border edit touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderMode {
    All,
    Inside,
    Outside,
    Horizontal,
    Vertical,
    Top,
    Bottom,
    Left,
    Right,
    None,
}

// ============================================================================
// Interning
// ============================================================================

/// Deduplicated style list. Equal styles always share one index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Style>", into = "Vec<Style>")]
pub struct StyleTable {
    styles: Vec<Style>,
    index: FxHashMap<Style, usize>,
}

impl StyleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of an equal style, appending `style` if none exists.
    pub fn intern(&mut self, style: Style) -> usize {
        if let Some(&idx) = self.index.get(&style) {
            return idx;
        }
        let idx = self.styles.len();
        self.index.insert(style.clone(), idx);
        self.styles.push(style);
        idx
    }

    pub fn get(&self, idx: usize) -> Option<&Style> {
        self.styles.get(idx)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Style> {
        self.styles.iter()
    }
}

impl From<Vec<Style>> for StyleTable {
    fn from(styles: Vec<Style>) -> Self {
        let mut index = FxHashMap::default();
        for (i, style) in styles.iter().enumerate() {
            index.entry(style.clone()).or_insert(i);
        }
        Self { styles, index }
    }
}

impl From<StyleTable> for Vec<Style> {
    fn from(table: StyleTable) -> Self {
        table.styles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bold() -> Style {
        let mut style = Style::default();
        StyleAttr::Bold(true).apply(&mut style);
        style
    }

    #[test]
    fn test_format_render() {
        let cases: &[(Format, &str, &str)] = &[
            (Format::Normal, "1234.5", "1234.5"),
            (Format::Text, "0012", "0012"),
            (Format::Number, "1234567.891", "1,234,567.89"),
            (Format::Number, "-1234", "-1,234.00"),
            (Format::Number, "12", "12.00"),
            (Format::Number, "0.005", "0.01"),
            (Format::Number, "abc", "abc"),
            (Format::Number, "", ""),
            (Format::Percent, "12", "12%"),
            (Format::Percent, "n/a", "n/a"),
            (Format::Rmb, "1000", "￥1,000.00"),
            (Format::Usd, "999.999", "$1,000.00"),
            (Format::Eur, "-5", "€-5.00"),
            (Format::Usd, "#DIV/0!", "#DIV/0!"),
            (Format::Date, "2024-01-02", "2024-01-02"),
        ];
        for (format, text, expected) in cases {
            assert_eq!(format.render(text), *expected, "{format:?} {text}");
        }
    }

    #[test]
    fn test_intern_dedupes_equal_styles() {
        let mut table = StyleTable::new();
        let a = table.intern(bold());
        let b = table.intern(bold());
        let c = table.intern(Style::default());
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_resolved_fills_from_default() {
        let base = Style {
            color: Some("#0a0a0a".into()),
            font: Some(Font {
                name: Some("Arial".into()),
                size: Some(10),
                bold: Some(false),
                italic: Some(false),
            }),
            ..Style::default()
        };
        let resolved = bold().resolved(&base);
        let font = resolved.font.unwrap();
        assert_eq!(font.bold, Some(true));
        assert_eq!(font.name.as_deref(), Some("Arial"));
        assert_eq!(resolved.color.as_deref(), Some("#0a0a0a"));
    }

    #[test]
    fn test_border_merge_overlays_edges() {
        let mut border = Border {
            top: Some(BorderEdge(LineStyle::Thin, "#000".into())),
            ..Border::default()
        };
        border.merge(&Border {
            bottom: Some(BorderEdge(LineStyle::Thick, "#f00".into())),
            ..Border::default()
        });
        assert!(border.top.is_some());
        assert_eq!(border.bottom, Some(BorderEdge(LineStyle::Thick, "#f00".into())));
    }

    #[test]
    fn test_table_serializes_as_list() {
        let mut table = StyleTable::new();
        table.intern(bold());
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, r#"[{"font":{"bold":true}}]"#);
        let back: StyleTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get(0), Some(&bold()));
        let mut back = back;
        assert_eq!(back.intern(bold()), 0);
    }
}
