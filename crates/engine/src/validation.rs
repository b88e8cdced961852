//! Data Validation for cells
//!
//! Each rule applies to a list of ranges and constrains what may be typed
//! into them: a date, a number, one of a list of values, a phone number or
//! an email address, optionally compared against bounds.
//!
//! Validation never blocks an edit. Failures are recorded per cell and read
//! back with [`Validations::error_at`] so the renderer can flag the cell.
//!
//! ## Case Sensitivity
//!
//! List matching is case-sensitive. "Yes" != "yes".

use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use sheetgrid_core::CellRange;

use crate::formula::parse_number;

/// Date format accepted by date rules.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// Core Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidatorType {
    Date,
    Number,
    List,
    Phone,
    Email,
}

/// Comparison applied after the type check. `be`/`nbe` are aliases of
/// `b`/`nb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOperator {
    #[serde(rename = "b")]
    Between,
    #[serde(rename = "nb")]
    NotBetween,
    #[serde(rename = "eq")]
    EqualTo,
    #[serde(rename = "neq")]
    NotEqualTo,
    #[serde(rename = "lt")]
    LessThan,
    #[serde(rename = "lte")]
    LessThanOrEqual,
    #[serde(rename = "gt")]
    GreaterThan,
    #[serde(rename = "gte")]
    GreaterThanOrEqual,
    #[serde(rename = "be")]
    BetweenAlias,
    #[serde(rename = "nbe")]
    NotBetweenAlias,
}

/// Why a value was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Required,
    NotMatch,
    NotIn,
    Between(String, String),
    NotBetween(String, String),
    Equal(String),
    NotEqual(String),
    LessThan(String),
    LessThanEqual(String),
    GreaterThan(String),
    GreaterThanEqual(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "it is required"),
            Self::NotMatch => write!(f, "it not match its validity rule"),
            Self::NotIn => write!(f, "it is not in list"),
            Self::Between(min, max) => write!(f, "it is between {min} and {max}"),
            Self::NotBetween(min, max) => write!(f, "it is not between {min} and {max}"),
            Self::Equal(v) => write!(f, "it equal to {v}"),
            Self::NotEqual(v) => write!(f, "it not equal to {v}"),
            Self::LessThan(v) => write!(f, "it less than {v}"),
            Self::LessThanEqual(v) => write!(f, "it less than or equal to {v}"),
            Self::GreaterThan(v) => write!(f, "it greater than {v}"),
            Self::GreaterThanEqual(v) => write!(f, "it greater than or equal to {v}"),
        }
    }
}

impl std::error::Error for ValidationError {}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[1-9]\d{10}$").expect("static pattern"))
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\w+([-+.]\w+)*@\w+([-.]\w+)*\.\w+([-.]\w+)*$").expect("static pattern")
    })
}

fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// A typed value that can be ordered against a rule's bounds.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
enum Key {
    Date(NaiveDate),
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validator {
    #[serde(rename = "type")]
    pub kind: ValidatorType,
    #[serde(default)]
    pub required: bool,
    /// Comparison value, `"min,max"` for between operators, or the
    /// comma-separated choices of a list rule.
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<ComparisonOperator>,
}

impl Validator {
    pub fn new(
        kind: ValidatorType,
        required: bool,
        value: impl Into<String>,
        operator: Option<ComparisonOperator>,
    ) -> Self {
        Self {
            kind,
            required,
            value: value.into(),
            operator,
        }
    }

    /// List choices.
    pub fn values(&self) -> Vec<&str> {
        self.value.split(',').collect()
    }

    fn parse(&self, text: &str) -> Option<Key> {
        let text = text.trim();
        match self.kind {
            ValidatorType::Date => NaiveDate::parse_from_str(text, DATE_FORMAT).ok().map(Key::Date),
            ValidatorType::Number => parse_number(text).map(Key::Number),
            _ => Some(Key::Text(text.to_string())),
        }
    }

    /// Does `text` have the right shape for this rule's type?
    fn matches_type(&self, text: &str) -> bool {
        match self.kind {
            ValidatorType::Phone => phone_pattern().is_match(text),
            ValidatorType::Email => email_pattern().is_match(text),
            ValidatorType::Date | ValidatorType::Number => self.parse(text).is_some(),
            ValidatorType::List => true,
        }
    }

    pub fn validate(&self, text: &str) -> Result<(), ValidationError> {
        if is_blank(text) {
            return if self.required {
                Err(ValidationError::Required)
            } else {
                Ok(())
            };
        }
        if !self.matches_type(text) {
            return Err(ValidationError::NotMatch);
        }
        if self.kind == ValidatorType::List {
            return if self.values().contains(&text) {
                Ok(())
            } else {
                Err(ValidationError::NotIn)
            };
        }
        let Some(operator) = self.operator else {
            return Ok(());
        };
        // Unparseable bounds do not restrict.
        let Some(x) = self.parse(text) else {
            return Ok(());
        };
        let cmp = |bound: &str| self.parse(bound).and_then(|b| x.partial_cmp(&b));
        let check = |ok: fn(Ordering) -> bool, err: fn(String) -> ValidationError| match cmp(&self.value) {
            Some(ord) if !ok(ord) => Err(err(self.value.clone())),
            _ => Ok(()),
        };
        match operator {
            ComparisonOperator::Between | ComparisonOperator::BetweenAlias
            | ComparisonOperator::NotBetween | ComparisonOperator::NotBetweenAlias => {
                let value = self.value.as_str();
                let (min, max) = value.split_once(',').unwrap_or((value, value));
                let (Some(lo), Some(hi)) = (cmp(min), cmp(max)) else {
                    return Ok(());
                };
                let inside = lo.is_ge() && hi.is_le();
                let between = matches!(
                    operator,
                    ComparisonOperator::Between | ComparisonOperator::BetweenAlias
                );
                match (between, inside) {
                    (true, false) => Err(ValidationError::Between(min.into(), max.into())),
                    (false, true) => Err(ValidationError::NotBetween(min.into(), max.into())),
                    _ => Ok(()),
                }
            }
            ComparisonOperator::EqualTo => check(Ordering::is_eq, ValidationError::Equal),
            ComparisonOperator::NotEqualTo => check(Ordering::is_ne, ValidationError::NotEqual),
            ComparisonOperator::LessThan => check(Ordering::is_lt, ValidationError::LessThan),
            ComparisonOperator::LessThanOrEqual => check(Ordering::is_le, ValidationError::LessThanEqual),
            ComparisonOperator::GreaterThan => check(Ordering::is_gt, ValidationError::GreaterThan),
            ComparisonOperator::GreaterThanOrEqual => {
                check(Ordering::is_ge, ValidationError::GreaterThanEqual)
            }
        }
    }
}

// ============================================================================
// Rules and store
// ============================================================================

/// One rule and the ranges it applies to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    pub refs: Vec<CellRange>,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(flatten)]
    pub validator: Validator,
}

fn default_mode() -> String {
    "cell".to_string()
}

impl Validation {
    pub fn new(mode: impl Into<String>, refs: Vec<CellRange>, validator: Validator) -> Self {
        Self {
            refs,
            mode: mode.into(),
            validator,
        }
    }

    pub fn includes(&self, ri: usize, ci: usize) -> bool {
        self.refs.iter().any(|r| r.includes(ri, ci))
    }

    pub fn add_ref(&mut self, range: CellRange) {
        self.remove(&range);
        self.refs.push(range);
    }

    /// Cut `range` out of every ref.
    pub fn remove(&mut self, range: &CellRange) {
        self.refs = self.refs.iter().flat_map(|r| r.difference(range)).collect();
    }
}

#[derive(Debug, Clone, Default)]
pub struct Validations {
    rules: Vec<Validation>,
    errors: FxHashMap<(usize, usize), ValidationError>,
}

impl Validations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Validation> {
        self.rules.iter()
    }

    /// Attach `validator` to `range`. A rule equal to an existing one joins it.
    pub fn add(&mut self, mode: &str, range: CellRange, validator: Validator) {
        match self.rules.iter_mut().find(|v| v.validator == validator) {
            Some(existing) => existing.add_ref(range),
            None => self.rules.push(Validation::new(mode, vec![range], validator)),
        }
    }

    /// First rule covering `(ri, ci)`.
    pub fn get(&self, ri: usize, ci: usize) -> Option<&Validation> {
        self.rules.iter().find(|v| v.includes(ri, ci))
    }

    pub fn remove(&mut self, range: &CellRange) {
        for rule in &mut self.rules {
            rule.remove(range);
        }
    }

    /// Check `text` against the rule covering the cell and record the outcome.
    pub fn validate(&mut self, ri: usize, ci: usize, text: &str) -> bool {
        let outcome = self.get(ri, ci).map(|v| v.validator.validate(text));
        match outcome {
            Some(Err(e)) => {
                self.errors.insert((ri, ci), e);
                false
            }
            _ => {
                self.errors.remove(&(ri, ci));
                true
            }
        }
    }

    pub fn error_at(&self, ri: usize, ci: usize) -> Option<&ValidationError> {
        self.errors.get(&(ri, ci))
    }

    /// Rules that still cover something.
    pub fn data(&self) -> Vec<Validation> {
        self.rules.iter().filter(|v| !v.refs.is_empty()).cloned().collect()
    }

    pub fn set_data(&mut self, rules: Vec<Validation>) {
        self.rules = rules;
        self.errors.clear();
    }
}
