//! Postfix evaluation.
//!
//! Errors are values: a failing branch yields `Value::Error`, which then
//! flows through operators and functions like any other value. Nothing here
//! returns `Err` or panics on bad input.
//!
//! Cell references are resolved through a `(col, row) -> text` lookup. The
//! referenced text is evaluated recursively when it is itself a formula.
//! An explicit in-progress set guards against cycles, and a depth cap
//! bounds long reference chains. Within one top-level evaluation each cell
//! is resolved once; a resolution budget bounds the rest.

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};
use sheetgrid_core::CellRef;

use super::functions;
use super::postfix::{infix_to_postfix_limited, Operator, Token, DEFAULT_MAX_RANGE_CELLS};

/// Default cap on nested reference resolution.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// In-band formula error, displayed as its sentinel text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorValue {
    /// Wrong argument type or malformed expression.
    Value,
    /// Division by zero or mean of nothing.
    Div0,
    /// Unknown function or identifier.
    Name,
    /// Circular reference or reference chain too deep.
    Circ,
    /// Reference outside the grid.
    Ref,
}

impl ErrorValue {
    /// The error a sentinel such as `#REF!` stands for.
    pub fn from_sentinel(text: &str) -> Option<ErrorValue> {
        [ErrorValue::Value, ErrorValue::Div0, ErrorValue::Name, ErrorValue::Circ, ErrorValue::Ref]
            .into_iter()
            .find(|e| e.to_string() == text)
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorValue::Value => "#VALUE!",
            ErrorValue::Div0 => "#DIV/0!",
            ErrorValue::Name => "#NAME?",
            ErrorValue::Circ => "#CIRC!",
            ErrorValue::Ref => "#REF!",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(ErrorValue),
}

impl Value {
    /// Numeric-looking text becomes a number, anything else stays text.
    pub fn from_text(text: &str) -> Value {
        match parse_number(text) {
            Some(n) => Value::Number(n),
            None => Value::Text(text.to_string()),
        }
    }

    /// The number this value *is*: a number or numeric-looking text.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => parse_number(s),
            _ => None,
        }
    }

    /// Coerce for numeric functions. Blank text is 0.
    pub fn to_number(&self) -> Result<f64, ErrorValue> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) if s.trim().is_empty() => Ok(0.0),
            Value::Text(s) => parse_number(s).ok_or(ErrorValue::Value),
            Value::Error(e) => Err(*e),
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
            Value::Boolean(b) => if *b { "TRUE".to_string() } else { "FALSE".to_string() },
            Value::Error(e) => e.to_string(),
        }
    }

    /// Strict boolean: only booleans and the words TRUE/FALSE qualify.
    pub fn to_bool(&self) -> Result<bool, ErrorValue> {
        match self {
            Value::Boolean(b) => Ok(*b),
            Value::Text(s) => {
                let upper = s.trim().to_uppercase();
                if upper == "TRUE" {
                    Ok(true)
                } else if upper == "FALSE" {
                    Ok(false)
                } else {
                    Err(ErrorValue::Value)
                }
            }
            Value::Number(_) => Err(ErrorValue::Value),
            Value::Error(e) => Err(*e),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Text(s) => !s.is_empty(),
            Value::Error(_) => false,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    fn is_blank(&self) -> bool {
        matches!(self, Value::Text(s) if s.is_empty())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Parse numeric-looking text. Words such as `inf` or `NaN` are not numbers.
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty()
        || !trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Integers print without a fraction; other values to at most 10 places.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        let fixed = format!("{n:.10}");
        fixed.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// `+ - * /` with the grid's coercion rules: blank against a number is 0,
/// anything else non-numeric degrades to the text `a<op>b`.
pub(crate) fn arith(op: Operator, a: &Value, b: &Value) -> Value {
    if let Value::Error(e) = a {
        return Value::Error(*e);
    }
    if let Value::Error(e) = b {
        return Value::Error(*e);
    }
    let (x, y) = match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => (x, y),
        (None, Some(y)) if a.is_blank() => (0.0, y),
        (Some(x), None) if b.is_blank() => (x, 0.0),
        _ => return Value::Text(format!("{}{}{}", a.to_text(), op.symbol(), b.to_text())),
    };
    match op {
        Operator::Add => Value::Number(x + y),
        Operator::Sub => Value::Number(x - y),
        Operator::Mul => Value::Number(x * y),
        Operator::Div if y == 0.0 => Value::Error(ErrorValue::Div0),
        Operator::Div => Value::Number(x / y),
        _ => Value::Error(ErrorValue::Value),
    }
}

fn compare(op: Operator, a: &Value, b: &Value) -> Value {
    if let Value::Error(e) = a {
        return Value::Error(*e);
    }
    if let Value::Error(e) = b {
        return Value::Error(*e);
    }
    let ordering = match (comparable_number(a), comparable_number(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y),
        _ => Some(a.to_text().cmp(&b.to_text())),
    };
    let Some(ordering) = ordering else {
        return Value::Boolean(false);
    };
    Value::Boolean(match op {
        Operator::Eq => ordering.is_eq(),
        Operator::Ne => ordering.is_ne(),
        Operator::Lt => ordering.is_lt(),
        Operator::Le => ordering.is_le(),
        Operator::Gt => ordering.is_gt(),
        Operator::Ge => ordering.is_ge(),
        _ => return Value::Error(ErrorValue::Value),
    })
}

fn comparable_number(v: &Value) -> Option<f64> {
    match v {
        Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
        other => other.as_number(),
    }
}

fn negate(v: Value) -> Value {
    match v.as_number() {
        Some(n) => Value::Number(-n),
        None => v,
    }
}

fn binary(op: Operator, a: Value, b: Value) -> Value {
    match op {
        Operator::Add | Operator::Sub | Operator::Mul | Operator::Div => arith(op, &a, &b),
        Operator::Concat => match (&a, &b) {
            (Value::Error(e), _) | (_, Value::Error(e)) => Value::Error(*e),
            _ => Value::Text(a.to_text() + &b.to_text()),
        },
        _ => compare(op, &a, &b),
    }
}

// ============================================================================
// Evaluator
// ============================================================================

/// Cap on cell resolutions during one top-level evaluation.
pub const DEFAULT_MAX_RESOLUTIONS: usize = 100_000;

/// Per-evaluation state: cells in progress, settled cell values, and the
/// number of resolutions spent so far.
#[derive(Default)]
pub struct EvalScope {
    active: FxHashSet<CellRef>,
    settled: FxHashMap<CellRef, Value>,
    resolutions: usize,
}

impl EvalScope {
    fn entered(cell: CellRef) -> Self {
        let mut scope = Self::default();
        scope.active.insert(cell);
        scope
    }
}

/// Evaluates formulas against a `(col, row) -> text` cell lookup.
pub struct Evaluator<'a> {
    lookup: &'a dyn Fn(usize, usize) -> String,
    max_depth: usize,
    max_range_cells: usize,
    max_resolutions: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(lookup: &'a dyn Fn(usize, usize) -> String) -> Self {
        Self {
            lookup,
            max_depth: DEFAULT_MAX_DEPTH,
            max_range_cells: DEFAULT_MAX_RANGE_CELLS,
            max_resolutions: DEFAULT_MAX_RESOLUTIONS,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_range_cells(mut self, max_range_cells: usize) -> Self {
        self.max_range_cells = max_range_cells;
        self
    }

    pub fn with_max_resolutions(mut self, max_resolutions: usize) -> Self {
        self.max_resolutions = max_resolutions;
        self
    }

    /// Evaluate raw cell text. Text without a leading `=` is a literal.
    pub fn render(&self, src: &str) -> Value {
        self.render_in(src, &mut EvalScope::default())
    }

    /// Evaluate the content of one cell, with that cell already in progress
    /// so a self-reference is caught immediately.
    pub fn evaluate_cell(&self, col: usize, row: usize) -> Value {
        let text = (self.lookup)(col, row);
        self.render_in(&text, &mut EvalScope::entered(CellRef::new(col, row)))
    }

    fn render_in(&self, src: &str, scope: &mut EvalScope) -> Value {
        match src.strip_prefix('=') {
            Some(body) => {
                let tokens = infix_to_postfix_limited(body, self.max_range_cells);
                self.eval_postfix(&tokens, scope)
            }
            None => Value::from_text(src),
        }
    }

    /// Run a postfix program. A program that does not reduce to exactly one
    /// value is malformed.
    pub fn eval_postfix(&self, tokens: &[Token], scope: &mut EvalScope) -> Value {
        let mut stack: Vec<Value> = Vec::new();
        for token in tokens {
            match token {
                Token::Operand(text) => stack.push(self.operand(text, scope)),
                Token::Str(text) => stack.push(Value::Text(text.clone())),
                Token::Op(op) => {
                    let Some(b) = stack.pop() else {
                        return Value::Error(ErrorValue::Value);
                    };
                    let value = match stack.pop() {
                        Some(a) => binary(*op, a, b),
                        None if *op == Operator::Sub => negate(b),
                        None => return Value::Error(ErrorValue::Value),
                    };
                    stack.push(value);
                }
                Token::Func { name, argc } | Token::Call { name, argc } => {
                    if stack.len() < *argc {
                        return Value::Error(ErrorValue::Value);
                    }
                    let args = stack.split_off(stack.len() - argc);
                    stack.push(functions::call(name, &args));
                }
            }
        }
        match (stack.pop(), stack.is_empty()) {
            (Some(value), true) => value,
            (None, _) => Value::Text(String::new()),
            _ => Value::Error(ErrorValue::Value),
        }
    }

    fn operand(&self, text: &str, scope: &mut EvalScope) -> Value {
        let (negative, body) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let value = if body.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
            parse_number(body).map_or(Value::Error(ErrorValue::Value), Value::Number)
        } else if body == "TRUE" {
            Value::Boolean(true)
        } else if body == "FALSE" {
            Value::Boolean(false)
        } else if let Some(error) = ErrorValue::from_sentinel(body) {
            Value::Error(error)
        } else {
            match body.parse::<CellRef>() {
                Ok(cell) => self.resolve(cell, scope),
                Err(_) => Value::Error(ErrorValue::Name),
            }
        };
        if negative {
            negate(value)
        } else {
            value
        }
    }

    fn resolve(&self, cell: CellRef, scope: &mut EvalScope) -> Value {
        if scope.active.contains(&cell) {
            return Value::Error(ErrorValue::Circ);
        }
        if let Some(value) = scope.settled.get(&cell) {
            return value.clone();
        }
        if scope.active.len() >= self.max_depth {
            log::trace!("reference chain deeper than {} at {cell}", self.max_depth);
            return Value::Error(ErrorValue::Circ);
        }
        if scope.resolutions >= self.max_resolutions {
            log::trace!("more than {} resolutions at {cell}", self.max_resolutions);
            return Value::Error(ErrorValue::Circ);
        }
        scope.resolutions += 1;
        let text = (self.lookup)(cell.col, cell.row);
        scope.active.insert(cell);
        let value = self.render_in(&text, scope);
        scope.active.remove(&cell);
        // a #CIRC! may only hold for the chain that produced it
        if value != Value::Error(ErrorValue::Circ) {
            scope.settled.insert(cell, value.clone());
        }
        value
    }
}

/// Evaluate `src` against `lookup` with the default depth cap.
pub fn render(src: &str, lookup: &dyn Fn(usize, usize) -> String) -> Value {
    Evaluator::new(lookup).render(src)
}
