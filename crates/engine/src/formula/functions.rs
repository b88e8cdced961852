// Built-in spreadsheet functions

use md5::{Digest, Md5};

use super::eval::{arith, ErrorValue, Value};
use super::postfix::Operator;

/// Every supported function. Lookup is by upper-case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Sum,
    Average,
    Max,
    Min,
    If,
    And,
    Or,
    Concat,
    Md5,
}

pub type FunctionImpl = fn(args: &[Value]) -> Value;

impl Function {
    pub const ALL: [Function; 9] = [
        Function::Sum,
        Function::Average,
        Function::Max,
        Function::Min,
        Function::If,
        Function::And,
        Function::Or,
        Function::Concat,
        Function::Md5,
    ];

    pub fn from_name(name: &str) -> Option<Function> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Sum => "SUM",
            Function::Average => "AVERAGE",
            Function::Max => "MAX",
            Function::Min => "MIN",
            Function::If => "IF",
            Function::And => "AND",
            Function::Or => "OR",
            Function::Concat => "CONCAT",
            Function::Md5 => "MD5",
        }
    }

    /// Unary functions always take exactly their one parenthesized value.
    pub fn is_unary(self) -> bool {
        matches!(self, Function::Md5)
    }

    fn handler(self) -> FunctionImpl {
        match self {
            Function::Sum => sum,
            Function::Average => average,
            Function::Max => max,
            Function::Min => min,
            Function::If => if_fn,
            Function::And => and,
            Function::Or => or,
            Function::Concat => concat,
            Function::Md5 => md5_hex,
        }
    }

    pub fn call(self, args: &[Value]) -> Value {
        (self.handler())(args)
    }
}

/// Call `name`, or `#NAME?` when no such function exists.
pub fn call(name: &str, args: &[Value]) -> Value {
    match Function::from_name(name) {
        Some(f) => f.call(args),
        None => Value::Error(ErrorValue::Name),
    }
}

fn first_error(args: &[Value]) -> Option<Value> {
    args.iter().find(|v| v.is_error()).cloned()
}

fn numbers(args: &[Value]) -> Result<Vec<f64>, ErrorValue> {
    args.iter().map(Value::to_number).collect()
}

/// Folds with `+` from 0, so text degrades to concatenation like the operator does.
pub fn sum(args: &[Value]) -> Value {
    args.iter()
        .fold(Value::Number(0.0), |acc, v| arith(Operator::Add, &acc, v))
}

pub fn average(args: &[Value]) -> Value {
    if args.is_empty() {
        return Value::Error(ErrorValue::Div0);
    }
    match numbers(args) {
        Ok(ns) => Value::Number(ns.iter().sum::<f64>() / ns.len() as f64),
        Err(e) => Value::Error(e),
    }
}

pub fn max(args: &[Value]) -> Value {
    extreme(args, f64::max)
}

pub fn min(args: &[Value]) -> Value {
    extreme(args, f64::min)
}

fn extreme(args: &[Value], pick: fn(f64, f64) -> f64) -> Value {
    match numbers(args) {
        Ok(ns) => ns
            .into_iter()
            .reduce(pick)
            .map(Value::Number)
            .unwrap_or(Value::Error(ErrorValue::Value)),
        Err(e) => Value::Error(e),
    }
}

pub fn if_fn(args: &[Value]) -> Value {
    let [cond, rest @ ..] = args else {
        return Value::Error(ErrorValue::Value);
    };
    if rest.is_empty() || rest.len() > 2 {
        return Value::Error(ErrorValue::Value);
    }
    match cond.to_bool() {
        Ok(true) => rest[0].clone(),
        Ok(false) => rest.get(1).cloned().unwrap_or(Value::Boolean(false)),
        Err(e) => Value::Error(e),
    }
}

pub fn and(args: &[Value]) -> Value {
    if args.is_empty() {
        return Value::Error(ErrorValue::Value);
    }
    first_error(args).unwrap_or_else(|| Value::Boolean(args.iter().all(Value::is_truthy)))
}

pub fn or(args: &[Value]) -> Value {
    if args.is_empty() {
        return Value::Error(ErrorValue::Value);
    }
    first_error(args).unwrap_or_else(|| Value::Boolean(args.iter().any(Value::is_truthy)))
}

pub fn concat(args: &[Value]) -> Value {
    first_error(args).unwrap_or_else(|| Value::Text(args.iter().map(Value::to_text).collect()))
}

pub fn md5_hex(args: &[Value]) -> Value {
    match args {
        [Value::Error(e)] => Value::Error(*e),
        [v] => Value::Text(format!("{:x}", Md5::digest(v.to_text().as_bytes()))),
        _ => Value::Error(ErrorValue::Value),
    }
}
