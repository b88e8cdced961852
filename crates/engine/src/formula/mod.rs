// Formula conversion and evaluation

pub mod eval;
pub mod functions;
pub mod postfix;

pub use eval::{format_number, parse_number, render, ErrorValue, EvalScope, Evaluator, Value};
pub use functions::Function;
pub use postfix::{infix_to_postfix, infix_to_postfix_limited, Operator, Token, DEFAULT_MAX_RANGE_CELLS};
