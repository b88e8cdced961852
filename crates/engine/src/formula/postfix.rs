//! Single-pass infix-to-postfix conversion.
//!
//! There is no separate lexer: characters are scanned once while an
//! operator stack and an output queue are maintained (shunting-yard).
//!
//! Precedence, tightest first: `* /`, `+ -`, `&`, comparisons. All binary
//! operators are left-associative.
//!
//! Function calls emit either a bare marker (`SUM(1)` -> `1 SUM`, the marker
//! consumes whatever its parentheses produced) or an explicit
//! `[NAME,argc]` call once an argument list is established by a comma, a
//! range, or a comparison inside the call. Ranges (`A1:B2`) are expanded
//! in place into every covered reference, row-major. A range covering more
//! cells than the converter's limit collapses to a single `#REF!` operand.
//!
//! `&` adjacency: an operator symbol directly following `&` is not an
//! operator but literal text (`"a" & +` concatenates `"+"`). A `-` there is
//! still a sign.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use sheetgrid_core::cell_ref::REF_ERROR;
use sheetgrid_core::CellRef;

use super::functions::Function;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Operator {
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Concat => "&",
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            Operator::Mul | Operator::Div => 4,
            Operator::Add | Operator::Sub => 3,
            Operator::Concat => 2,
            _ => 1,
        }
    }

    fn from_char(c: char) -> Option<Operator> {
        match c {
            '+' => Some(Operator::Add),
            '-' => Some(Operator::Sub),
            '*' => Some(Operator::Mul),
            '/' => Some(Operator::Div),
            '&' => Some(Operator::Concat),
            _ => None,
        }
    }

    pub fn is_comparison(self) -> bool {
        self.precedence() == 1
    }
}

/// One postfix token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Number or cell reference, possibly with a leading `-`.
    Operand(String),
    /// String literal body. Displays with a leading `"` marker.
    Str(String),
    Op(Operator),
    /// Function closed without an argument list; consumes `argc` (0 or 1) values.
    Func { name: String, argc: usize },
    /// Function with an explicit argument count.
    Call { name: String, argc: usize },
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Operand(text) => write!(f, "{text}"),
            Token::Str(text) => write!(f, "\"{text}"),
            Token::Op(op) => write!(f, "{}", op.symbol()),
            Token::Func { name, .. } => write!(f, "{name}"),
            Token::Call { name, argc } => write!(f, "[{name},{argc}]"),
        }
    }
}

enum Pending {
    Op(Operator),
    Paren,
    Function {
        name: String,
        args: usize,
        explicit: bool,
        out_mark: usize,
    },
}

/// Largest range expanded in place by default.
pub const DEFAULT_MAX_RANGE_CELLS: usize = 100_000;

/// Convert a formula body (without the leading `=`) to postfix.
pub fn infix_to_postfix(body: &str) -> Vec<Token> {
    infix_to_postfix_limited(body, DEFAULT_MAX_RANGE_CELLS)
}

/// Like [`infix_to_postfix`], with an explicit cap on range expansion.
pub fn infix_to_postfix_limited(body: &str, max_range_cells: usize) -> Vec<Token> {
    let mut conv = Converter { max_range_cells, ..Converter::default() };
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        conv.step(c, &mut chars);
    }
    conv.finish()
}

#[derive(Default)]
struct Converter {
    output: Vec<Token>,
    stack: Vec<Pending>,
    /// Identifier/number characters not yet emitted.
    run: String,
    /// Last significant character (spaces are skipped).
    prev: Option<char>,
    /// Output index of the start ref of an open `A1:` range.
    range_start: Option<usize>,
    max_range_cells: usize,
}

impl Converter {
    fn step(&mut self, c: char, chars: &mut Peekable<Chars<'_>>) {
        match c {
            ' ' => return,
            '"' => {
                self.flush_run();
                let mut literal = String::new();
                for next in chars.by_ref() {
                    if next == '"' {
                        break;
                    }
                    literal.push(next);
                }
                self.output.push(Token::Str(literal));
            }
            c if c.is_ascii_alphanumeric() || c == '.' => {
                self.run.push(c.to_ascii_uppercase());
            }
            '-' if self.run == "-" => self.run.clear(),
            '-' if self.run.is_empty() && self.operand_expected() => self.run.push('-'),
            '+' | '*' | '/' if self.prev == Some('&') => {
                self.flush_run();
                self.output.push(Token::Str(c.to_string()));
                self.prev = Some('"');
                return;
            }
            '+' if self.run.is_empty() && self.operand_expected() => return,
            '+' | '-' | '*' | '/' | '&' => {
                self.flush_run();
                if let Some(op) = Operator::from_char(c) {
                    self.push_op(op);
                }
            }
            '=' | '<' | '>' => {
                self.flush_run();
                let op = match (c, chars.peek().copied()) {
                    ('<', Some('=')) => Operator::Le,
                    ('<', Some('>')) => Operator::Ne,
                    ('>', Some('=')) => Operator::Ge,
                    ('=', Some('=')) => Operator::Eq,
                    ('<', _) => Operator::Lt,
                    ('>', _) => Operator::Gt,
                    _ => Operator::Eq,
                };
                if op.symbol().len() == 2 || matches!(chars.peek(), Some('=')) {
                    chars.next();
                }
                self.push_op(op);
                if let Some(Pending::Function { explicit, .. }) = self.innermost_call() {
                    *explicit = true;
                }
            }
            '(' => self.open_paren(),
            ')' => {
                self.flush_run();
                self.range_start = None;
                self.close_paren();
            }
            ',' => {
                self.flush_run();
                self.range_start = None;
                self.pop_ops_to_frame();
                if let Some(Pending::Function { args, explicit, .. }) = self.stack.last_mut() {
                    *args += 1;
                    *explicit = true;
                }
            }
            ':' => {
                self.flush_run();
                if matches!(self.output.last(), Some(Token::Operand(_))) {
                    self.range_start = Some(self.output.len() - 1);
                }
            }
            other => self.run.push(other),
        }
        self.prev = Some(c);
    }

    fn operand_expected(&self) -> bool {
        match self.prev {
            None => true,
            Some(c) => matches!(c, '+' | '-' | '*' | '/' | ',' | '(' | '&' | '=' | '<' | '>'),
        }
    }

    fn flush_run(&mut self) {
        if self.run.is_empty() {
            return;
        }
        self.output.push(Token::Operand(std::mem::take(&mut self.run)));
        if let Some(start) = self.range_start.take() {
            self.expand_range(start);
        }
    }

    /// Replace `start`, `end` at the tail of the output with every ref between them.
    fn expand_range(&mut self, start: usize) {
        if start + 2 != self.output.len() {
            return;
        }
        let (Token::Operand(a), Token::Operand(b)) = (&self.output[start], &self.output[start + 1])
        else {
            return;
        };
        let (Ok(a), Ok(b)) = (a.parse::<CellRef>(), b.parse::<CellRef>()) else {
            return;
        };
        let range = sheetgrid_core::CellRange::new(a.row, a.col, b.row, b.col);
        self.output.truncate(start);
        let count = if range.cell_count() > self.max_range_cells {
            log::trace!("range {range} exceeds {} cells", self.max_range_cells);
            self.output.push(Token::Operand(REF_ERROR.to_string()));
            1
        } else {
            let refs = range.refs();
            let count = refs.len();
            self.output
                .extend(refs.into_iter().map(|r| Token::Operand(r.to_string())));
            count
        };
        if let Some(Pending::Function { args, explicit, .. }) = self.innermost_call() {
            *args += count - 1;
            *explicit = true;
        }
    }

    fn push_op(&mut self, op: Operator) {
        while let Some(Pending::Op(top)) = self.stack.last() {
            if top.precedence() < op.precedence() {
                break;
            }
            let top = *top;
            self.stack.pop();
            self.output.push(Token::Op(top));
        }
        self.stack.push(Pending::Op(op));
    }

    fn open_paren(&mut self) {
        if self.run.is_empty() {
            self.stack.push(Pending::Paren);
            return;
        }
        let mut name = std::mem::take(&mut self.run);
        if name.starts_with('-') {
            // -(x) and -F(x) negate through a multiplication by -1
            name.remove(0);
            self.output.push(Token::Operand("-1".into()));
            self.push_op(Operator::Mul);
            if name.is_empty() {
                self.stack.push(Pending::Paren);
                return;
            }
        }
        self.stack.push(Pending::Function {
            name,
            args: 1,
            explicit: false,
            out_mark: self.output.len(),
        });
    }

    fn close_paren(&mut self) {
        while let Some(pending) = self.stack.pop() {
            match pending {
                Pending::Op(op) => self.output.push(Token::Op(op)),
                Pending::Paren => return,
                Pending::Function { name, args, explicit, out_mark } => {
                    self.close_function(name, args, explicit, out_mark);
                    return;
                }
            }
        }
    }

    fn close_function(&mut self, name: String, args: usize, explicit: bool, out_mark: usize) {
        let unary = Function::from_name(&name).is_some_and(Function::is_unary);
        let token = if explicit {
            Token::Call { name, argc: args }
        } else if unary {
            Token::Call { name, argc: 1 }
        } else {
            let argc = usize::from(self.output.len() > out_mark);
            Token::Func { name, argc }
        };
        self.output.push(token);
    }

    /// Emit pending operators down to (not including) the innermost paren or call.
    fn pop_ops_to_frame(&mut self) {
        while let Some(Pending::Op(op)) = self.stack.last() {
            let op = *op;
            self.stack.pop();
            self.output.push(Token::Op(op));
        }
    }

    fn innermost_call(&mut self) -> Option<&mut Pending> {
        self.stack
            .iter_mut()
            .rev()
            .find(|p| !matches!(p, Pending::Op(_)))
            .filter(|p| matches!(p, Pending::Function { .. }))
    }

    fn finish(mut self) -> Vec<Token> {
        self.flush_run();
        while let Some(pending) = self.stack.pop() {
            match pending {
                Pending::Op(op) => self.output.push(Token::Op(op)),
                Pending::Paren => {}
                Pending::Function { name, args, explicit, out_mark } => {
                    self.close_function(name, args, explicit, out_mark);
                }
            }
        }
        self.output
    }
}
