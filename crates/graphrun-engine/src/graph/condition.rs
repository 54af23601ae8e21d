//! Edge conditions: a small, closed expression language over the run state.
//!
//! ```text
//! expr    := or
//! or      := and ( ("or" | "||") and )*
//! and     := not ( ("and" | "&&") not )*
//! not     := ("not" | "!") not | cmp
//! cmp     := postfix ( ("==" | "!=" | "<" | "<=" | ">" | ">=" | "in" | "not in") postfix )?
//! postfix := primary ( "[" expr "]" | "." ident | ".get(" expr ("," expr)? ")" )*
//! primary := literal | "state" | "-" primary | "(" expr ")" | "[" (expr ("," expr)*)? "]"
//! literal := number | string | true | false | True | False | null | None
//! ```
//!
//! The only name in scope is `state`. There are no calls other than `.get`
//! on a mapping, and nothing outside the state mapping is reachable.

use std::cmp::Ordering;
use std::str::FromStr;

use serde_json::{Number, Value};
use thiserror::Error;
use tracing::debug;

use graphrun_core::types::{is_truthy, StateMap};

/// Nesting limit for parentheses, lists and `not` chains.
const MAX_DEPTH: usize = 64;

/// Upper bound on syntax tree nodes, which also bounds evaluation recursion.
const MAX_NODES: usize = 512;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConditionError {
    #[error("Unexpected end of expression")]
    UnexpectedEof,
    #[error("Unexpected token: {0}")]
    UnexpectedToken(String),
    #[error("Unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("Unterminated string literal")]
    UnterminatedString,
    #[error("Invalid number: {0}")]
    InvalidNumber(String),
    #[error("Unknown name '{0}' (only `state` is in scope)")]
    UnknownName(String),
    #[error("Expression nested too deeply")]
    TooDeep,
    #[error("Expression too large")]
    TooLarge,
    #[error("Key not found: {0}")]
    MissingKey(String),
    #[error("Index out of range: {0}")]
    IndexOutOfRange(i64),
    #[error("Type error: {0}")]
    Type(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sym {
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Minus,
    Bang,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Number(String),
    Symbol(Sym),
}

fn tokenize(input: &str) -> Result<Vec<Token>, ConditionError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        let next = chars.get(i + 1).copied();

        if ch.is_whitespace() {
            i += 1;
            continue;
        }

        if ch == '\'' || ch == '"' {
            let quote = ch;
            let mut value = String::new();
            i += 1;
            loop {
                let Some(&c) = chars.get(i) else {
                    return Err(ConditionError::UnterminatedString);
                };
                i += 1;
                if c == quote {
                    break;
                }
                if c == '\\' {
                    let Some(&escaped) = chars.get(i) else {
                        return Err(ConditionError::UnterminatedString);
                    };
                    i += 1;
                    value.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                    continue;
                }
                value.push(c);
            }
            tokens.push(Token::Str(value));
            continue;
        }

        if ch.is_ascii_digit() {
            let mut value = String::new();
            while let Some(&c) = chars.get(i) {
                let fraction_dot = c == '.'
                    && !value.contains('.')
                    && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit());
                if c.is_ascii_digit() || fraction_dot {
                    value.push(c);
                    i += 1;
                } else {
                    break;
                }
            }
            tokens.push(Token::Number(value));
            continue;
        }

        if ch.is_ascii_alphabetic() || ch == '_' {
            let mut value = String::new();
            while let Some(&c) = chars.get(i) {
                if c.is_ascii_alphanumeric() || c == '_' {
                    value.push(c);
                    i += 1;
                } else {
                    break;
                }
            }
            tokens.push(Token::Ident(value));
            continue;
        }

        let (sym, width) = match (ch, next) {
            ('=', Some('=')) => (Sym::EqEq, 2),
            ('!', Some('=')) => (Sym::NotEq, 2),
            ('<', Some('=')) => (Sym::Le, 2),
            ('>', Some('=')) => (Sym::Ge, 2),
            ('&', Some('&')) => (Sym::AndAnd, 2),
            ('|', Some('|')) => (Sym::OrOr, 2),
            ('<', _) => (Sym::Lt, 1),
            ('>', _) => (Sym::Gt, 1),
            ('!', _) => (Sym::Bang, 1),
            ('(', _) => (Sym::LParen, 1),
            (')', _) => (Sym::RParen, 1),
            ('[', _) => (Sym::LBracket, 1),
            (']', _) => (Sym::RBracket, 1),
            (',', _) => (Sym::Comma, 1),
            ('.', _) => (Sym::Dot, 1),
            ('-', _) => (Sym::Minus, 1),
            (other, _) => return Err(ConditionError::UnexpectedChar(other)),
        };
        tokens.push(Token::Symbol(sym));
        i += width;
    }

    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    State,
    List(Vec<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Field(Box<Expr>, String),
    Get {
        target: Box<Expr>,
        key: Box<Expr>,
        default: Option<Box<Expr>>,
    },
    Neg(Box<Expr>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    nodes: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            nodes: 0,
        }
    }

    fn parse_all(&mut self) -> Result<Expr, ConditionError> {
        let expr = self.parse_or()?;
        match self.peek() {
            None => Ok(expr),
            Some(token) => Err(ConditionError::UnexpectedToken(format!("{:?}", token))),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.parse_and()?;
        while self.peek_is_keyword("or") || self.peek_is(Sym::OrOr) {
            self.pos += 1;
            let right = self.parse_and()?;
            self.grow()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.parse_not()?;
        while self.peek_is_keyword("and") || self.peek_is(Sym::AndAnd) {
            self.pos += 1;
            let right = self.parse_not()?;
            self.grow()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ConditionError> {
        if self.peek_is_keyword("not") || self.peek_is(Sym::Bang) {
            self.pos += 1;
            self.enter()?;
            let inner = self.parse_not()?;
            self.depth -= 1;
            self.grow()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_cmp()
    }

    fn parse_cmp(&mut self) -> Result<Expr, ConditionError> {
        let left = self.parse_postfix()?;
        let (op, width) = match self.peek() {
            Some(Token::Symbol(Sym::EqEq)) => (CmpOp::Eq, 1),
            Some(Token::Symbol(Sym::NotEq)) => (CmpOp::Ne, 1),
            Some(Token::Symbol(Sym::Lt)) => (CmpOp::Lt, 1),
            Some(Token::Symbol(Sym::Le)) => (CmpOp::Le, 1),
            Some(Token::Symbol(Sym::Gt)) => (CmpOp::Gt, 1),
            Some(Token::Symbol(Sym::Ge)) => (CmpOp::Ge, 1),
            Some(Token::Ident(kw)) if kw == "in" => (CmpOp::In, 1),
            Some(Token::Ident(kw)) if kw == "not" && self.peek_at_is_keyword(1, "in") => {
                (CmpOp::NotIn, 2)
            }
            _ => return Ok(left),
        };
        self.pos += width;
        let right = self.parse_postfix()?;
        self.grow()?;
        Ok(Expr::Compare(op, Box::new(left), Box::new(right)))
    }

    fn parse_postfix(&mut self) -> Result<Expr, ConditionError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.peek_is(Sym::LBracket) || self.peek_is(Sym::Dot) {
                self.grow()?;
            }
            if self.peek_is(Sym::LBracket) {
                self.pos += 1;
                self.enter()?;
                let index = self.parse_or()?;
                self.depth -= 1;
                self.expect(Sym::RBracket)?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.peek_is(Sym::Dot) {
                self.pos += 1;
                let name = self.consume_ident()?;
                if name == "get" && self.peek_is(Sym::LParen) {
                    self.pos += 1;
                    self.enter()?;
                    let key = self.parse_or()?;
                    let default = if self.peek_is(Sym::Comma) {
                        self.pos += 1;
                        Some(Box::new(self.parse_or()?))
                    } else {
                        None
                    };
                    self.depth -= 1;
                    self.expect(Sym::RParen)?;
                    expr = Expr::Get {
                        target: Box::new(expr),
                        key: Box::new(key),
                        default,
                    };
                } else {
                    expr = Expr::Field(Box::new(expr), name);
                }
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ConditionError> {
        self.grow()?;
        match self.next() {
            Some(Token::Number(text)) => parse_number(&text).map(Expr::Literal),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Ident(name)) => match name.as_str() {
                "true" | "True" => Ok(Expr::Literal(Value::Bool(true))),
                "false" | "False" => Ok(Expr::Literal(Value::Bool(false))),
                "null" | "None" => Ok(Expr::Literal(Value::Null)),
                "state" => Ok(Expr::State),
                _ => Err(ConditionError::UnknownName(name)),
            },
            Some(Token::Symbol(Sym::Minus)) => {
                self.enter()?;
                let inner = self.parse_postfix()?;
                self.depth -= 1;
                Ok(Expr::Neg(Box::new(inner)))
            }
            Some(Token::Symbol(Sym::LParen)) => {
                self.enter()?;
                let inner = self.parse_or()?;
                self.depth -= 1;
                self.expect(Sym::RParen)?;
                Ok(inner)
            }
            Some(Token::Symbol(Sym::LBracket)) => {
                self.enter()?;
                let mut items = Vec::new();
                if !self.peek_is(Sym::RBracket) {
                    loop {
                        items.push(self.parse_or()?);
                        if self.peek_is(Sym::Comma) {
                            self.pos += 1;
                            continue;
                        }
                        break;
                    }
                }
                self.depth -= 1;
                self.expect(Sym::RBracket)?;
                Ok(Expr::List(items))
            }
            Some(token) => Err(ConditionError::UnexpectedToken(format!("{:?}", token))),
            None => Err(ConditionError::UnexpectedEof),
        }
    }

    fn enter(&mut self) -> Result<(), ConditionError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ConditionError::TooDeep);
        }
        Ok(())
    }

    fn grow(&mut self) -> Result<(), ConditionError> {
        self.nodes += 1;
        if self.nodes > MAX_NODES {
            return Err(ConditionError::TooLarge);
        }
        Ok(())
    }

    fn expect(&mut self, sym: Sym) -> Result<(), ConditionError> {
        match self.next() {
            Some(Token::Symbol(s)) if s == sym => Ok(()),
            Some(token) => Err(ConditionError::UnexpectedToken(format!("{:?}", token))),
            None => Err(ConditionError::UnexpectedEof),
        }
    }

    fn consume_ident(&mut self) -> Result<String, ConditionError> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            Some(token) => Err(ConditionError::UnexpectedToken(format!("{:?}", token))),
            None => Err(ConditionError::UnexpectedEof),
        }
    }

    fn peek_is(&self, sym: Sym) -> bool {
        matches!(self.peek(), Some(Token::Symbol(s)) if *s == sym)
    }

    fn peek_is_keyword(&self, keyword: &str) -> bool {
        self.peek_at_is_keyword(0, keyword)
    }

    fn peek_at_is_keyword(&self, offset: usize, keyword: &str) -> bool {
        matches!(self.tokens.get(self.pos + offset), Some(Token::Ident(v)) if v == keyword)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }
}

fn parse_number(text: &str) -> Result<Value, ConditionError> {
    if let Ok(n) = text.parse::<i64>() {
        return Ok(Value::from(n));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| ConditionError::InvalidNumber(text.to_string()))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

fn eval(expr: &Expr, state: &StateMap) -> Result<Value, ConditionError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::State => Ok(Value::Object(state.clone())),
        Expr::List(items) => items
            .iter()
            .map(|e| eval(e, state))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Expr::Index(target, index) => {
            let target = eval(target, state)?;
            let index = eval(index, state)?;
            index_value(target, &index)
        }
        Expr::Field(target, name) => match eval(target, state)? {
            Value::Object(mut map) => map
                .remove(name)
                .ok_or_else(|| ConditionError::MissingKey(name.clone())),
            other => Err(ConditionError::Type(format!(
                "cannot read field '{}' of {}",
                name,
                type_name(&other)
            ))),
        },
        Expr::Get {
            target,
            key,
            default,
        } => {
            let Value::Object(mut map) = eval(target, state)? else {
                return Err(ConditionError::Type(".get() requires a mapping".into()));
            };
            let Value::String(key) = eval(key, state)? else {
                return Err(ConditionError::Type(".get() key must be a string".into()));
            };
            match map.remove(&key) {
                Some(v) => Ok(v),
                None => match default {
                    Some(d) => eval(d, state),
                    None => Ok(Value::Null),
                },
            }
        }
        Expr::Neg(inner) => match eval(inner, state)? {
            Value::Number(n) => {
                if let Some(i) = n.as_i64().and_then(i64::checked_neg) {
                    Ok(Value::from(i))
                } else {
                    n.as_f64()
                        .and_then(|f| Number::from_f64(-f))
                        .map(Value::Number)
                        .ok_or_else(|| ConditionError::Type("cannot negate number".into()))
                }
            }
            other => Err(ConditionError::Type(format!(
                "cannot negate {}",
                type_name(&other)
            ))),
        },
        Expr::Not(inner) => Ok(Value::Bool(!is_truthy(&eval(inner, state)?))),
        // `and`/`or` yield the operand that decided the result.
        Expr::And(left, right) => {
            let left = eval(left, state)?;
            if !is_truthy(&left) {
                return Ok(left);
            }
            eval(right, state)
        }
        Expr::Or(left, right) => {
            let left = eval(left, state)?;
            if is_truthy(&left) {
                return Ok(left);
            }
            eval(right, state)
        }
        Expr::Compare(op, left, right) => {
            let left = eval(left, state)?;
            let right = eval(right, state)?;
            compare(*op, &left, &right).map(Value::Bool)
        }
    }
}

fn index_value(target: Value, index: &Value) -> Result<Value, ConditionError> {
    match (target, index) {
        (Value::Object(mut map), Value::String(key)) => map
            .remove(key)
            .ok_or_else(|| ConditionError::MissingKey(key.clone())),
        (Value::Array(mut items), Value::Number(n)) => {
            let i = n
                .as_i64()
                .ok_or_else(|| ConditionError::Type("list index must be an integer".into()))?;
            let len = items.len() as i64;
            let resolved = if i < 0 { len + i } else { i };
            if resolved < 0 || resolved >= len {
                return Err(ConditionError::IndexOutOfRange(i));
            }
            Ok(items.swap_remove(resolved as usize))
        }
        (target, index) => Err(ConditionError::Type(format!(
            "cannot index {} with {}",
            type_name(&target),
            type_name(index)
        ))),
    }
}

/// Numeric view of a value; booleans count as 0 and 1.
fn numeric(value: &Value) -> Option<Number> {
    match value {
        Value::Number(n) => Some(n.clone()),
        Value::Bool(b) => Some(Number::from(i64::from(*b))),
        _ => None,
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (numeric(left), numeric(right)) {
        (Some(a), Some(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => a.as_f64() == b.as_f64(),
        },
        _ => left == right,
    }
}

fn order(left: &Value, right: &Value) -> Result<Ordering, ConditionError> {
    if let (Some(a), Some(b)) = (numeric(left), numeric(right)) {
        let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) else {
            return Err(ConditionError::Type("non-finite number".into()));
        };
        return x
            .partial_cmp(&y)
            .ok_or_else(|| ConditionError::Type("numbers are not comparable".into()));
    }
    match (left, right) {
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => Err(ConditionError::Type(format!(
            "cannot order {} and {}",
            type_name(left),
            type_name(right)
        ))),
    }
}

fn contains(container: &Value, item: &Value) -> Result<bool, ConditionError> {
    match (container, item) {
        (Value::String(haystack), Value::String(needle)) => Ok(haystack.contains(needle.as_str())),
        (Value::Array(items), _) => Ok(items.iter().any(|v| values_equal(v, item))),
        (Value::Object(map), Value::String(key)) => Ok(map.contains_key(key)),
        _ => Err(ConditionError::Type(format!(
            "cannot test membership of {} in {}",
            type_name(item),
            type_name(container)
        ))),
    }
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<bool, ConditionError> {
    match op {
        CmpOp::Eq => Ok(values_equal(left, right)),
        CmpOp::Ne => Ok(!values_equal(left, right)),
        CmpOp::Lt => Ok(order(left, right)? == Ordering::Less),
        CmpOp::Le => Ok(order(left, right)? != Ordering::Greater),
        CmpOp::Gt => Ok(order(left, right)? == Ordering::Greater),
        CmpOp::Ge => Ok(order(left, right)? != Ordering::Less),
        CmpOp::In => contains(right, left),
        CmpOp::NotIn => contains(right, left).map(|found| !found),
    }
}

/// A parsed condition, ready to evaluate against any number of states.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    source: String,
    expr: Expr,
}

impl Condition {
    pub fn parse(source: &str) -> Result<Self, ConditionError> {
        let tokens = tokenize(source)?;
        let expr = Parser::new(tokens).parse_all()?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate to the truthiness of the expression's value.
    pub fn evaluate(&self, state: &StateMap) -> Result<bool, ConditionError> {
        eval(&self.expr, state).map(|v| is_truthy(&v))
    }
}

impl FromStr for Condition {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Parse and evaluate `expr` against `state`.
///
/// Fails closed: any parse or evaluation error yields `false`.
pub fn evaluate_condition(expr: &str, state: &StateMap) -> bool {
    match Condition::parse(expr).and_then(|c| c.evaluate(state)) {
        Ok(result) => result,
        Err(e) => {
            debug!(expr, error = %e, "Condition evaluation failed, treating as false");
            false
        }
    }
}
