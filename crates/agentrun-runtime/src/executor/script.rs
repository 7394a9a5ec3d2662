//! Expression evaluator backing the sandboxed executor.
//!
//! A deliberately small language: literals, the `payload` binding,
//! property/index access, arithmetic, comparison, and boolean logic.
//! There are no function calls, no module loading, no host bindings of any
//! kind. Untrusted code cannot name anything outside its own payload.
//! Evaluation is bounded by a step budget and a nesting depth cap.

use serde_json::{Map, Value};
use thiserror::Error;

/// Bounds on one evaluation.
#[derive(Debug, Clone)]
pub struct EvalLimits {
    /// Maximum evaluation steps (one per visited node).
    pub max_steps: u64,
    /// Maximum expression nesting depth.
    pub max_depth: usize,
}

impl Default for EvalLimits {
    fn default() -> Self {
        Self {
            max_steps: 10_000,
            max_depth: 64,
        }
    }
}

/// Errors from parsing or evaluating sandboxed code.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    /// The source is not a valid expression.
    #[error("parse error: {0}")]
    Parse(String),

    /// The code attempted something the sandbox forbids.
    #[error("sandbox violation: {0}")]
    Violation(String),

    /// The expression is valid but cannot be evaluated.
    #[error("evaluation error: {0}")]
    Eval(String),

    /// The step budget or depth cap was exhausted.
    #[error("evaluation budget exhausted")]
    Budget,
}

/// Evaluate `code` with `payload` as the only readable binding.
pub fn evaluate(code: &str, payload: &Value, limits: &EvalLimits) -> Result<Value, ScriptError> {
    let tokens = lex(code)?;
    let expr = Parser::new(tokens, limits.max_depth).parse()?;
    let mut steps = 0u64;
    eval(&expr, payload, limits, &mut steps)
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    AndAnd,
    OrOr,
}

fn lex(source: &str) -> Result<Vec<Token>, ScriptError> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '0'..='9' => {
                let mut text = String::new();
                let mut is_float = false;
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        text.push(d);
                        chars.next();
                    } else if d == '.' && !is_float {
                        // Only a digit after the dot makes this a float;
                        // otherwise it is member access on a number.
                        let mut ahead = chars.clone();
                        ahead.next();
                        if ahead.peek().map(|n| n.is_ascii_digit()).unwrap_or(false) {
                            is_float = true;
                            text.push(d);
                            chars.next();
                        } else {
                            break;
                        }
                    } else {
                        break;
                    }
                }
                if is_float {
                    let value = text
                        .parse::<f64>()
                        .map_err(|_| ScriptError::Parse(format!("bad number literal: {text}")))?;
                    tokens.push(Token::Float(value));
                } else {
                    let value = text
                        .parse::<i64>()
                        .map_err(|_| ScriptError::Parse(format!("bad number literal: {text}")))?;
                    tokens.push(Token::Int(value));
                }
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some(ch) if ch == quote => break,
                        Some('\\') => match chars.next() {
                            Some('n') => text.push('\n'),
                            Some('t') => text.push('\t'),
                            Some(other) => text.push(other),
                            None => {
                                return Err(ScriptError::Parse(
                                    "unterminated string literal".to_string(),
                                ))
                            }
                        },
                        Some(ch) => text.push(ch),
                        None => {
                            return Err(ScriptError::Parse(
                                "unterminated string literal".to_string(),
                            ))
                        }
                    }
                }
                tokens.push(Token::Str(text));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        name.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(name));
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '[' => {
                chars.next();
                tokens.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(Token::RBracket);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '%' => {
                chars.next();
                tokens.push(Token::Percent);
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::NotEq);
                } else {
                    tokens.push(Token::Bang);
                }
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::EqEq);
                } else {
                    return Err(ScriptError::Parse(
                        "assignment is not supported".to_string(),
                    ));
                }
            }
            '<' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::LtEq);
                } else {
                    tokens.push(Token::Lt);
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::GtEq);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '&' => {
                chars.next();
                if chars.peek() == Some(&'&') {
                    chars.next();
                    tokens.push(Token::AndAnd);
                } else {
                    return Err(ScriptError::Parse("expected '&&'".to_string()));
                }
            }
            '|' => {
                chars.next();
                if chars.peek() == Some(&'|') {
                    chars.next();
                    tokens.push(Token::OrOr);
                } else {
                    return Err(ScriptError::Parse("expected '||'".to_string()));
                }
            }
            other => {
                return Err(ScriptError::Parse(format!("unexpected character: {other}")));
            }
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
    Ident(String),
    Array(Vec<Expr>),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>, max_depth: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            max_depth,
        }
    }

    fn parse(mut self) -> Result<Expr, ScriptError> {
        if self.tokens.is_empty() {
            return Err(ScriptError::Parse("empty expression".to_string()));
        }
        let expr = self.parse_or()?;
        if self.pos < self.tokens.len() {
            return Err(ScriptError::Parse(format!(
                "unexpected trailing token: {:?}",
                self.tokens[self.pos]
            )));
        }
        Ok(expr)
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

    fn expect(&mut self, expected: Token) -> Result<(), ScriptError> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(ScriptError::Parse(format!(
                "expected {:?}, found {:?}",
                expected, token
            ))),
            None => Err(ScriptError::Parse(format!(
                "expected {:?}, found end of input",
                expected
            ))),
        }
    }

    fn enter(&mut self) -> Result<(), ScriptError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ScriptError::Budget);
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn parse_or(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::OrOr) {
            self.next();
            let right = self.parse_and()?;
            left = Expr::Binary(BinOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.parse_equality()?;
        while self.peek() == Some(&Token::AndAnd) {
            self.next();
            let right = self.parse_equality()?;
            left = Expr::Binary(BinOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinOp::Eq,
                Some(Token::NotEq) => BinOp::Ne,
                _ => break,
            };
            self.next();
            let right = self.parse_comparison()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinOp::Lt,
                Some(Token::LtEq) => BinOp::Le,
                Some(Token::Gt) => BinOp::Gt,
                Some(Token::GtEq) => BinOp::Ge,
                _ => break,
            };
            self.next();
            let right = self.parse_additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.next();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Rem,
                _ => break,
            };
            self.next();
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ScriptError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.next();
                self.enter()?;
                let inner = self.parse_unary()?;
                self.leave();
                Ok(Expr::Neg(Box::new(inner)))
            }
            Some(Token::Bang) => {
                self.next();
                self.enter()?;
                let inner = self.parse_unary()?;
                self.leave();
                Ok(Expr::Not(Box::new(inner)))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.next();
                    match self.next() {
                        Some(Token::Ident(name)) => {
                            expr = Expr::Member(Box::new(expr), name);
                        }
                        other => {
                            return Err(ScriptError::Parse(format!(
                                "expected property name after '.', found {:?}",
                                other
                            )));
                        }
                    }
                }
                Some(Token::LBracket) => {
                    self.next();
                    self.enter()?;
                    let index = self.parse_or()?;
                    self.leave();
                    self.expect(Token::RBracket)?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                Some(Token::LParen) => {
                    // The sandbox has no callable bindings; any call form is
                    // an attempt to reach outside it.
                    return Err(ScriptError::Violation(
                        "function calls are not permitted".to_string(),
                    ));
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ScriptError> {
        match self.next() {
            Some(Token::Int(value)) => Ok(Expr::Int(value)),
            Some(Token::Float(value)) => Ok(Expr::Float(value)),
            Some(Token::Str(value)) => Ok(Expr::Str(value)),
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                "null" | "undefined" => Ok(Expr::Null),
                _ => Ok(Expr::Ident(name)),
            },
            Some(Token::LParen) => {
                self.enter()?;
                let expr = self.parse_or()?;
                self.leave();
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Some(Token::LBracket) => {
                self.enter()?;
                let mut elements = Vec::new();
                if self.peek() != Some(&Token::RBracket) {
                    loop {
                        elements.push(self.parse_or()?);
                        match self.peek() {
                            Some(Token::Comma) => {
                                self.next();
                            }
                            _ => break,
                        }
                    }
                }
                self.leave();
                self.expect(Token::RBracket)?;
                Ok(Expr::Array(elements))
            }
            other => Err(ScriptError::Parse(format!(
                "unexpected token: {:?}",
                other
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

fn eval(
    expr: &Expr,
    payload: &Value,
    limits: &EvalLimits,
    steps: &mut u64,
) -> Result<Value, ScriptError> {
    *steps += 1;
    if *steps > limits.max_steps {
        return Err(ScriptError::Budget);
    }

    match expr {
        Expr::Int(value) => Ok(Value::from(*value)),
        Expr::Float(value) => float_value(*value),
        Expr::Str(value) => Ok(Value::String(value.clone())),
        Expr::Bool(value) => Ok(Value::Bool(*value)),
        Expr::Null => Ok(Value::Null),
        Expr::Ident(name) => {
            if name == "payload" {
                Ok(payload.clone())
            } else {
                Err(ScriptError::Violation(format!(
                    "identifier '{name}' is not available"
                )))
            }
        }
        Expr::Array(elements) => {
            let mut values = Vec::with_capacity(elements.len());
            for element in elements {
                values.push(eval(element, payload, limits, steps)?);
            }
            Ok(Value::Array(values))
        }
        Expr::Member(object, name) => {
            let object = eval(object, payload, limits, steps)?;
            member(&object, name)
        }
        Expr::Index(object, index) => {
            let object = eval(object, payload, limits, steps)?;
            let index = eval(index, payload, limits, steps)?;
            indexed(&object, &index)
        }
        Expr::Neg(inner) => {
            let value = eval(inner, payload, limits, steps)?;
            match as_number(&value) {
                Some(Num::Int(i)) => match i.checked_neg() {
                    Some(negated) => Ok(Value::from(negated)),
                    None => float_value(-(i as f64)),
                },
                Some(Num::Float(f)) => float_value(-f),
                None => Err(ScriptError::Eval(format!(
                    "cannot negate {}",
                    type_name(&value)
                ))),
            }
        }
        Expr::Not(inner) => {
            let value = eval(inner, payload, limits, steps)?;
            Ok(Value::Bool(!is_truthy(&value)))
        }
        Expr::Binary(op, left, right) => {
            // Short-circuit boolean operators before evaluating the rhs.
            if *op == BinOp::And {
                let lhs = eval(left, payload, limits, steps)?;
                if !is_truthy(&lhs) {
                    return Ok(Value::Bool(false));
                }
                let rhs = eval(right, payload, limits, steps)?;
                return Ok(Value::Bool(is_truthy(&rhs)));
            }
            if *op == BinOp::Or {
                let lhs = eval(left, payload, limits, steps)?;
                if is_truthy(&lhs) {
                    return Ok(Value::Bool(true));
                }
                let rhs = eval(right, payload, limits, steps)?;
                return Ok(Value::Bool(is_truthy(&rhs)));
            }

            let lhs = eval(left, payload, limits, steps)?;
            let rhs = eval(right, payload, limits, steps)?;
            binary(*op, &lhs, &rhs)
        }
    }
}

enum Num {
    Int(i64),
    Float(f64),
}

fn as_number(value: &Value) -> Option<Num> {
    let number = value.as_number()?;
    if let Some(i) = number.as_i64() {
        Some(Num::Int(i))
    } else {
        number.as_f64().map(Num::Float)
    }
}

fn float_value(f: f64) -> Result<Value, ScriptError> {
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| ScriptError::Eval("non-finite numeric result".to_string()))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn member(object: &Value, name: &str) -> Result<Value, ScriptError> {
    match object {
        Value::Object(map) => Ok(map.get(name).cloned().unwrap_or(Value::Null)),
        Value::Array(items) if name == "length" => Ok(Value::from(items.len() as i64)),
        Value::String(s) if name == "length" => Ok(Value::from(s.chars().count() as i64)),
        other => Err(ScriptError::Eval(format!(
            "cannot read property '{name}' of {}",
            type_name(other)
        ))),
    }
}

fn indexed(object: &Value, index: &Value) -> Result<Value, ScriptError> {
    match (object, index) {
        (Value::Array(items), Value::Number(n)) => {
            let i = n
                .as_i64()
                .ok_or_else(|| ScriptError::Eval("array index must be an integer".to_string()))?;
            if i < 0 {
                return Ok(Value::Null);
            }
            Ok(items.get(i as usize).cloned().unwrap_or(Value::Null))
        }
        (Value::Object(map), Value::String(key)) => {
            Ok(map.get(key).cloned().unwrap_or(Value::Null))
        }
        (other, _) => Err(ScriptError::Eval(format!(
            "cannot index into {}",
            type_name(other)
        ))),
    }
}

fn binary(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, ScriptError> {
    match op {
        BinOp::Add => add(lhs, rhs),
        BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => arithmetic(op, lhs, rhs),
        BinOp::Eq => Ok(Value::Bool(loose_eq(lhs, rhs))),
        BinOp::Ne => Ok(Value::Bool(!loose_eq(lhs, rhs))),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => compare(op, lhs, rhs),
        BinOp::And | BinOp::Or => unreachable!("short-circuited in eval"),
    }
}

fn add(lhs: &Value, rhs: &Value) -> Result<Value, ScriptError> {
    if let (Some(a), Some(b)) = (as_number(lhs), as_number(rhs)) {
        return match (a, b) {
            (Num::Int(a), Num::Int(b)) => match a.checked_add(b) {
                Some(sum) => Ok(Value::from(sum)),
                None => float_value(a as f64 + b as f64),
            },
            (a, b) => float_value(to_f64(a) + to_f64(b)),
        };
    }
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
        (Value::String(a), b) if b.is_number() || b.is_boolean() => {
            Ok(Value::String(format!("{a}{b}")))
        }
        (a, Value::String(b)) if a.is_number() || a.is_boolean() => {
            Ok(Value::String(format!("{a}{b}")))
        }
        (a, b) => Err(ScriptError::Eval(format!(
            "cannot add {} and {}",
            type_name(a),
            type_name(b)
        ))),
    }
}

fn arithmetic(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, ScriptError> {
    let (a, b) = match (as_number(lhs), as_number(rhs)) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(ScriptError::Eval(format!(
                "arithmetic requires numbers, got {} and {}",
                type_name(lhs),
                type_name(rhs)
            )));
        }
    };

    if let (Num::Int(a), Num::Int(b)) = (&a, &b) {
        let (a, b) = (*a, *b);
        match op {
            BinOp::Sub => {
                if let Some(value) = a.checked_sub(b) {
                    return Ok(Value::from(value));
                }
            }
            BinOp::Mul => {
                if let Some(value) = a.checked_mul(b) {
                    return Ok(Value::from(value));
                }
            }
            BinOp::Div => {
                if b == 0 {
                    return Err(ScriptError::Eval("division by zero".to_string()));
                }
                if a % b == 0 {
                    return Ok(Value::from(a / b));
                }
            }
            BinOp::Rem => {
                if b == 0 {
                    return Err(ScriptError::Eval("division by zero".to_string()));
                }
                return Ok(Value::from(a % b));
            }
            _ => unreachable!(),
        }
    }

    let (a, b) = (to_f64(a), to_f64(b));
    match op {
        BinOp::Sub => float_value(a - b),
        BinOp::Mul => float_value(a * b),
        BinOp::Div => {
            if b == 0.0 {
                Err(ScriptError::Eval("division by zero".to_string()))
            } else {
                float_value(a / b)
            }
        }
        BinOp::Rem => {
            if b == 0.0 {
                Err(ScriptError::Eval("division by zero".to_string()))
            } else {
                float_value(a % b)
            }
        }
        _ => unreachable!(),
    }
}

fn to_f64(n: Num) -> f64 {
    match n {
        Num::Int(i) => i as f64,
        Num::Float(f) => f,
    }
}

fn loose_eq(lhs: &Value, rhs: &Value) -> bool {
    if let (Some(a), Some(b)) = (as_number(lhs), as_number(rhs)) {
        return to_f64(a) == to_f64(b);
    }
    lhs == rhs
}

fn compare(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, ScriptError> {
    let ordering = if let (Some(a), Some(b)) = (as_number(lhs), as_number(rhs)) {
        to_f64(a)
            .partial_cmp(&to_f64(b))
            .ok_or_else(|| ScriptError::Eval("numbers are not comparable".to_string()))?
    } else if let (Value::String(a), Value::String(b)) = (lhs, rhs) {
        a.cmp(b)
    } else {
        return Err(ScriptError::Eval(format!(
            "cannot compare {} and {}",
            type_name(lhs),
            type_name(rhs)
        )));
    };

    let result = match op {
        BinOp::Lt => ordering.is_lt(),
        BinOp::Le => ordering.is_le(),
        BinOp::Gt => ordering.is_gt(),
        BinOp::Ge => ordering.is_ge(),
        _ => unreachable!(),
    };
    Ok(Value::Bool(result))
}
