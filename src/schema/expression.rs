//! Condition expressions for `show_if`, `hidden_if` and environment `condition`.
//!
//! Expressions are parsed once when a schema is loaded. The grammar is small:
//!
//! ```text
//! expr    := and ( ("||" | "or") and )*
//! and     := unary ( ("&&" | "and") unary )*
//! unary   := ("!" | "not") unary | primary
//! primary := "(" expr ")" | operand ( ("==" | "!=") operand )?
//! operand := identifier | "string" | 'string' | integer | true | false
//! ```
//!
//! Identifiers may be dotted (`traefik.enabled`) to reach another service's
//! field values. A bare operand is evaluated for truthiness.
//!
//! An expression that fails to parse is kept as source text and evaluates to
//! `true`, matching how hand-written schemas have always been treated.

use crate::config::FieldValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Values visible to a condition, keyed by identifier.
pub type ConditionContext = HashMap<String, FieldValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Bool(bool),
    Int(i64),
}

impl Literal {
    fn to_value(&self) -> FieldValue {
        match self {
            Literal::Str(s) => FieldValue::String(s.clone()),
            Literal::Bool(b) => FieldValue::Bool(*b),
            Literal::Int(i) => FieldValue::Integer(*i),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Ident(String),
    Literal(Literal),
}

impl Operand {
    fn resolve(&self, ctx: &ConditionContext) -> FieldValue {
        match self {
            Operand::Ident(name) => ctx.get(name).cloned().unwrap_or(FieldValue::Null),
            Operand::Literal(lit) => lit.to_value(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Truthy(Operand),
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn evaluate(&self, ctx: &ConditionContext) -> bool {
        match self {
            Expr::Truthy(operand) => operand.resolve(ctx).is_truthy(),
            Expr::Compare { left, op, right } => {
                let equal = values_equal(&left.resolve(ctx), &right.resolve(ctx));
                match op {
                    CompareOp::Eq => equal,
                    CompareOp::Ne => !equal,
                }
            }
            Expr::Not(inner) => !inner.evaluate(ctx),
            Expr::And(a, b) => a.evaluate(ctx) && b.evaluate(ctx),
            Expr::Or(a, b) => a.evaluate(ctx) || b.evaluate(ctx),
        }
    }

    fn collect_identifiers<'a>(&'a self, out: &mut Vec<&'a str>) {
        fn push<'a>(operand: &'a Operand, out: &mut Vec<&'a str>) {
            if let Operand::Ident(name) = operand {
                out.push(name.as_str());
            }
        }
        match self {
            Expr::Truthy(operand) => push(operand, out),
            Expr::Compare { left, right, .. } => {
                push(left, out);
                push(right, out);
            }
            Expr::Not(inner) => inner.collect_identifiers(out),
            Expr::And(a, b) | Expr::Or(a, b) => {
                a.collect_identifiers(out);
                b.collect_identifiers(out);
            }
        }
    }
}

/// Equality across loosely typed values: booleans compare by truthiness,
/// integers numerically, everything else by rendered text.
fn values_equal(a: &FieldValue, b: &FieldValue) -> bool {
    match (a, b) {
        (FieldValue::Bool(_), _) | (_, FieldValue::Bool(_)) => {
            let left = a.as_bool().unwrap_or_else(|| a.is_truthy());
            let right = b.as_bool().unwrap_or_else(|| b.is_truthy());
            left == right
        }
        (FieldValue::Integer(x), FieldValue::Integer(y)) => x == y,
        _ => a.to_string() == b.to_string(),
    }
}

/// A parsed condition that remembers its source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Condition {
    source: String,
    expr: Option<Expr>,
}

impl Condition {
    pub fn parse(source: &str) -> Self {
        let expr = match parse_expression(source) {
            Ok(expr) => Some(expr),
            Err(reason) => {
                tracing::debug!("Condition '{}' did not parse: {}", source, reason);
                None
            }
        };
        Self {
            source: source.to_string(),
            expr,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_parsed(&self) -> bool {
        self.expr.is_some()
    }

    /// Evaluate against `ctx`. Unparseable conditions count as satisfied.
    pub fn evaluate(&self, ctx: &ConditionContext) -> bool {
        match &self.expr {
            Some(expr) => expr.evaluate(ctx),
            None => {
                tracing::warn!(
                    "Unparseable condition '{}' treated as true",
                    self.source
                );
                true
            }
        }
    }

    /// Identifiers referenced by the expression, in source order.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut out = Vec::new();
        if let Some(expr) = &self.expr {
            expr.collect_identifiers(&mut out);
        }
        out
    }
}

impl From<String> for Condition {
    fn from(source: String) -> Self {
        Condition::parse(&source)
    }
}

impl From<Condition> for String {
    fn from(condition: Condition) -> Self {
        condition.source
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Bool(bool),
    Eq,
    Ne,
    Not,
    And,
    Or,
    LParen,
    RParen,
}

fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Eq);
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Ne);
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '"' | '\'' => {
                let quote = c;
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != quote {
                    end += 1;
                }
                if end >= chars.len() {
                    return Err(format!("unterminated string starting at {}", i));
                }
                tokens.push(Token::Str(chars[start..end].iter().collect()));
                i = end + 1;
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<i64>()
                    .map_err(|e| format!("invalid number '{}': {}", text, e))?;
                tokens.push(Token::Int(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "true" | "True" => Token::Bool(true),
                    "false" | "False" => Token::Bool(false),
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Ident(word),
                });
            }
            other => return Err(format!("unexpected character '{}' at {}", other, i)),
        }
    }

    Ok(tokens)
}

struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let inner = self.parse_or()?;
            return match self.next() {
                Some(Token::RParen) => Ok(inner),
                _ => Err("expected ')'".to_string()),
            };
        }

        let left = self.parse_operand()?;
        let op = match self.peek() {
            Some(Token::Eq) => CompareOp::Eq,
            Some(Token::Ne) => CompareOp::Ne,
            _ => return Ok(Expr::Truthy(left)),
        };
        self.pos += 1;
        let right = self.parse_operand()?;
        Ok(Expr::Compare { left, op, right })
    }

    fn parse_operand(&mut self) -> Result<Operand, String> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(Operand::Ident(name)),
            Some(Token::Str(s)) => Ok(Operand::Literal(Literal::Str(s))),
            Some(Token::Int(i)) => Ok(Operand::Literal(Literal::Int(i))),
            Some(Token::Bool(b)) => Ok(Operand::Literal(Literal::Bool(b))),
            Some(other) => Err(format!("unexpected token {:?}", other)),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

fn parse_expression(source: &str) -> Result<Expr, String> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    let mut parser = ExprParser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.pos < parser.tokens.len() {
        return Err(format!(
            "trailing input after position {}",
            parser.pos
        ));
    }
    Ok(expr)
}
