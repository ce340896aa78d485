//! Typed literal values and their coercion rules.

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlparser::ast::Value as SqlValue;
use std::sync::LazyLock;

use crate::error::{SqlRestError, SqlRestResult};

static INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-?\d+$").unwrap());
static DECIMAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-?\d*\.\d+$").unwrap());

/// A literal value in a filter, assignment or inserted row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
}

impl Value {
    /// Wrap a single value into a list; lists pass through.
    pub fn into_list(self) -> Vec<Value> {
        match self {
            Value::List(items) => items,
            other => vec![other],
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Value::List(items) => {
                write!(f, "(")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Coerce a raw token captured from SQL text.
///
/// Quoted → string, integer → int, decimal → float, `true`/`false` → bool,
/// `null` → null (case-insensitive). Anything else stays a string, so bare
/// words such as `active` in `status = active` are accepted as text.
pub fn parse_literal_token(text: &str) -> Value {
    let token = text.trim();

    if let Some(inner) = strip_quotes(token) {
        return Value::String(inner);
    }
    if INTEGER.is_match(token) {
        return match token.parse::<i64>() {
            Ok(n) => Value::Int(n),
            // Out of i64 range
            Err(_) => token
                .parse::<f64>()
                .map(Value::Float)
                .unwrap_or_else(|_| Value::String(token.to_string())),
        };
    }
    if DECIMAL.is_match(token) {
        if let Ok(n) = token.parse::<f64>() {
            return Value::Float(n);
        }
    }
    if token.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if token.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if token.eq_ignore_ascii_case("null") {
        return Value::Null;
    }

    Value::String(token.to_string())
}

/// Strip one pair of matching surrounding quotes, undoubling embedded ones.
fn strip_quotes(token: &str) -> Option<String> {
    if token.len() < 2 {
        return None;
    }
    let quote = token.chars().next()?;
    if (quote != '\'' && quote != '"') || !token.ends_with(quote) {
        return None;
    }
    let inner = &token[1..token.len() - 1];
    let doubled: String = [quote, quote].iter().collect();
    Some(inner.replace(&doubled, &quote.to_string()))
}

/// Parse a numeric literal as written in SQL.
pub fn parse_number(raw: &str) -> SqlRestResult<Value> {
    if let Ok(n) = raw.parse::<i64>() {
        return Ok(Value::Int(n));
    }
    raw.parse::<f64>()
        .map(Value::Float)
        .map_err(|_| SqlRestError::InvalidValue(format!("invalid numeric literal: {}", raw)))
}

impl TryFrom<&SqlValue> for Value {
    type Error = SqlRestError;

    fn try_from(value: &SqlValue) -> SqlRestResult<Self> {
        match value {
            SqlValue::Null => Ok(Value::Null),
            SqlValue::Boolean(b) => Ok(Value::Bool(*b)),
            SqlValue::Number(raw, _) => parse_number(raw),
            SqlValue::SingleQuotedString(s) | SqlValue::DoubleQuotedString(s) => {
                Ok(Value::String(s.clone()))
            }
            SqlValue::Placeholder(p) => Err(SqlRestError::InvalidValue(format!(
                "parameter placeholder {} is not supported",
                p
            ))),
            other => Err(SqlRestError::InvalidValue(other.to_string())),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(n) => serde_json::Value::Number(n.into()),
            Value::Float(n) => serde_json::Number::from_f64(n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::List(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
        }
    }
}

impl From<&serde_json::Value> for Value {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(0.0)),
            },
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::List(items.iter().map(Into::into).collect()),
            other => Value::String(other.to_string()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}
