use serde::{Deserialize, Serialize};
use std::fmt;

/// A single dataset cell
///
/// CSV fields are read as text and promoted to `Number` when they parse as a
/// float. Anything else, including empty fields, stays `Text` with the
/// original characters so exact string matching still works.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    /// Classify a raw CSV field
    ///
    /// # Examples
    /// ```
    /// use plotdesk::value::Value;
    ///
    /// assert_eq!(Value::parse(" 2.5 "), Value::Number(2.5));
    /// assert_eq!(Value::parse("x"), Value::Text("x".to_string()));
    /// ```
    pub fn parse(raw: &str) -> Self {
        match parse_number(raw) {
            Some(n) => Value::Number(n),
            None => Value::Text(raw.to_string()),
        }
    }

    /// Numeric coercion; text coerces to NaN
    pub fn to_f64(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Text(_) => f64::NAN,
        }
    }

    /// Whether this value counts as "not provided" for a constant filter
    pub fn is_blank(&self) -> bool {
        matches!(self, Value::Text(s) if s.is_empty())
    }

    /// The value as a constant to compare numerically against
    ///
    /// Text constants are accepted when they parse as a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) if !n.is_nan() => Some(*n),
            Value::Number(_) => None,
            Value::Text(s) => parse_number(s),
        }
    }

    /// The text used for exact string matching
    pub fn as_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

/// Parse a float, refusing NaN so that "nan" in a CSV stays text
fn parse_number(raw: &str) -> Option<f64> {
    match raw.trim().parse::<f64>() {
        Ok(n) if !n.is_nan() => Some(n),
        _ => None,
    }
}

/// Coerce a whole column to numbers, NaN where a cell is text
pub fn coerce_numeric(values: &[Value]) -> Vec<f64> {
    values.iter().map(Value::to_f64).collect()
}
