use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Tokens treated as a missing value when parsing text input.
pub const NULL_TOKENS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

/// A single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Exact identity key, used for duplicate detection and mode counting.
    pub(crate) fn key(&self) -> String {
        match self {
            Value::Null => "n:".to_string(),
            Value::Int(i) => format!("i:{i}"),
            Value::Float(f) => format!("f:{}", f.to_bits()),
            Value::Text(s) => format!("t:{s}"),
        }
    }

    /// Total order for sorting cells: numbers by value, anything else by its
    /// display text.
    #[must_use]
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        match (self.as_f64(), other.as_f64()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => self.to_string().cmp(&other.to_string()),
        }
    }

    /// Infer a typed value from a raw token without knowing the column type.
    #[must_use]
    pub fn guess(raw: &str) -> Value {
        if is_null_token(raw) {
            return Value::Null;
        }
        let trimmed = raw.trim();
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Int(i);
        }
        if let Some(f) = parse_float(trimmed) {
            return Value::Float(f);
        }
        Value::Text(raw.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => {
                if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
                    write!(f, "{v:.1}")
                } else {
                    write!(f, "{v}")
                }
            }
            Value::Text(s) => f.write_str(s),
        }
    }
}

pub fn is_null_token(raw: &str) -> bool {
    NULL_TOKENS.contains(&raw.trim())
}

pub(crate) fn parse_float(s: &str) -> Option<f64> {
    // Rust accepts "inf"/"nan" spellings that should stay text.
    if !s.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Inferred type of a whole column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Float,
    Text,
    /// Every cell is null.
    Empty,
}

impl ColumnType {
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Text => "text",
            ColumnType::Empty => "empty",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess() {
        assert_eq!(Value::guess("42"), Value::Int(42));
        assert_eq!(Value::guess(" 7 "), Value::Int(7));
        assert_eq!(Value::guess("2.5"), Value::Float(2.5));
        assert_eq!(Value::guess("NaN"), Value::Null);
        assert_eq!(Value::guess(""), Value::Null);
        assert_eq!(Value::guess("inf"), Value::Text("inf".to_string()));
        assert_eq!(Value::guess("abc"), Value::Text("abc".to_string()));
    }

    #[test]
    fn test_display_float() {
        assert_eq!(Value::Float(3.0).to_string(), "3.0");
        assert_eq!(Value::Float(0.25).to_string(), "0.25");
        assert_eq!(Value::Null.to_string(), "");
    }

    #[test]
    fn test_total_cmp() {
        let mut values = vec![
            Value::Text("b".to_string()),
            Value::Float(2.5),
            Value::Int(10),
            Value::Int(-1),
            Value::Text("a".to_string()),
        ];
        values.sort_by(Value::total_cmp);
        assert_eq!(
            values,
            vec![
                Value::Int(-1),
                Value::Float(2.5),
                Value::Int(10),
                Value::Text("a".to_string()),
                Value::Text("b".to_string()),
            ]
        );
        assert_eq!(Value::Int(2).total_cmp(&Value::Float(2.0)), Ordering::Equal);
    }

    #[test]
    fn test_key_distinguishes_types() {
        assert_ne!(Value::Int(1).key(), Value::Text("1".to_string()).key());
        assert_ne!(Value::Int(1).key(), Value::Float(1.0).key());
    }
}
