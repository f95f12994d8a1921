//! Runtime values produced by the executor.

use std::fmt;

use serde::Serialize;
use zman_astro::Time;
use zman_syntax::types::ValueType;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    /// A local time of day on the context's date
    Time(Time),
    /// Signed minutes
    Duration(f64),
    Number(f64),
    String(String),
    Boolean(bool),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Time(_) => ValueType::Time,
            Value::Duration(_) => ValueType::Duration,
            Value::Number(_) => ValueType::Number,
            Value::String(_) => ValueType::String,
            Value::Boolean(_) => ValueType::Boolean,
        }
    }

    pub fn as_time(&self) -> Option<Time> {
        match self {
            Value::Time(t) => Some(*t),
            _ => None,
        }
    }
}

/// Renders minutes the way formulas write them: `72min`, `2h`, `1h 30min`.
pub fn format_minutes(minutes: f64) -> String {
    let sign = if minutes < 0.0 { "-" } else { "" };
    let total = (minutes.abs() * 100.0).round() / 100.0;
    let hours = (total / 60.0).floor();
    let rest = ((total - hours * 60.0) * 100.0).round() / 100.0;
    match (hours > 0.0, rest > 0.0) {
        (true, true) => format!("{}{}h {}min", sign, hours, rest),
        (true, false) => format!("{}{}h", sign, hours),
        _ => format!("{}{}min", sign, rest),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S")),
            Value::Duration(m) => write!(f, "{}", format_minutes(*m)),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Boolean(b) => write!(f, "{}", b),
        }
    }
}
