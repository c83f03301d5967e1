use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Runtime value kinds seen during evaluation.
///
/// Only `Null`, `Number`, `Text`, `Bool` and `Date` take part in the operator
/// table. `List` (multi-value properties) and `Range` appear while resolving
/// variables and fall through to each operator's default.
///
/// JSON strings always deserialize as `Text`, even when they look like a
/// date; dates are read out of text with [`Value::as_date`] where a date is
/// expected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Number(f64),
    Bool(bool),
    Text(String),
    Date(DateTime<Utc>),
    List(Vec<Value>),
    Range { from: Box<Value>, to: Box<Value> },
}

/// The kind of a [`Value`], used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Number,
    Text,
    Bool,
    Date,
    List,
    Range,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Number => "number",
            ValueKind::Text => "string",
            ValueKind::Bool => "boolean",
            ValueKind::Date => "date",
            ValueKind::List => "list",
            ValueKind::Range => "range",
        };
        f.write_str(name)
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Number(_) => ValueKind::Number,
            Value::Text(_) => ValueKind::Text,
            Value::Bool(_) => ValueKind::Bool,
            Value::Date(_) => ValueKind::Date,
            Value::List(_) => ValueKind::List,
            Value::Range { .. } => ValueKind::Range,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Builds a date value at midnight UTC. Returns `Null` for an invalid date.
    pub fn date_ymd(year: i32, month: u32, day: u32) -> Value {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| Value::Date(Utc.from_utc_datetime(&dt)))
            .unwrap_or(Value::Null)
    }

    /// Numeric coercion. Unparseable text yields `NaN`.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Number(n) => *n,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Date(d) => d.timestamp_millis() as f64,
            Value::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            Value::List(items) => match items.as_slice() {
                [] => 0.0,
                [single] => single.to_number(),
                _ => f64::NAN,
            },
            Value::Range { .. } => f64::NAN,
        }
    }

    /// Truthiness: `null`, `0`, `NaN`, `""` and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Bool(b) => *b,
            Value::Text(s) => !s.is_empty(),
            Value::Date(_) | Value::List(_) | Value::Range { .. } => true,
        }
    }

    /// Reads the value as a date, parsing text when needed.
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(*d),
            Value::Text(s) => parse_date(s.trim()),
            _ => None,
        }
    }
}

fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&dt));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Text(s) => write!(f, "{}", s),
            Value::Date(d) => write!(f, "{}", d.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Value::Range { from, to } => write!(f, "{} - {}", from, to),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

/// The four typed storage slots of a row value, also used for plain bindings.
/// At most one slot is expected to be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueSlots {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_value: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boolean_value: Option<bool>,
}

impl ValueSlots {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            text_value: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn number(value: f64) -> Self {
        Self {
            number_value: Some(value),
            ..Self::default()
        }
    }

    pub fn date(value: DateTime<Utc>) -> Self {
        Self {
            date_value: Some(value),
            ..Self::default()
        }
    }

    pub fn boolean(value: bool) -> Self {
        Self {
            boolean_value: Some(value),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text_value.is_none()
            && self.number_value.is_none()
            && self.date_value.is_none()
            && self.boolean_value.is_none()
    }

    /// Reads the slots back as a value. Numbers win over text, then dates, then booleans.
    pub fn to_value(&self) -> Value {
        if let Some(n) = self.number_value {
            Value::Number(n)
        } else if let Some(t) = &self.text_value {
            Value::Text(t.clone())
        } else if let Some(d) = self.date_value {
            Value::Date(d)
        } else if let Some(b) = self.boolean_value {
            Value::Bool(b)
        } else {
            Value::Null
        }
    }
}
