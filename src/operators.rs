//! The operator table.
//!
//! Every operator is total over every pair of [`Value`]s. Dispatch happens on
//! the runtime kind of the operands, never on a formula's declared result
//! type, and unsupported combinations degrade to a fixed default (`false` or
//! `0`) instead of failing.

use crate::ast::Value;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// The operator tags a formula component can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Concat,
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    And,
    Or,
    Not,
    DateAddDays,
}

impl Operator {
    /// The symbol used when rendering an expression trace.
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
            Operator::Concat => "&",
            Operator::Equals => "==",
            Operator::NotEquals => "!=",
            Operator::GreaterThan => ">",
            Operator::LessThan => "<",
            Operator::GreaterThanOrEqual => ">=",
            Operator::LessThanOrEqual => "<=",
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Not => "NOT",
            Operator::DateAddDays => "+days",
        }
    }

    pub fn is_unary(&self) -> bool {
        matches!(self, Operator::Not)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// Generates the four ordering comparisons from a predicate on `Ordering`.
macro_rules! ordering_op {
    ($left:expr, $right:expr, $pattern:pat) => {
        Value::Bool(matches!(compare($left, $right), Some($pattern)))
    };
}

/// Stateless dispatch from an operator tag to its evaluation rule.
pub struct OperatorTable;

impl OperatorTable {
    /// Applies `op` to `left` and `right`. `NOT` only looks at `right`.
    pub fn apply(op: Operator, left: &Value, right: &Value) -> Value {
        match op {
            Operator::Add => add(left, right),
            Operator::Subtract => subtract(left, right),
            Operator::Multiply => arithmetic(left.to_number() * right.to_number()),
            Operator::Divide => divide(left, right),
            Operator::Concat => Value::Text(format!("{}{}", concat_part(left), concat_part(right))),
            Operator::Equals => ordering_op!(left, right, Ordering::Equal),
            Operator::NotEquals => {
                ordering_op!(left, right, Ordering::Less | Ordering::Greater)
            }
            Operator::GreaterThan => ordering_op!(left, right, Ordering::Greater),
            Operator::LessThan => ordering_op!(left, right, Ordering::Less),
            Operator::GreaterThanOrEqual => {
                ordering_op!(left, right, Ordering::Greater | Ordering::Equal)
            }
            Operator::LessThanOrEqual => {
                ordering_op!(left, right, Ordering::Less | Ordering::Equal)
            }
            Operator::And => and(left, right),
            Operator::Or => Value::Bool(left.is_truthy() || right.is_truthy()),
            Operator::Not => Value::Bool(!right.is_truthy()),
            Operator::DateAddDays => date_add_days(left, right),
        }
    }
}

fn add(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::Null, Value::Null) => Value::Number(0.0),
        (Value::Null, other) | (other, Value::Null) => other.clone(),
        (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
        (Value::Date(d), Value::Number(days)) => shift_days(*d, *days),
        (Value::Bool(a), Value::Bool(b)) => Value::Bool(*a || *b),
        _ => Value::Number(0.0),
    }
}

fn subtract(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::Null, Value::Null) => Value::Number(0.0),
        (Value::Null, other) | (other, Value::Null) => other.clone(),
        (Value::Number(a), Value::Number(b)) => Value::Number(a - b),
        (Value::Date(d), Value::Number(days)) => shift_days(*d, -days),
        (Value::Bool(a), Value::Bool(b)) => Value::Bool(*a && !*b),
        _ => Value::Number(0.0),
    }
}

fn arithmetic(result: f64) -> Value {
    if result.is_finite() {
        Value::Number(result)
    } else {
        Value::Number(0.0)
    }
}

// Division by zero or by null is `false`, not an error.
fn divide(left: &Value, right: &Value) -> Value {
    let divisor = right.to_number();
    if right.is_null() || divisor == 0.0 {
        return Value::Bool(false);
    }
    arithmetic(left.to_number() / divisor)
}

fn concat_part(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

// Outside the boolean pair, only the literal text "false" is falsy beyond the usual values.
fn and(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => Value::Bool(*a && *b),
        _ => Value::Bool(and_operand(left) && and_operand(right)),
    }
}

fn and_operand(value: &Value) -> bool {
    match value {
        Value::Text(s) if s == "false" => false,
        other => other.is_truthy(),
    }
}

fn date_add_days(left: &Value, right: &Value) -> Value {
    match left.as_date() {
        Some(date) => shift_days(date, day_offset(right) as f64),
        None => Value::Bool(false),
    }
}

/// Integer day offset, `0` when the operand cannot be read as one.
fn day_offset(value: &Value) -> i64 {
    match value {
        Value::Number(n) if n.is_finite() => n.trunc() as i64,
        Value::Text(s) => leading_integer(s.trim()).unwrap_or(0),
        _ => 0,
    }
}

fn leading_integer(text: &str) -> Option<i64> {
    let end = text
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()?;
    text[..end].parse().ok()
}

fn shift_days(date: DateTime<Utc>, days: f64) -> Value {
    if !days.is_finite() {
        return Value::Date(date);
    }
    TimeDelta::try_days(days.trunc() as i64)
        .and_then(|delta| date.checked_add_signed(delta))
        .map(Value::Date)
        .unwrap_or(Value::Date(date))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_integer_stops_at_first_non_digit() {
        assert_eq!(leading_integer("10 days"), Some(10));
        assert_eq!(leading_integer("-3"), Some(-3));
        assert_eq!(leading_integer("days"), None);
        assert_eq!(leading_integer("-"), None);
    }

    #[test]
    fn shifting_by_non_finite_days_keeps_the_date() {
        let date = Value::date_ymd(2024, 1, 1);
        let Value::Date(d) = date else { unreachable!() };
        assert_eq!(shift_days(d, f64::NAN), Value::Date(d));
    }
}
