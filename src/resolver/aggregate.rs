use crate::ast::Value;
use crate::error::ResolutionError;
use itertools::Itertools;

/// Custom functions that reduce the value(s) reached by a path to one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregator {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    First,
    Last,
    Join,
}

impl Aggregator {
    /// Looks up a custom function by name. `inverse` is reserved but not implemented.
    pub fn parse(name: &str) -> Result<Self, ResolutionError> {
        match name {
            "count" => Ok(Aggregator::Count),
            "sum" => Ok(Aggregator::Sum),
            "avg" => Ok(Aggregator::Avg),
            "min" => Ok(Aggregator::Min),
            "max" => Ok(Aggregator::Max),
            "first" => Ok(Aggregator::First),
            "last" => Ok(Aggregator::Last),
            "join" => Ok(Aggregator::Join),
            "inverse" => Err(ResolutionError::NotImplemented {
                name: name.to_string(),
            }),
            other => Err(ResolutionError::UnsupportedAggregator {
                name: other.to_string(),
            }),
        }
    }

    /// Reduces `values`, flattening lists and skipping nulls.
    pub fn apply(&self, values: Vec<Value>) -> Value {
        let items: Vec<Value> = flatten(values)
            .into_iter()
            .filter(|v| !v.is_null())
            .collect();

        match self {
            Aggregator::Count => Value::Number(items.len() as f64),
            Aggregator::Sum => Value::Number(numbers(&items).sum()),
            Aggregator::Avg => {
                let nums: Vec<f64> = numbers(&items).collect();
                if nums.is_empty() {
                    Value::Null
                } else {
                    Value::Number(nums.iter().sum::<f64>() / nums.len() as f64)
                }
            }
            Aggregator::Min => extreme(&items, |a, b| a < b),
            Aggregator::Max => extreme(&items, |a, b| a > b),
            Aggregator::First => items.into_iter().next().unwrap_or_default(),
            Aggregator::Last => items.into_iter().last().unwrap_or_default(),
            Aggregator::Join => Value::Text(items.iter().join(", ")),
        }
    }
}

fn flatten(values: Vec<Value>) -> Vec<Value> {
    values
        .into_iter()
        .flat_map(|v| match v {
            Value::List(items) => flatten(items),
            other => vec![other],
        })
        .collect()
}

fn numbers(items: &[Value]) -> impl Iterator<Item = f64> + '_ {
    items.iter().map(Value::to_number).filter(|n| n.is_finite())
}

// Dates compare as dates when every item is one; otherwise numerically.
fn extreme(items: &[Value], better: impl Fn(f64, f64) -> bool) -> Value {
    if !items.is_empty() && items.iter().all(|v| matches!(v, Value::Date(_))) {
        return items
            .iter()
            .cloned()
            .reduce(|acc, v| {
                if better(v.to_number(), acc.to_number()) {
                    v
                } else {
                    acc
                }
            })
            .unwrap_or_default();
    }
    numbers(items)
        .reduce(|acc, n| if better(n, acc) { n } else { acc })
        .map(Value::Number)
        .unwrap_or_default()
}
