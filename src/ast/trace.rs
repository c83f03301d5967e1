use super::{Component, Parenthesis, Value};
use crate::operators::Operator;
use ahash::AHashMap;
use itertools::Itertools;

/// One rendered element of an expression trace.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceToken {
    /// A variable and the value it resolved to, `None` when it was unset.
    Variable { path: String, value: Option<Value> },
    Literal(Value),
    Operator(Operator),
    Open,
    Close,
}

/// A reconstruction of a formula's component sequence with its resolved operands.
///
/// `row_ids` lists every row a variable was read from, so log entries can be
/// found by the rows they touched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpressionTrace {
    pub tokens: Vec<TraceToken>,
    pub row_ids: Vec<String>,
}

impl ExpressionTrace {
    pub fn build(
        components: &[Component],
        values: &AHashMap<String, Value>,
        row_ids: Vec<String>,
    ) -> Self {
        let tokens = components
            .iter()
            .sorted_by_key(|c| c.order())
            .map(|component| match component {
                Component::Variable { value: path, .. } => TraceToken::Variable {
                    path: path.clone(),
                    value: values.get(path).cloned(),
                },
                Component::Value { value, .. } => TraceToken::Literal(value.clone()),
                Component::Operator { value, .. } => TraceToken::Operator(*value),
                Component::Parenthesis {
                    value: Parenthesis::Open,
                    ..
                } => TraceToken::Open,
                Component::Parenthesis {
                    value: Parenthesis::Close,
                    ..
                } => TraceToken::Close,
            })
            .collect();
        Self { tokens, row_ids }
    }
}
