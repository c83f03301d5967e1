use super::parsing::Node;
use crate::ast::{Component, Value};
use crate::error::SyntaxError;
use crate::operators::{Operator, OperatorTable};
use ahash::AHashMap;

/// Walks a parsed group tree left to right. There is no operator precedence:
/// each operator is applied to the running result as soon as the next one
/// arrives, and only groups change that order.
pub(super) struct GroupEngine<'a> {
    resolved: &'a AHashMap<String, Value>,
}

/// Running state of one group.
#[derive(Default)]
struct GroupState<'c> {
    result: Option<Value>,
    pending_operand: Option<Value>,
    pending_operator: Option<Operator>,
    operator_seen: bool,
    // Operand slots filled so far, set or unset.
    operands: usize,
    // An unset variable fills the operand slot without providing a value.
    slot_filled: bool,
    last_unset: Option<&'c Component>,
}

impl<'a> GroupEngine<'a> {
    pub(super) fn new(resolved: &'a AHashMap<String, Value>) -> Self {
        Self { resolved }
    }

    /// Evaluates one group to a single, uncast value.
    pub(super) fn evaluate(&self, nodes: &[Node]) -> Result<Value, SyntaxError> {
        let mut state = GroupState::default();

        for node in nodes {
            match node {
                Node::Operand(component) => {
                    state.operands += 1;
                    match self.operand(component) {
                        Some(value) => {
                            state.pending_operand = Some(value);
                            state.slot_filled = true;
                        }
                        None => {
                            state.slot_filled = true;
                            state.last_unset = Some(*component);
                        }
                    }
                }
                Node::Group(children) => {
                    state.operands += 1;
                    state.pending_operand = Some(self.evaluate(children)?);
                    state.slot_filled = true;
                }
                Node::Operator(op) => {
                    if let Some(staged) = state.pending_operator.take() {
                        state.result = Some(Self::apply(
                            staged,
                            state.result.take(),
                            state.pending_operand.take(),
                        ));
                    } else {
                        // First operator: the operand so far becomes the running result.
                        state.result = state.pending_operand.take();
                    }
                    state.operator_seen = true;
                    state.pending_operand = None;
                    state.slot_filled = false;
                    state.pending_operator = Some(*op);
                }
            }
        }

        if !state.operator_seen {
            if state.operands > 1 {
                return Err(SyntaxError::InvalidFormula);
            }
            if let Some(value) = state.pending_operand {
                return Ok(value);
            }
        }

        if let Some(op) = state.pending_operator {
            if !state.slot_filled {
                return Err(SyntaxError::DanglingOperator {
                    symbol: op.symbol(),
                });
            }
            state.result = Some(Self::apply(
                op,
                state.result.take(),
                state.pending_operand.take(),
            ));
        }

        state.result.ok_or_else(|| match state.last_unset {
            Some(component) => SyntaxError::InvalidComponent {
                description: component.describe(),
            },
            None => SyntaxError::InvalidFormula,
        })
    }

    /// Reads an operand. Unset variables return `None`.
    fn operand(&self, component: &Component) -> Option<Value> {
        match component {
            Component::Variable { value: path, .. } => self.resolved.get(path).cloned(),
            Component::Value { value, .. } => Some(value.clone()),
            Component::Operator { .. } | Component::Parenthesis { .. } => None,
        }
    }

    // A unary operator never reads the running result.
    fn apply(op: Operator, left: Option<Value>, right: Option<Value>) -> Value {
        let left = if op.is_unary() {
            Value::Null
        } else {
            left.unwrap_or(Value::Null)
        };
        OperatorTable::apply(op, &left, &right.unwrap_or(Value::Null))
    }
}
