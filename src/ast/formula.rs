use super::{Value, ValueSlots};
use crate::operators::Operator;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The declared result type of a formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    #[default]
    Number,
    Boolean,
    String,
    Date,
}

impl ResultType {
    /// Casts an evaluation result to this type. `Null` is never cast.
    pub fn cast(&self, value: Value) -> Value {
        match (self, value) {
            (_, Value::Null) => Value::Null,
            (ResultType::Number, v) => Value::Number(v.to_number()),
            (ResultType::Boolean, v) => Value::Bool(v.is_truthy()),
            (ResultType::String, Value::Text(s)) => Value::Text(s),
            (ResultType::String, v) => Value::Text(v.to_string()),
            (ResultType::Date, v) => v.as_date().map(Value::Date).unwrap_or_default(),
        }
    }

    /// Places a result in the storage slot matching this type.
    pub fn to_slots(&self, value: &Value) -> ValueSlots {
        match (self, value) {
            (_, Value::Null) => ValueSlots::default(),
            (ResultType::Number, v) => ValueSlots::number(v.to_number()),
            (ResultType::Boolean, v) => ValueSlots::boolean(v.is_truthy()),
            (ResultType::String, v) => ValueSlots::text(v.to_string()),
            (ResultType::Date, v) => v.as_date().map(ValueSlots::date).unwrap_or_default(),
        }
    }
}

/// When a formula-backed property is recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalculationTrigger {
    Always,
    #[default]
    Never,
    IfUnset,
    BeforeListed,
    AfterCreated,
    BeforeViewed,
    AfterUpdated,
}

impl CalculationTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalculationTrigger::Always => "ALWAYS",
            CalculationTrigger::Never => "NEVER",
            CalculationTrigger::IfUnset => "IF_UNSET",
            CalculationTrigger::BeforeListed => "BEFORE_LISTED",
            CalculationTrigger::AfterCreated => "AFTER_CREATED",
            CalculationTrigger::BeforeViewed => "BEFORE_VIEWED",
            CalculationTrigger::AfterUpdated => "AFTER_UPDATED",
        }
    }
}

impl fmt::Display for CalculationTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parenthesis direction of a grouping component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Parenthesis {
    Open,
    Close,
}

/// One instruction of a formula, replayed in ascending `order`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Component {
    /// A dotted variable path, e.g. `row.invoice.total`, or a plain identifier.
    Variable { order: u32, value: String },
    Operator { order: u32, value: Operator },
    Parenthesis { order: u32, value: Parenthesis },
    /// A literal operand.
    Value { order: u32, value: Value },
}

impl Component {
    pub fn order(&self) -> u32 {
        match self {
            Component::Variable { order, .. }
            | Component::Operator { order, .. }
            | Component::Parenthesis { order, .. }
            | Component::Value { order, .. } => *order,
        }
    }

    /// Short human-readable description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Component::Variable { order, value } => format!("#{} (variable {})", order, value),
            Component::Operator { order, value } => format!("#{} (operator {})", order, value),
            Component::Parenthesis { order, value } => {
                let side = match value {
                    Parenthesis::Open => "(",
                    Parenthesis::Close => ")",
                };
                format!("#{} (parenthesis {})", order, side)
            }
            Component::Value { order, value } => format!("#{} (value {})", order, value),
        }
    }
}

/// A typed expression definition owned by a property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Formula {
    pub id: String,
    #[serde(default)]
    pub result_as: ResultType,
    #[serde(default)]
    pub calculation_trigger: CalculationTrigger,
    #[serde(default)]
    pub with_logs: bool,
    pub components: Vec<Component>,
}

impl Formula {
    pub fn builder(id: impl Into<String>) -> FormulaBuilder {
        FormulaBuilder::new(id)
    }

    /// Distinct variable paths in component order.
    pub fn variable_paths(&self) -> Vec<&str> {
        self.components
            .iter()
            .filter_map(|c| match c {
                Component::Variable { order, value } => Some((*order, value.as_str())),
                _ => None,
            })
            .sorted_by_key(|(order, _)| *order)
            .map(|(_, path)| path)
            .unique()
            .collect()
    }
}

/// Builds a formula, numbering components in the order they are added.
pub struct FormulaBuilder {
    formula: Formula,
}

impl FormulaBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            formula: Formula {
                id: id.into(),
                result_as: ResultType::default(),
                calculation_trigger: CalculationTrigger::default(),
                with_logs: false,
                components: Vec::new(),
            },
        }
    }

    pub fn result_as(mut self, result_as: ResultType) -> Self {
        self.formula.result_as = result_as;
        self
    }

    pub fn trigger(mut self, trigger: CalculationTrigger) -> Self {
        self.formula.calculation_trigger = trigger;
        self
    }

    pub fn with_logs(mut self, with_logs: bool) -> Self {
        self.formula.with_logs = with_logs;
        self
    }

    fn next_order(&self) -> u32 {
        self.formula.components.len() as u32
    }

    pub fn variable(mut self, path: impl Into<String>) -> Self {
        let order = self.next_order();
        self.formula.components.push(Component::Variable {
            order,
            value: path.into(),
        });
        self
    }

    pub fn value(mut self, value: impl Into<Value>) -> Self {
        let order = self.next_order();
        self.formula.components.push(Component::Value {
            order,
            value: value.into(),
        });
        self
    }

    pub fn op(mut self, op: Operator) -> Self {
        let order = self.next_order();
        self.formula
            .components
            .push(Component::Operator { order, value: op });
        self
    }

    pub fn open(mut self) -> Self {
        let order = self.next_order();
        self.formula.components.push(Component::Parenthesis {
            order,
            value: Parenthesis::Open,
        });
        self
    }

    pub fn close(mut self) -> Self {
        let order = self.next_order();
        self.formula.components.push(Component::Parenthesis {
            order,
            value: Parenthesis::Close,
        });
        self
    }

    pub fn build(self) -> Formula {
        self.formula
    }
}
