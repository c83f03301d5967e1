use crate::ast::{Formula, Value};
use crate::error::SyntaxError;
use ahash::AHashMap;

mod engine;
pub mod parsing;

use engine::GroupEngine;
use parsing::Node;

/// Evaluates one formula against resolved variable values.
///
/// An `Evaluator` is created once per formula, which matches its parentheses
/// up front, and can then be run repeatedly against different sets of values.
/// Evaluation is a pure function of the formula and the values.
pub struct Evaluator<'f> {
    formula: &'f Formula,
    tree: Vec<Node<'f>>,
}

impl<'f> Evaluator<'f> {
    /// Parses the formula's components into groups.
    ///
    /// Fails with a [`SyntaxError`] on an empty sequence, duplicate orders or
    /// unbalanced parentheses.
    pub fn new(formula: &'f Formula) -> Result<Self, SyntaxError> {
        let tree = parsing::parse(formula)?;
        Ok(Self { formula, tree })
    }

    /// Evaluates the formula and casts the result to its declared type.
    ///
    /// # Arguments
    ///
    /// * `resolved`: variable path to value. Variables missing from the map are
    ///   unset; they may appear in the formula but never provide an operand.
    pub fn eval(&self, resolved: &AHashMap<String, Value>) -> Result<Value, SyntaxError> {
        let raw = GroupEngine::new(resolved).evaluate(&self.tree)?;
        Ok(self.formula.result_as.cast(raw))
    }

    /// Maximum parenthesis nesting of the formula.
    pub fn depth(&self) -> usize {
        parsing::depth(&self.tree)
    }
}

/// Parses and evaluates in one step.
pub fn evaluate(formula: &Formula, resolved: &AHashMap<String, Value>) -> Result<Value, SyntaxError> {
    Evaluator::new(formula)?.eval(resolved)
}
