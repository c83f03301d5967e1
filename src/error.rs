use crate::log::LogId;
use thiserror::Error;

/// Errors raised while grouping and evaluating a component sequence.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyntaxError {
    #[error("Invalid formula: it has no components")]
    Empty,

    #[error("Invalid formula")]
    InvalidFormula,

    #[error("Invalid formula component {description}")]
    InvalidComponent { description: String },

    #[error("Closing parenthesis at order {order} has no matching opening parenthesis")]
    UnmatchedClose { order: u32 },

    #[error("Opening parenthesis at order {order} is never closed")]
    UnterminatedGroup { order: u32 },

    #[error("Operator '{symbol}' has no operand to its right")]
    DanglingOperator { symbol: &'static str },

    #[error("More than one component uses order {order}")]
    DuplicateOrder { order: u32 },
}

/// Errors raised while resolving a variable path to a value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolutionError {
    #[error("Variable '{path}' is not a valid path")]
    UnknownPath { path: String },

    #[error("Entity '{entity}' is neither '{from}' nor related to it (variable '{path}')")]
    UnknownEntity {
        path: String,
        entity: String,
        from: String,
    },

    #[error("Property '{property}' does not exist on entity '{entity}'")]
    UnknownProperty { entity: String, property: String },

    #[error("Variable '{path}' has multiple values but no custom function was specified")]
    MultipleValues { path: String },

    #[error("Custom function '{name}' is not supported")]
    UnsupportedAggregator { name: String },

    #[error("Custom function '{name}' is not implemented yet")]
    NotImplemented { name: String },

    #[error("Variables of type '{namespace}' are not supported yet")]
    UnsupportedNamespace { namespace: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors returned by the row and schema collaborators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Entity '{0}' not found")]
    EntityNotFound(String),

    #[error("Row '{row}' not found in entity '{entity}'")]
    RowNotFound { entity: String, row: String },

    #[error("Store backend failure: {0}")]
    Backend(String),
}

/// Errors returned by the execution log collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LogError {
    #[error("Execution log entry {0} not found")]
    EntryNotFound(LogId),

    #[error("Execution log backend failure: {0}")]
    Backend(String),
}

/// Errors that escape a single `calculate` call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalculationError {
    #[error("Formula syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    #[error("Variable resolution error: {0}")]
    Resolution(#[from] ResolutionError),
}

/// Errors that can occur while building an engine or loading its inputs.
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Failed to read '{path}': {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse JSON: {0}")]
    JsonParseError(String),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),

    #[error("Invalid scenario: {0}")]
    Scenario(String),
}

/// Failure of one (property, row) recomputation inside a trigger run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TriggerError {
    #[error(transparent)]
    Calculation(#[from] CalculationError),

    #[error("Failed to read or write the row value: {0}")]
    Store(#[from] StoreError),
}
