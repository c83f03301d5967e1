//! Prelude module for convenient imports
//!
//! Re-exports the types needed to define formulas, wire up collaborators and
//! run calculations and triggers.
//!
//! # Example
//!
//! ```rust,no_run
//! use shiki::prelude::*;
//! use std::sync::Arc;
//!
//! # fn run_example() -> Result<()> {
//! let scenario = Scenario::from_file("path/to/scenario.json")?;
//! let (schema, rows) = scenario.into_stores()?;
//! let engine = FormulaEngine::builder(Arc::new(schema), Arc::new(rows)).build()?;
//!
//! let report = engine.trigger(LifecycleEvent::BeforeViewed, "invoice", &["inv-1".to_string()]);
//! println!("Written: {}, failed: {}", report.written(), report.failed());
//! # Ok(())
//! # }
//! ```

// Engine
pub use crate::engine::{CalculationRequest, EngineConfig, EndResult, FormulaEngine};
pub use crate::evaluator::Evaluator;
pub use crate::trigger::{LifecycleEvent, PairStatus, TriggerReport};

// Formula model
pub use crate::ast::{
    CalculationTrigger, Component, Formula, Parenthesis, ResultType, Value, ValueSlots,
};
pub use crate::operators::Operator;

// Collaborators
pub use crate::log::memory::MemoryLogStore;
pub use crate::log::{ExecutionLogStore, TriggerContext};
pub use crate::resolver::VariableBindings;
pub use crate::store::memory::{MemoryRowStore, MemorySchema};
pub use crate::store::{EntitySchema, PropertyKind, PropertySchema, RowStore, SchemaProvider};

// Data
pub use crate::data::Scenario;

// Error types
pub use crate::error::{CalculationError, ConfigError, ResolutionError, SyntaxError};

// Trace formatting
pub use crate::trace::TraceFormatter;

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
