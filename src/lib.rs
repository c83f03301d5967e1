//! # Shiki - Formula Evaluation and Trigger Engine
//!
//! **Shiki** evaluates user-defined formulas over the rows of a schemaless
//! entity graph and keeps formula-backed properties up to date as rows move
//! through their lifecycle.
//!
//! A formula is a flat, ordered list of components (variables, literals,
//! operators and parentheses). It is grouped by its parentheses and then
//! evaluated strictly left to right: there is no operator precedence, only
//! grouping.
//!
//! ## Core Workflow
//!
//! 1.  **Describe Your Data**: Implement [`SchemaProvider`](store::SchemaProvider)
//!     and [`RowStore`](store::RowStore) over your storage, or use the in-memory
//!     versions in [`store::memory`].
//! 2.  **Build an Engine**: Use [`FormulaEngine::builder`](engine::FormulaEngine::builder),
//!     optionally with an [`ExecutionLogStore`](log::ExecutionLogStore) and an
//!     [`EngineConfig`](engine::EngineConfig).
//! 3.  **Calculate**: Evaluate a formula against a set of variable bindings.
//! 4.  **Trigger**: Fire a lifecycle event for a batch of rows; every
//!     formula-backed property whose trigger matches is recomputed and
//!     written back.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shiki::prelude::*;
//! use std::sync::Arc;
//!
//! fn main() -> Result<()> {
//!     let total = Formula::builder("line-total")
//!         .trigger(CalculationTrigger::AfterUpdated)
//!         .open()
//!         .variable("row.line.price")
//!         .op(Operator::Multiply)
//!         .variable("row.line.quantity")
//!         .close()
//!         .op(Operator::Subtract)
//!         .variable("row.line.discount")
//!         .build();
//!
//!     let line = EntitySchema {
//!         name: "line".to_string(),
//!         properties: vec![
//!             PropertySchema { name: "price".into(), kind: PropertyKind::Number, default: Value::Null, formula: None },
//!             PropertySchema { name: "quantity".into(), kind: PropertyKind::Number, default: Value::Null, formula: None },
//!             PropertySchema { name: "discount".into(), kind: PropertyKind::Number, default: Value::Null, formula: None },
//!             PropertySchema { name: "total".into(), kind: PropertyKind::Formula, default: Value::Null, formula: Some(total) },
//!         ],
//!         relationships: vec![],
//!     };
//!
//!     let rows = Arc::new(MemoryRowStore::new());
//!     rows.insert_row("line", "l1", 1.0)?;
//!     rows.set_value("line", "l1", "price", Value::Number(12.0))?;
//!     rows.set_value("line", "l1", "quantity", Value::Number(3.0))?;
//!     rows.set_value("line", "l1", "discount", Value::Number(6.0))?;
//!
//!     let engine = FormulaEngine::builder(Arc::new(MemorySchema::new().with_entity(line)), rows)
//!         .build()?;
//!
//!     let report = engine.trigger(LifecycleEvent::AfterUpdated, "line", &["l1".to_string()]);
//!     println!("-> total = {:?}", report.value("total", "l1")); // Some(Number(30.0))
//!     Ok(())
//! }
//! ```

pub mod ast;
pub mod data;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod log;
pub mod operators;
pub mod prelude;
pub mod resolver;
pub mod store;
pub mod trace;
pub mod trigger;

pub use engine::{CalculationRequest, EngineConfig, EndResult, FormulaEngine};
pub use evaluator::Evaluator;
