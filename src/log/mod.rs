//! Audit records of formula evaluations.
//!
//! An entry is created before evaluation, carrying the resolved expression
//! trace, and completed exactly once afterwards with the duration and either
//! the result or the error.

use crate::ast::{CalculationTrigger, Component, ExpressionTrace, Formula, Value};
use crate::error::LogError;
use crate::store::RowId;
use crate::trace::TraceFormatter;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod memory;

pub type LogId = u64;

/// Who or what caused an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerContext {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// The lifecycle event that fired, if any.
    #[serde(default)]
    pub original_trigger: Option<CalculationTrigger>,
    /// Why the evaluation ran: the event name, `ALWAYS`, `IF_UNSET` or `MANUAL`.
    pub triggered_by: String,
    /// Identifies the stored row value the result is written to.
    #[serde(default)]
    pub row_value_id: Option<String>,
}

impl Default for TriggerContext {
    fn default() -> Self {
        Self {
            user_id: None,
            tenant_id: None,
            original_trigger: None,
            triggered_by: "MANUAL".to_string(),
            row_value_id: None,
        }
    }
}

/// The fields known when an entry is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLogEntry {
    pub formula_id: String,
    pub user_id: Option<String>,
    pub tenant_id: Option<String>,
    pub original_trigger: Option<CalculationTrigger>,
    pub triggered_by: String,
    pub expression: String,
    pub components: Vec<Component>,
    pub row_value_id: Option<String>,
    /// Rows read while resolving variables.
    pub row_ids: Vec<RowId>,
}

/// The outcome written when an evaluation finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogCompletion {
    pub duration_ms: u64,
    pub result: Option<Value>,
    pub error: Option<String>,
}

/// A stored execution log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionLogEntry {
    pub id: LogId,
    #[serde(flatten)]
    pub entry: NewLogEntry,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub duration_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
}

/// Persistence for execution log entries.
pub trait ExecutionLogStore: Send + Sync {
    fn create_log_entry(&self, entry: NewLogEntry) -> Result<LogId, LogError>;

    fn update_log_entry(&self, id: LogId, completion: LogCompletion) -> Result<(), LogError>;
}

/// Begins and completes log entries for one engine.
pub struct ExecutionLog<'a> {
    store: Option<&'a dyn ExecutionLogStore>,
    unset_display: &'a str,
}

impl<'a> ExecutionLog<'a> {
    pub fn new(store: Option<&'a dyn ExecutionLogStore>, unset_display: &'a str) -> Self {
        Self {
            store,
            unset_display,
        }
    }

    /// Whether an evaluation of `formula` is recorded at all.
    pub fn is_enabled(&self, formula: &Formula, debug: bool) -> bool {
        self.store.is_some() && formula.with_logs && !debug
    }

    /// Creates an entry when logging is enabled for the formula and the run is
    /// not a debug preview.
    pub fn begin(
        &self,
        formula: &Formula,
        context: &TriggerContext,
        trace: &ExpressionTrace,
        debug: bool,
    ) -> Result<Option<LogId>, LogError> {
        let Some(store) = self.store.filter(|_| self.is_enabled(formula, debug)) else {
            return Ok(None);
        };
        let entry = NewLogEntry {
            formula_id: formula.id.clone(),
            user_id: context.user_id.clone(),
            tenant_id: context.tenant_id.clone(),
            original_trigger: context.original_trigger,
            triggered_by: context.triggered_by.clone(),
            expression: TraceFormatter::format_trace(trace, self.unset_display),
            components: formula.components.clone(),
            row_value_id: context.row_value_id.clone(),
            row_ids: trace.row_ids.clone(),
        };
        store.create_log_entry(entry).map(Some)
    }

    /// Completes a previously begun entry. Does nothing for `None`.
    pub fn complete<E: std::fmt::Display>(
        &self,
        id: Option<LogId>,
        elapsed: Duration,
        outcome: &Result<Value, E>,
    ) -> Result<(), LogError> {
        let (Some(store), Some(id)) = (self.store, id) else {
            return Ok(());
        };
        let completion = match outcome {
            Ok(value) => LogCompletion {
                duration_ms: elapsed.as_millis() as u64,
                result: Some(value.clone()),
                error: None,
            },
            Err(e) => LogCompletion {
                duration_ms: elapsed.as_millis() as u64,
                result: None,
                error: Some(e.to_string()),
            },
        };
        store.update_log_entry(id, completion)
    }
}
