//! Reactive recomputation of formula-backed properties.
//!
//! For every (formula property, row) pair of an entity, the orchestrator
//! decides whether the firing lifecycle event requires a recomputation,
//! evaluates the formula against the row, and writes the typed result back to
//! the row store. Pairs are independent: they run concurrently and a failing
//! pair never cancels or fails its siblings.

use crate::ast::{CalculationTrigger, Formula, Value};
use crate::engine::{CalculationRequest, FormulaEngine};
use crate::error::{StoreError, TriggerError};
use crate::log::TriggerContext;
use crate::resolver::VariableBindings;
use crate::store::{PropertySchema, RowId};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Row lifecycle events that can fire a recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleEvent {
    BeforeListed,
    AfterCreated,
    BeforeViewed,
    AfterUpdated,
}

impl From<LifecycleEvent> for CalculationTrigger {
    fn from(event: LifecycleEvent) -> Self {
        match event {
            LifecycleEvent::BeforeListed => CalculationTrigger::BeforeListed,
            LifecycleEvent::AfterCreated => CalculationTrigger::AfterCreated,
            LifecycleEvent::BeforeViewed => CalculationTrigger::BeforeViewed,
            LifecycleEvent::AfterUpdated => CalculationTrigger::AfterUpdated,
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(CalculationTrigger::from(*self).as_str())
    }
}

impl FromStr for LifecycleEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "BEFORE_LISTED" => Ok(LifecycleEvent::BeforeListed),
            "AFTER_CREATED" => Ok(LifecycleEvent::AfterCreated),
            "BEFORE_VIEWED" => Ok(LifecycleEvent::BeforeViewed),
            "AFTER_UPDATED" => Ok(LifecycleEvent::AfterUpdated),
            other => Err(format!("Unknown lifecycle event '{}'", other)),
        }
    }
}

/// Whether a pair is recomputed, and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDecision {
    Calculate { triggered_by: CalculationTrigger },
    Skip,
}

impl TriggerDecision {
    /// Matches the configured trigger against the firing one.
    ///
    /// An exact match wins, then `ALWAYS`, then `IF_UNSET`, which reads the
    /// stored value through `current` and only recomputes when it is null.
    /// `current` is not called for any other trigger.
    pub fn decide<F>(
        configured: CalculationTrigger,
        firing: CalculationTrigger,
        current: F,
    ) -> Result<Self, StoreError>
    where
        F: FnOnce() -> Result<Value, StoreError>,
    {
        if configured == firing {
            return Ok(TriggerDecision::Calculate {
                triggered_by: firing,
            });
        }
        match configured {
            CalculationTrigger::Always => Ok(TriggerDecision::Calculate {
                triggered_by: CalculationTrigger::Always,
            }),
            CalculationTrigger::IfUnset if current()?.is_null() => {
                Ok(TriggerDecision::Calculate {
                    triggered_by: CalculationTrigger::IfUnset,
                })
            }
            _ => Ok(TriggerDecision::Skip),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PairStatus {
    Written {
        value: Value,
        triggered_by: CalculationTrigger,
    },
    Skipped,
    Failed {
        error: String,
    },
}

/// What happened to one (property, row) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PairOutcome {
    pub property: String,
    pub row: RowId,
    pub status: PairStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriggerReport {
    pub event: LifecycleEvent,
    pub entity: String,
    pub outcomes: Vec<PairOutcome>,
    /// Set when the run could not start at all, e.g. for an unknown entity.
    pub error: Option<String>,
}

impl TriggerReport {
    /// The value written for a pair; `None` when it was skipped or failed.
    pub fn value(&self, property: &str, row: &str) -> Option<&Value> {
        self.outcomes
            .iter()
            .find(|o| o.property == property && o.row == row)
            .and_then(|o| match &o.status {
                PairStatus::Written { value, .. } => Some(value),
                _ => None,
            })
    }

    pub fn written(&self) -> usize {
        self.count(|s| matches!(s, PairStatus::Written { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, PairStatus::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, PairStatus::Failed { .. }))
    }

    fn count(&self, predicate: impl Fn(&PairStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(&o.status)).count()
    }
}

pub struct TriggerOrchestrator<'e> {
    engine: &'e FormulaEngine,
}

impl<'e> TriggerOrchestrator<'e> {
    pub fn new(engine: &'e FormulaEngine) -> Self {
        Self { engine }
    }

    pub fn run(&self, event: LifecycleEvent, entity: &str, rows: &[RowId]) -> TriggerReport {
        let schema = match self.engine.schema().entity(entity) {
            Ok(schema) => schema,
            Err(e) => {
                warn!(entity, %event, error = %e, "Trigger skipped");
                return TriggerReport {
                    event,
                    entity: entity.to_string(),
                    outcomes: Vec::new(),
                    error: Some(e.to_string()),
                };
            }
        };

        let properties: Vec<(&PropertySchema, &Formula)> = schema.formula_properties().collect();
        let outcomes = self
            .engine
            .install(|| self.fan_out(event, &schema.name, &properties, rows));

        let report = TriggerReport {
            event,
            entity: schema.name.clone(),
            outcomes,
            error: None,
        };
        info!(
            entity,
            %event,
            written = report.written(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Trigger processed"
        );
        report
    }

    /// One task per property, and within it one task per row.
    fn fan_out(
        &self,
        event: LifecycleEvent,
        entity: &str,
        properties: &[(&PropertySchema, &Formula)],
        rows: &[RowId],
    ) -> Vec<PairOutcome> {
        if self.engine.config().parallel {
            properties
                .par_iter()
                .flat_map(|(property, formula)| {
                    rows.par_iter()
                        .map(|row| self.process_pair(event, entity, property, formula, row))
                        .collect::<Vec<_>>()
                })
                .collect()
        } else {
            properties
                .iter()
                .flat_map(move |(property, formula)| {
                    rows.iter()
                        .map(move |row| self.process_pair(event, entity, property, formula, row))
                })
                .collect()
        }
    }

    fn process_pair(
        &self,
        event: LifecycleEvent,
        entity: &str,
        property: &PropertySchema,
        formula: &Formula,
        row: &str,
    ) -> PairOutcome {
        let status = match self.recompute(event, entity, property, formula, row) {
            Ok(Some((value, triggered_by))) => PairStatus::Written {
                value,
                triggered_by,
            },
            Ok(None) => PairStatus::Skipped,
            Err(e) => {
                let logged = matches!(e, TriggerError::Calculation(_))
                    && self.engine.execution_log().is_enabled(formula, false);
                if logged {
                    debug!(entity, row, property = %property.name, error = %e, "Recomputation failed");
                } else {
                    warn!(entity, row, property = %property.name, error = %e, "Recomputation failed");
                }
                PairStatus::Failed {
                    error: e.to_string(),
                }
            }
        };
        PairOutcome {
            property: property.name.clone(),
            row: row.to_string(),
            status,
        }
    }

    fn recompute(
        &self,
        event: LifecycleEvent,
        entity: &str,
        property: &PropertySchema,
        formula: &Formula,
        row: &str,
    ) -> Result<Option<(Value, CalculationTrigger)>, TriggerError> {
        let rows = self.engine.rows();
        let firing = CalculationTrigger::from(event);
        let decision = TriggerDecision::decide(formula.calculation_trigger, firing, || {
            rows.read_property(entity, row, &property.name)
        })?;
        let TriggerDecision::Calculate { triggered_by } = decision else {
            return Ok(None);
        };

        let bindings = VariableBindings::for_row(entity, row);
        let context = TriggerContext {
            original_trigger: Some(firing),
            triggered_by: triggered_by.as_str().to_string(),
            row_value_id: Some(format!("{}/{}/{}", entity, row, property.name)),
            ..TriggerContext::default()
        };
        let result = self
            .engine
            .calculate(CalculationRequest::new(formula, &bindings).with_context(context))?;

        let slots = formula.result_as.to_slots(&result.value);
        rows.write_property(entity, row, &property.name, &slots)?;
        Ok(Some((result.value, triggered_by)))
    }
}
