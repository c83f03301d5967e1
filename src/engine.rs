use crate::ast::{ExpressionTrace, Formula, Value};
use crate::error::{CalculationError, ConfigError};
use crate::evaluator;
use crate::log::{ExecutionLog, ExecutionLogStore, LogId, TriggerContext};
use crate::resolver::{VariableBindings, VariableResolver};
use crate::store::{RowId, RowStore, SchemaProvider};
use crate::trace::TraceFormatter;
use crate::trigger::{LifecycleEvent, TriggerOrchestrator, TriggerReport};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Engine settings. Every field has a default, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Fan trigger work out over a rayon pool instead of running it in sequence.
    pub parallel: bool,
    /// Size of a dedicated pool. `None` uses rayon's global pool.
    pub num_threads: Option<usize>,
    /// Shown in traces for variables that resolved to nothing.
    pub unset_display: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            num_threads: None,
            unset_display: "<unset>".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::JsonParseError(e.to_string()))
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&content)
    }
}

/// One call to [`FormulaEngine::calculate`].
pub struct CalculationRequest<'a> {
    pub formula: &'a Formula,
    pub bindings: &'a VariableBindings,
    pub context: TriggerContext,
    /// Preview runs are never logged.
    pub debug: bool,
}

impl<'a> CalculationRequest<'a> {
    pub fn new(formula: &'a Formula, bindings: &'a VariableBindings) -> Self {
        Self {
            formula,
            bindings,
            context: TriggerContext::default(),
            debug: false,
        }
    }

    pub fn with_context(mut self, context: TriggerContext) -> Self {
        self.context = context;
        self
    }

    pub fn debug(mut self) -> Self {
        self.debug = true;
        self
    }
}

/// The outcome of a successful calculation.
#[derive(Debug, Clone, PartialEq)]
pub struct EndResult {
    /// The result, cast to the formula's declared type.
    pub value: Value,
    /// Human-readable reconstruction of the evaluated expression.
    pub expression: String,
    /// Rows read while resolving variables.
    pub row_ids: Vec<RowId>,
    pub log_id: Option<LogId>,
}

/// Evaluates formulas against the entity graph and recomputes formula-backed
/// properties on lifecycle events.
///
/// The engine holds no per-evaluation state and can be shared across threads.
pub struct FormulaEngine {
    schema: Arc<dyn SchemaProvider>,
    rows: Arc<dyn RowStore>,
    logs: Option<Arc<dyn ExecutionLogStore>>,
    config: EngineConfig,
    pool: Option<rayon::ThreadPool>,
}

pub struct FormulaEngineBuilder {
    schema: Arc<dyn SchemaProvider>,
    rows: Arc<dyn RowStore>,
    logs: Option<Arc<dyn ExecutionLogStore>>,
    config: EngineConfig,
}

impl FormulaEngineBuilder {
    pub fn new(schema: Arc<dyn SchemaProvider>, rows: Arc<dyn RowStore>) -> Self {
        Self {
            schema,
            rows,
            logs: None,
            config: EngineConfig::default(),
        }
    }

    pub fn with_log_store(mut self, logs: Arc<dyn ExecutionLogStore>) -> Self {
        self.logs = Some(logs);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<FormulaEngine, ConfigError> {
        let pool = match self.config.num_threads {
            Some(threads) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("shiki-worker-{}", i))
                    .build()
                    .map_err(|e| ConfigError::ThreadPool(e.to_string()))?,
            ),
            None => None,
        };
        Ok(FormulaEngine {
            schema: self.schema,
            rows: self.rows,
            logs: self.logs,
            config: self.config,
            pool,
        })
    }
}

impl FormulaEngine {
    pub fn builder(
        schema: Arc<dyn SchemaProvider>,
        rows: Arc<dyn RowStore>,
    ) -> FormulaEngineBuilder {
        FormulaEngineBuilder::new(schema, rows)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn schema(&self) -> &dyn SchemaProvider {
        self.schema.as_ref()
    }

    pub(crate) fn rows(&self) -> &dyn RowStore {
        self.rows.as_ref()
    }

    pub(crate) fn execution_log(&self) -> ExecutionLog<'_> {
        ExecutionLog::new(self.logs.as_deref(), &self.config.unset_display)
    }

    /// Runs `op` on the dedicated pool when one is configured.
    pub(crate) fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    /// Resolves the formula's variables, evaluates it and logs the run.
    ///
    /// Returns a [`CalculationError`] for malformed component sequences and
    /// unresolvable variables. A log entry is written (when enabled) for
    /// failures as well as successes; failing to write it never fails the
    /// calculation.
    #[tracing::instrument(skip(self, request), fields(formula = %request.formula.id), level = "debug")]
    pub fn calculate(&self, request: CalculationRequest<'_>) -> Result<EndResult, CalculationError> {
        let started = Instant::now();
        let formula = request.formula;

        let resolver =
            VariableResolver::new(self.schema.as_ref(), self.rows.as_ref(), formula.result_as);
        let resolved = resolver.resolve_all(formula, request.bindings);
        let trace = match &resolved {
            Ok(r) => ExpressionTrace::build(&formula.components, &r.values, r.row_ids.clone()),
            Err(_) => ExpressionTrace::build(&formula.components, &AHashMap::new(), Vec::new()),
        };

        let log = self.execution_log();
        let log_id = log
            .begin(formula, &request.context, &trace, request.debug)
            .unwrap_or_else(|e| {
                warn!(formula = %formula.id, error = %e, "Failed to create execution log entry");
                None
            });

        let outcome: Result<Value, CalculationError> = resolved
            .map_err(CalculationError::from)
            .and_then(|r| Ok(evaluator::evaluate(formula, &r.values)?));

        if let Err(e) = log.complete(log_id, started.elapsed(), &outcome) {
            warn!(formula = %formula.id, error = %e, "Failed to complete execution log entry");
        }

        let value = outcome?;
        debug!(formula = %formula.id, result = %value, "Formula evaluated");
        Ok(EndResult {
            value,
            expression: TraceFormatter::format_trace(&trace, &self.config.unset_display),
            row_ids: trace.row_ids,
            log_id,
        })
    }

    /// Recomputes every formula-backed property of `entity` on `rows` whose
    /// calculation trigger matches `event`.
    ///
    /// Never fails: problems with single (property, row) pairs are reported
    /// in the returned [`TriggerReport`] and do not affect other pairs.
    #[tracing::instrument(skip(self, rows), fields(rows = rows.len()), level = "debug")]
    pub fn trigger(&self, event: LifecycleEvent, entity: &str, rows: &[RowId]) -> TriggerReport {
        TriggerOrchestrator::new(self).run(event, entity, rows)
    }
}
