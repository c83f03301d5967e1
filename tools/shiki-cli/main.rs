use clap::{Parser, Subcommand};
use shiki::prelude::*;
use std::fs;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Formula evaluation and trigger engine CLI
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Optional path to an engine config JSON file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a single formula and print its result and trace
    Eval {
        /// Path to the formula JSON file
        formula_path: String,
        /// Optional scenario JSON file providing the entity graph
        #[arg(short, long)]
        scenario: Option<String>,
        /// Optional JSON file with variable bindings
        #[arg(short, long)]
        bindings: Option<String>,
        /// Run as a preview that is never logged
        #[arg(long)]
        debug: bool,
    },
    /// Fire a lifecycle event for rows of an entity and print the report
    Trigger {
        /// Path to the scenario JSON file
        scenario_path: String,
        /// BEFORE_LISTED, AFTER_CREATED, BEFORE_VIEWED or AFTER_UPDATED
        event: LifecycleEvent,
        /// The entity whose rows are processed
        entity: String,
        /// Row ids to process; defaults to every row of the entity
        #[arg(short, long)]
        rows: Vec<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to load config: {}", e))),
        None => EngineConfig::default(),
    };

    match cli.command {
        Command::Eval {
            formula_path,
            scenario,
            bindings,
            debug,
        } => run_eval(config, &formula_path, scenario, bindings, debug),
        Command::Trigger {
            scenario_path,
            event,
            entity,
            rows,
        } => run_trigger(config, &scenario_path, event, &entity, rows),
    }
}

fn load_scenario(path: &str) -> Scenario {
    Scenario::from_file(path)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to load scenario: {}", e)))
}

fn build_engine(config: EngineConfig, scenario: Scenario, logs: Arc<MemoryLogStore>) -> FormulaEngine {
    let (schema, rows) = scenario
        .into_stores()
        .unwrap_or_else(|e| exit_with_error(&e.to_string()));
    FormulaEngine::builder(Arc::new(schema), Arc::new(rows))
        .with_log_store(logs)
        .with_config(config)
        .build()
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to build engine: {}", e)))
}

fn run_eval(
    config: EngineConfig,
    formula_path: &str,
    scenario_path: Option<String>,
    bindings_path: Option<String>,
    debug: bool,
) {
    let total_start = Instant::now();

    // --- 1. Loading ---
    let formula_json = fs::read_to_string(formula_path).unwrap_or_else(|e| {
        exit_with_error(&format!(
            "Failed to read formula file '{}': {}",
            formula_path, e
        ))
    });
    let formula: Formula = serde_json::from_str(&formula_json)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to parse formula JSON: {}", e)));
    let bindings: VariableBindings = match &bindings_path {
        Some(path) => {
            let json = fs::read_to_string(path).unwrap_or_else(|e| {
                exit_with_error(&format!("Failed to read bindings file '{}': {}", path, e))
            });
            serde_json::from_str(&json)
                .unwrap_or_else(|e| exit_with_error(&format!("Failed to parse bindings JSON: {}", e)))
        }
        None => VariableBindings::new(),
    };
    let scenario = scenario_path
        .as_deref()
        .map(load_scenario)
        .unwrap_or_default();

    let logs = Arc::new(MemoryLogStore::new());
    let engine = build_engine(config, scenario, logs.clone());

    // --- 2. Evaluation ---
    println!("Evaluating formula '{}'...", formula.id);
    let eval_start = Instant::now();
    let mut request = CalculationRequest::new(&formula, &bindings);
    if debug {
        request = request.debug();
    }
    let result = engine
        .calculate(request)
        .unwrap_or_else(|e| exit_with_error(&format!("Evaluation failed: {}", e)));
    let eval_duration = eval_start.elapsed();

    // --- 3. Results ---
    println!("  -> Result ({:?}): {}", formula.result_as, result.value);
    println!("  -> Expression: {}", result.expression);
    if !result.row_ids.is_empty() {
        println!("  -> Rows read: {}", result.row_ids.join(", "));
    }
    if let Some(entry) = result.log_id.and_then(|id| logs.get(id)) {
        println!("  -> Logged as entry {} ({} ms)", entry.id, entry.duration_ms.unwrap_or(0));
    }

    println!("\n--- Performance Summary ---");
    println!("Evaluation:           {:?}", eval_duration);
    println!("Total Execution:      {:?}", total_start.elapsed());
}

fn run_trigger(
    config: EngineConfig,
    scenario_path: &str,
    event: LifecycleEvent,
    entity: &str,
    rows: Vec<String>,
) {
    let total_start = Instant::now();
    let scenario = load_scenario(scenario_path);
    let rows = if rows.is_empty() {
        scenario.row_ids(entity)
    } else {
        rows
    };
    let logs = Arc::new(MemoryLogStore::new());
    let engine = build_engine(config, scenario, logs.clone());

    println!("Firing {} on {} row(s) of '{}'...", event, rows.len(), entity);
    let report = engine.trigger(event, entity, &rows);
    if let Some(error) = &report.error {
        exit_with_error(error);
    }

    for outcome in &report.outcomes {
        match &outcome.status {
            PairStatus::Written {
                value,
                triggered_by,
            } => println!(
                "  {}.{} = {} ({})",
                outcome.row, outcome.property, value, triggered_by
            ),
            PairStatus::Skipped => println!("  {}.{} skipped", outcome.row, outcome.property),
            PairStatus::Failed { error } => {
                println!("  {}.{} failed: {}", outcome.row, outcome.property, error)
            }
        }
    }

    println!("\n--- Trigger Summary ---");
    println!("Written:              {}", report.written());
    println!("Skipped:              {}", report.skipped());
    println!("Failed:               {}", report.failed());
    println!("Log Entries:          {}", logs.entries().len());
    println!("Total Execution:      {:?}", total_start.elapsed());
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
