//! Tests for trigger matching and per-row recomputation.
mod common;
use common::*;
use shiki::prelude::*;

fn label_formula() -> Formula {
    Formula::builder("invoice-label")
        .trigger(CalculationTrigger::IfUnset)
        .result_as(ResultType::String)
        .with_logs(true)
        .variable("row.invoice.number")
        .op(Operator::Concat)
        .value("-draft")
        .build()
}

#[test]
fn test_if_unset_only_writes_null_values() {
    let fixture = Fixture::new(vec![formula_property("label", label_formula())], vec![]);
    let engine = fixture.engine();

    let report = engine.trigger(
        LifecycleEvent::AfterUpdated,
        "invoice",
        &ids(&["inv-1", "inv-2"]),
    );

    assert_eq!(report.value("label", "inv-1"), None);
    assert_eq!(report.value("label", "inv-2"), Some(&Value::from("INV-2-draft")));
    assert_eq!(fixture.writes_to("label"), 1);
    assert_eq!(fixture.value("invoice", "inv-1", "label"), Value::from("custom"));
    assert_eq!(
        fixture.value("invoice", "inv-2", "label"),
        Value::from("INV-2-draft")
    );

    let entries = fixture.logs.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].entry.triggered_by, "IF_UNSET");
    assert_eq!(
        entries[0].entry.original_trigger,
        Some(CalculationTrigger::AfterUpdated)
    );
    assert_eq!(
        entries[0].entry.row_value_id.as_deref(),
        Some("invoice/inv-2/label")
    );
    assert_eq!(entries[0].result, Some(Value::from("INV-2-draft")));
}

#[test]
fn test_always_recomputes_on_every_event() {
    let fixture = Fixture::new(
        vec![],
        vec![formula_property(
            "amount",
            line_amount_formula(CalculationTrigger::Always),
        )],
    );
    fixture
        .rows
        .set_value("line", "l1", "amount", Value::Number(99.0))
        .unwrap();
    let engine = fixture.engine();

    for (i, event) in [
        LifecycleEvent::BeforeListed,
        LifecycleEvent::AfterCreated,
        LifecycleEvent::BeforeViewed,
        LifecycleEvent::AfterUpdated,
    ]
    .into_iter()
    .enumerate()
    {
        let report = engine.trigger(event, "line", &ids(&["l1", "l2"]));
        assert_eq!(report.written(), 2);
        assert_eq!(fixture.writes_to("amount"), (i + 1) * 2);
    }
    assert_eq!(fixture.value("line", "l1", "amount"), Value::Number(20.0));
    assert_eq!(fixture.value("line", "l2", "amount"), Value::Number(12.0));
}

#[test]
fn test_matching_event_triggers_and_others_skip() {
    let fixture = Fixture::new(
        vec![formula_property(
            "total",
            invoice_total_formula(CalculationTrigger::AfterUpdated),
        )],
        vec![],
    );
    let engine = fixture.engine();

    let skipped = engine.trigger(LifecycleEvent::BeforeViewed, "invoice", &ids(&["inv-1"]));
    assert_eq!(skipped.skipped(), 1);
    assert_eq!(fixture.writes_to("total"), 0);

    let report = engine.trigger(LifecycleEvent::AfterUpdated, "invoice", &ids(&["inv-1"]));
    assert_eq!(
        report.outcomes[0].status,
        PairStatus::Written {
            value: Value::Number(9.0),
            triggered_by: CalculationTrigger::AfterUpdated,
        }
    );
    assert_eq!(fixture.value("invoice", "inv-1", "total"), Value::Number(9.0));
}

#[test]
fn test_never_is_never_recomputed() {
    let fixture = Fixture::new(
        vec![formula_property(
            "total",
            invoice_total_formula(CalculationTrigger::Never),
        )],
        vec![],
    );
    let engine = fixture.engine();
    let report = engine.trigger(LifecycleEvent::AfterCreated, "invoice", &ids(&["inv-1", "inv-2"]));
    assert_eq!(report.skipped(), 2);
    assert!(fixture.rows.writes().is_empty());
}

#[test]
fn test_failures_are_isolated_per_pair() {
    // Without a function, a line price is ambiguous for an invoice with two lines.
    let first_price = Formula::builder("first-price")
        .trigger(CalculationTrigger::Always)
        .variable("row.line.price")
        .build();
    let fixture = Fixture::new(
        vec![
            formula_property("first_price", first_price),
            formula_property("total", invoice_total_formula(CalculationTrigger::Always)),
        ],
        vec![],
    );
    let engine = fixture.engine();
    let report = engine.trigger(LifecycleEvent::AfterUpdated, "invoice", &ids(&["inv-1", "inv-2"]));

    assert_eq!(report.outcomes.len(), 4);
    assert_eq!(report.failed(), 1);
    let failure = report
        .outcomes
        .iter()
        .find(|o| matches!(o.status, PairStatus::Failed { .. }))
        .unwrap();
    assert_eq!((failure.property.as_str(), failure.row.as_str()), ("first_price", "inv-1"));

    assert_eq!(report.value("first_price", "inv-2"), Some(&Value::Number(7.0)));
    assert_eq!(report.value("total", "inv-1"), Some(&Value::Number(9.0)));
    assert_eq!(report.value("total", "inv-2"), Some(&Value::Number(7.0)));
}

#[test]
fn test_logged_syntax_failures_keep_the_error() {
    let broken = Formula::builder("broken")
        .trigger(CalculationTrigger::Always)
        .with_logs(true)
        .value(1.0)
        .op(Operator::Add)
        .open()
        .value(2.0)
        .build();
    let fixture = Fixture::new(vec![formula_property("broken", broken)], vec![]);
    let report = fixture
        .engine()
        .trigger(LifecycleEvent::AfterCreated, "invoice", &ids(&["inv-1"]));

    assert_eq!(report.failed(), 1);
    let entries = fixture.logs.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].result, None);
    assert!(entries[0].error.as_deref().unwrap().contains("never closed"));
}

#[test]
fn test_logged_resolution_failures_complete_the_entry() {
    let ambiguous = Formula::builder("ambiguous")
        .trigger(CalculationTrigger::Always)
        .with_logs(true)
        .variable("row.line.price")
        .build();
    let fixture = Fixture::new(vec![formula_property("ambiguous", ambiguous)], vec![]);
    fixture
        .engine()
        .trigger(LifecycleEvent::AfterCreated, "invoice", &ids(&["inv-1"]));

    let entries = fixture.logs.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].result, None);
    assert!(entries[0].error.as_deref().unwrap().contains("multiple values"));
    assert!(entries[0].duration_ms.is_some());
}

#[test]
fn test_unknown_entity_and_rows() {
    let fixture = Fixture::new(
        vec![formula_property("total", invoice_total_formula(CalculationTrigger::Always))],
        vec![],
    );
    let engine = fixture.engine();

    let report = engine.trigger(LifecycleEvent::AfterCreated, "customer", &ids(&["c1"]));
    assert!(report.error.is_some());
    assert!(report.outcomes.is_empty());

    let report = engine.trigger(LifecycleEvent::AfterCreated, "invoice", &ids(&["ghost", "inv-2"]));
    assert_eq!(report.failed(), 1);
    assert_eq!(report.written(), 1);
}

#[test]
fn test_parallel_and_sequential_runs_agree() {
    let invoice_props = || {
        vec![
            formula_property("total", invoice_total_formula(CalculationTrigger::Always)),
            formula_property("label", label_formula()),
        ]
    };
    let rows = ids(&["inv-1", "inv-2", "inv-3"]);

    let sequential = Fixture::new(invoice_props(), vec![]);
    let sequential_report = sequential
        .engine_with(EngineConfig {
            parallel: false,
            ..EngineConfig::default()
        })
        .trigger(LifecycleEvent::AfterUpdated, "invoice", &rows);

    let pooled = Fixture::new(invoice_props(), vec![]);
    let pooled_report = pooled
        .engine_with(EngineConfig {
            num_threads: Some(2),
            ..EngineConfig::default()
        })
        .trigger(LifecycleEvent::AfterUpdated, "invoice", &rows);

    let mut a = sequential_report.outcomes.clone();
    let mut b = pooled_report.outcomes.clone();
    a.sort_by(|x, y| (&x.property, &x.row).cmp(&(&y.property, &y.row)));
    b.sort_by(|x, y| (&x.property, &x.row).cmp(&(&y.property, &y.row)));
    assert_eq!(a, b);
    assert_eq!(sequential_report.written(), 5);
}
