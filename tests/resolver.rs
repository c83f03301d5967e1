//! Tests for resolving variable paths against bindings and the entity graph.
mod common;
use common::*;
use shiki::error::StoreError;
use shiki::prelude::*;
use shiki::resolver::VariableResolver;

fn resolve(
    fixture: &Fixture,
    entity: &str,
    row: &str,
    path: &str,
) -> std::result::Result<Option<Value>, ResolutionError> {
    let resolver = VariableResolver::new(
        fixture.schema.as_ref(),
        fixture.rows.as_ref(),
        ResultType::Number,
    );
    resolver.resolve(path, &VariableBindings::for_row(entity, row))
}

#[test]
fn test_own_properties() {
    let fixture = Fixture::new(vec![], vec![]);
    assert_eq!(
        resolve(&fixture, "line", "l1", "row.line.price").unwrap(),
        Some(Value::Number(10.0))
    );
    assert_eq!(
        resolve(&fixture, "line", "l2", "row.line.order").unwrap(),
        Some(Value::Number(2.0))
    );
    // Declared but never stored.
    assert_eq!(
        resolve(&fixture, "invoice", "inv-2", "row.invoice.discount").unwrap(),
        Some(Value::Null)
    );
}

#[test]
fn test_single_related_row_returns_its_value() {
    let fixture = Fixture::new(vec![], vec![]);
    assert_eq!(
        resolve(&fixture, "line", "l2", "row.invoice.discount").unwrap(),
        Some(Value::Number(5.0))
    );
    assert_eq!(
        resolve(&fixture, "invoice", "inv-2", "row.line.price").unwrap(),
        Some(Value::Number(7.0))
    );
}

#[test]
fn test_no_related_rows_returns_the_default() {
    let fixture = Fixture::new(vec![], vec![]);
    assert_eq!(
        resolve(&fixture, "invoice", "inv-3", "row.line.quantity").unwrap(),
        Some(Value::Number(1.0))
    );
    assert_eq!(
        resolve(&fixture, "invoice", "inv-3", "row.line.price").unwrap(),
        Some(Value::Null)
    );
}

#[test]
fn test_many_related_rows_need_a_function() {
    let fixture = Fixture::new(vec![], vec![]);
    assert_eq!(
        resolve(&fixture, "invoice", "inv-1", "row.line.price"),
        Err(ResolutionError::MultipleValues {
            path: "row.line.price".to_string()
        })
    );
    assert_eq!(
        resolve(&fixture, "invoice", "inv-1", "row.line.price.sum").unwrap(),
        Some(Value::Number(14.0))
    );
    assert_eq!(
        resolve(&fixture, "invoice", "inv-1", "row.line.quantity.count").unwrap(),
        Some(Value::Number(2.0))
    );
    assert_eq!(
        resolve(&fixture, "invoice", "inv-1", "row.line.price.max").unwrap(),
        Some(Value::Number(10.0))
    );
}

#[test]
fn test_unsupported_functions_and_namespaces() {
    let fixture = Fixture::new(vec![], vec![]);
    assert_eq!(
        resolve(&fixture, "invoice", "inv-1", "row.line.price.inverse"),
        Err(ResolutionError::NotImplemented {
            name: "inverse".to_string()
        })
    );
    assert!(matches!(
        resolve(&fixture, "invoice", "inv-1", "row.line.price.median"),
        Err(ResolutionError::UnsupportedAggregator { .. })
    ));
    assert_eq!(
        resolve(&fixture, "invoice", "inv-1", "user.email"),
        Err(ResolutionError::UnsupportedNamespace {
            namespace: "user".to_string()
        })
    );
    assert_eq!(
        resolve(&fixture, "invoice", "inv-1", "tenant.name"),
        Err(ResolutionError::UnsupportedNamespace {
            namespace: "tenant".to_string()
        })
    );
}

#[test]
fn test_invalid_paths() {
    let fixture = Fixture::new(vec![], vec![]);
    assert!(matches!(
        resolve(&fixture, "invoice", "inv-1", "row.customer.name"),
        Err(ResolutionError::UnknownEntity { .. })
    ));
    assert_eq!(
        resolve(&fixture, "invoice", "inv-1", "row.line.colour"),
        Err(ResolutionError::UnknownProperty {
            entity: "line".to_string(),
            property: "colour".to_string()
        })
    );
    assert!(matches!(
        resolve(&fixture, "invoice", "inv-1", "row.invoice"),
        Err(ResolutionError::UnknownPath { .. })
    ));
    assert_eq!(
        resolve(&fixture, "invoice", "ghost", "row.invoice.number"),
        Err(ResolutionError::Store(StoreError::RowNotFound {
            entity: "invoice".to_string(),
            row: "ghost".to_string()
        }))
    );
}

#[test]
fn test_missing_binding_is_unset() {
    let fixture = Fixture::new(vec![], vec![]);
    assert_eq!(
        resolve(&fixture, "invoice", "inv-1", "rate").unwrap(),
        None
    );
}

#[test]
fn test_plain_bindings() {
    let fixture = Fixture::new(vec![], vec![]);
    let bindings = VariableBindings::new()
        .with_plain("rate", ValueSlots::text("2.5"))
        .with_plain("active", ValueSlots::boolean(true));

    let numeric = VariableResolver::new(
        fixture.schema.as_ref(),
        fixture.rows.as_ref(),
        ResultType::Number,
    );
    assert_eq!(
        numeric.resolve("rate", &bindings).unwrap(),
        Some(Value::Number(2.5))
    );
    assert_eq!(
        numeric.resolve("active", &bindings).unwrap(),
        Some(Value::Bool(true))
    );
    assert!(matches!(
        numeric.resolve("rate.value", &bindings),
        Err(ResolutionError::UnknownPath { .. })
    ));

    let textual = VariableResolver::new(
        fixture.schema.as_ref(),
        fixture.rows.as_ref(),
        ResultType::String,
    );
    assert_eq!(
        textual.resolve("rate", &bindings).unwrap(),
        Some(Value::from("2.5"))
    );
}

#[test]
fn test_resolve_all_records_touched_rows() {
    let fixture = Fixture::new(vec![], vec![]);
    let resolver = VariableResolver::new(
        fixture.schema.as_ref(),
        fixture.rows.as_ref(),
        ResultType::Number,
    );
    let formula = invoice_total_formula(CalculationTrigger::Always);
    let resolved = resolver
        .resolve_all(&formula, &VariableBindings::for_row("invoice", "inv-1"))
        .unwrap();

    assert_eq!(resolved.values.get("row.line.price.sum"), Some(&Value::Number(14.0)));
    assert_eq!(resolved.values.get("row.invoice.discount"), Some(&Value::Number(5.0)));
    assert_eq!(resolved.row_ids, ids(&["inv-1", "l1", "l2"]));
}
