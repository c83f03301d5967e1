//! Common test utilities: an invoice/line entity graph and formula helpers.
use shiki::prelude::*;
use shiki::store::{Relationship, RelationshipKind};
use std::sync::Arc;

#[allow(dead_code)]
pub fn property(name: &str, kind: PropertyKind) -> PropertySchema {
    PropertySchema {
        name: name.to_string(),
        kind,
        default: Value::Null,
        formula: None,
    }
}

#[allow(dead_code)]
pub fn formula_property(name: &str, formula: Formula) -> PropertySchema {
    PropertySchema {
        name: name.to_string(),
        kind: PropertyKind::Formula,
        default: Value::Null,
        formula: Some(formula),
    }
}

/// `invoice` (number, discount) with child `line` rows (price, quantity).
/// A line's quantity defaults to 1.
///
/// The extra properties are appended to each entity, usually formula-backed ones.
#[allow(dead_code)]
pub fn invoice_schema(
    invoice_extra: Vec<PropertySchema>,
    line_extra: Vec<PropertySchema>,
) -> MemorySchema {
    let mut invoice_properties = vec![
        property("number", PropertyKind::Text),
        property("discount", PropertyKind::Number),
    ];
    invoice_properties.extend(invoice_extra);

    let mut quantity = property("quantity", PropertyKind::Number);
    quantity.default = Value::Number(1.0);
    let mut line_properties = vec![
        property("price", PropertyKind::Number),
        quantity,
    ];
    line_properties.extend(line_extra);

    MemorySchema::new()
        .with_entity(EntitySchema {
            name: "invoice".to_string(),
            properties: invoice_properties,
            relationships: vec![Relationship {
                id: "lines".to_string(),
                entity: "line".to_string(),
                kind: RelationshipKind::Child,
            }],
        })
        .with_entity(EntitySchema {
            name: "line".to_string(),
            properties: line_properties,
            relationships: vec![Relationship {
                id: "invoice".to_string(),
                entity: "invoice".to_string(),
                kind: RelationshipKind::Parent,
            }],
        })
}

/// Rows of the invoice graph:
///
/// - `inv-1`: discount 5, a stored "custom" label, lines `l1` (10 x 2) and `l2` (4 x 3)
/// - `inv-2`: no label, line `l3` (7 x 1)
/// - `inv-3`: no lines
#[allow(dead_code)]
pub fn seeded_rows() -> MemoryRowStore {
    let rows = MemoryRowStore::new();
    let invoices = [
        ("inv-1", 1.0, "INV-1", Some("custom")),
        ("inv-2", 2.0, "INV-2", None),
        ("inv-3", 3.0, "INV-3", None),
    ];
    for (id, order, number, label) in invoices {
        rows.insert_row("invoice", id, order).unwrap();
        rows.set_value("invoice", id, "number", Value::from(number))
            .unwrap();
        if let Some(label) = label {
            rows.set_value("invoice", id, "label", Value::from(label))
                .unwrap();
        }
    }
    rows.set_value("invoice", "inv-1", "discount", Value::Number(5.0))
        .unwrap();

    let lines = [
        ("l1", 1.0, "inv-1", 10.0, 2.0),
        ("l2", 2.0, "inv-1", 4.0, 3.0),
        ("l3", 1.0, "inv-2", 7.0, 1.0),
    ];
    for (id, order, invoice, price, quantity) in lines {
        rows.insert_row("line", id, order).unwrap();
        rows.set_value("line", id, "price", Value::Number(price))
            .unwrap();
        rows.set_value("line", id, "quantity", Value::Number(quantity))
            .unwrap();
        rows.relate("invoice", invoice, "lines", "line", id).unwrap();
        rows.relate("line", id, "invoice", "invoice", invoice).unwrap();
    }
    rows
}

/// Shared collaborators plus an engine factory.
#[allow(dead_code)]
pub struct Fixture {
    pub schema: Arc<MemorySchema>,
    pub rows: Arc<MemoryRowStore>,
    pub logs: Arc<MemoryLogStore>,
}

#[allow(dead_code)]
impl Fixture {
    pub fn new(invoice_extra: Vec<PropertySchema>, line_extra: Vec<PropertySchema>) -> Self {
        Self {
            schema: Arc::new(invoice_schema(invoice_extra, line_extra)),
            rows: Arc::new(seeded_rows()),
            logs: Arc::new(MemoryLogStore::new()),
        }
    }

    pub fn engine(&self) -> FormulaEngine {
        self.engine_with(EngineConfig::default())
    }

    pub fn engine_with(&self, config: EngineConfig) -> FormulaEngine {
        FormulaEngine::builder(self.schema.clone(), self.rows.clone())
            .with_log_store(self.logs.clone())
            .with_config(config)
            .build()
            .unwrap()
    }

    pub fn value(&self, entity: &str, row: &str, property: &str) -> Value {
        self.rows.read_property(entity, row, property).unwrap()
    }

    /// Number of journaled writes to `property`.
    pub fn writes_to(&self, property: &str) -> usize {
        self.rows
            .writes()
            .iter()
            .filter(|w| w.property == property)
            .count()
    }
}

/// `price * quantity` of the bound line.
#[allow(dead_code)]
pub fn line_amount_formula(trigger: CalculationTrigger) -> Formula {
    Formula::builder("line-amount")
        .trigger(trigger)
        .variable("row.line.price")
        .op(Operator::Multiply)
        .variable("row.line.quantity")
        .build()
}

/// Sum of the invoice's line prices minus its discount.
#[allow(dead_code)]
pub fn invoice_total_formula(trigger: CalculationTrigger) -> Formula {
    Formula::builder("invoice-total")
        .trigger(trigger)
        .variable("row.line.price.sum")
        .op(Operator::Subtract)
        .variable("row.invoice.discount")
        .build()
}

/// Evaluates components against a map of variable values.
#[allow(dead_code)]
pub fn eval_with(
    formula: &Formula,
    values: &[(&str, Value)],
) -> std::result::Result<Value, SyntaxError> {
    let resolved = values
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    shiki::evaluator::evaluate(formula, &resolved)
}

#[allow(dead_code)]
pub fn ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}
