//! Boundaries to the collaborators that own schemas and row values.
//!
//! The engine never persists anything itself: it reads entity schemas from a
//! [`SchemaProvider`], reads and writes property values through a
//! [`RowStore`], and records evaluations in an
//! [`ExecutionLogStore`](crate::log::ExecutionLogStore). The `memory` module
//! holds in-process implementations.

use crate::ast::{Formula, Value, ValueSlots};
use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod memory;

pub type RowId = String;

/// A row of an entity, as handed out by the row store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: RowId,
    pub entity: String,
    /// Position of the row in its entity.
    #[serde(default)]
    pub order: f64,
}

/// Declared type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PropertyKind {
    #[default]
    Text,
    Number,
    Boolean,
    Date,
    MultiSelect,
    Range,
    Formula,
}

impl PropertyKind {
    /// Reads a loosely typed value as this kind. Only dates need it: text
    /// holding a date becomes a `Date`, everything else is kept as is.
    pub fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (PropertyKind::Date, Value::Text(text)) => {
                let parsed = Value::Text(text);
                parsed.as_date().map(Value::Date).unwrap_or(parsed)
            }
            (_, value) => value,
        }
    }

    /// Whether a stored value fits this property. `Null` always fits.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (PropertyKind::Formula, _) => true,
            (PropertyKind::Text, Value::Text(_))
            | (PropertyKind::Number, Value::Number(_))
            | (PropertyKind::Boolean, Value::Bool(_))
            | (PropertyKind::Date, Value::Date(_))
            | (PropertyKind::MultiSelect, Value::List(_))
            | (PropertyKind::Range, Value::Range { .. }) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: PropertyKind,
    #[serde(default)]
    pub default: Value,
    /// Present on formula-backed properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<Formula>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipKind {
    Parent,
    Child,
}

/// A parent or child relationship from one entity to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    /// Name of the related entity.
    pub entity: String,
    pub kind: RelationshipKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<PropertySchema>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl EntitySchema {
    pub fn property(&self, name: &str) -> Option<&PropertySchema> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// The relationship leading to `entity`, parents first.
    pub fn relationship_to(&self, entity: &str) -> Option<&Relationship> {
        self.relationships
            .iter()
            .filter(|r| r.entity == entity)
            .min_by_key(|r| match r.kind {
                RelationshipKind::Parent => 0,
                RelationshipKind::Child => 1,
            })
    }

    /// Properties whose value is computed by a formula.
    pub fn formula_properties(&self) -> impl Iterator<Item = (&PropertySchema, &Formula)> {
        self.properties
            .iter()
            .filter_map(|p| p.formula.as_ref().map(|f| (p, f)))
    }
}

/// Supplies entity schemas by name.
pub trait SchemaProvider: Send + Sync {
    fn entity(&self, name: &str) -> Result<Arc<EntitySchema>, StoreError>;
}

/// Keyed access to rows and their property values. Must allow concurrent
/// reads; each single write is assumed to be atomic.
pub trait RowStore: Send + Sync {
    fn row(&self, entity: &str, row: &str) -> Result<Row, StoreError>;

    fn read_property(&self, entity: &str, row: &str, property: &str)
    -> Result<Value, StoreError>;

    fn write_property(
        &self,
        entity: &str,
        row: &str,
        property: &str,
        value: &ValueSlots,
    ) -> Result<(), StoreError>;

    /// Rows reached from `row` through the relationship `relationship_id`.
    fn related_rows(
        &self,
        entity: &str,
        row: &str,
        relationship_id: &str,
    ) -> Result<Vec<Row>, StoreError>;

    fn property_default(&self, property: &PropertySchema) -> Result<Value, StoreError> {
        Ok(property.default.clone())
    }
}
