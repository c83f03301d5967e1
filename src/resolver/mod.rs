//! Resolution of variable paths against bindings and the entity graph.
//!
//! A path is either a plain identifier bound to a scalar, or
//! `<binding>.<entity>.<property>[.<function>]` where `<binding>` names a row
//! binding. The entity segment selects either the bound row's own entity or
//! an entity related to it as parent or child.

use crate::ast::{Formula, ResultType, Value, ValueSlots};
use crate::error::ResolutionError;
use crate::store::{EntitySchema, Row, RowId, RowStore, SchemaProvider};
use ahash::AHashMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

mod aggregate;

pub use aggregate::Aggregator;

/// The property name that reads a row's position instead of a stored value.
pub const ORDER_PROPERTY: &str = "order";

/// A value supplied to one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum VariableBinding {
    /// A scalar with at most one slot set.
    Plain(ValueSlots),
    /// A row whose entity graph variables are read from.
    Row { entity: String, item: RowId },
}

/// Bindings by name, built fresh for every evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableBindings(AHashMap<String, VariableBinding>);

impl VariableBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// The usual binding of a trigger run: one row named `row`.
    pub fn for_row(entity: &str, item: &str) -> Self {
        Self::new().with_row("row", entity, item)
    }

    pub fn with_plain(mut self, name: impl Into<String>, value: ValueSlots) -> Self {
        self.0.insert(name.into(), VariableBinding::Plain(value));
        self
    }

    pub fn with_row(mut self, name: impl Into<String>, entity: &str, item: &str) -> Self {
        self.0.insert(
            name.into(),
            VariableBinding::Row {
                entity: entity.to_string(),
                item: item.to_string(),
            },
        );
        self
    }

    pub fn get(&self, name: &str) -> Option<&VariableBinding> {
        self.0.get(name)
    }
}

/// Variable values ready for evaluation, plus every row they were read from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedValues {
    pub values: AHashMap<String, Value>,
    pub row_ids: Vec<RowId>,
}

pub struct VariableResolver<'a> {
    schema: &'a dyn SchemaProvider,
    rows: &'a dyn RowStore,
    result_as: ResultType,
}

impl<'a> VariableResolver<'a> {
    pub fn new(
        schema: &'a dyn SchemaProvider,
        rows: &'a dyn RowStore,
        result_as: ResultType,
    ) -> Self {
        Self {
            schema,
            rows,
            result_as,
        }
    }

    /// Resolves one path. `Ok(None)` means the variable is unset.
    pub fn resolve(
        &self,
        path: &str,
        bindings: &VariableBindings,
    ) -> Result<Option<Value>, ResolutionError> {
        self.resolve_path(path, bindings, &mut Vec::new())
    }

    /// Resolves every variable of `formula`. Unset variables are left out.
    pub fn resolve_all(
        &self,
        formula: &Formula,
        bindings: &VariableBindings,
    ) -> Result<ResolvedValues, ResolutionError> {
        let mut values = AHashMap::new();
        let mut touched = Vec::new();
        for path in formula.variable_paths() {
            if let Some(value) = self.resolve_path(path, bindings, &mut touched)? {
                values.insert(path.to_string(), value);
            }
        }
        Ok(ResolvedValues {
            values,
            row_ids: touched.into_iter().unique().collect(),
        })
    }

    fn resolve_path(
        &self,
        path: &str,
        bindings: &VariableBindings,
        touched: &mut Vec<RowId>,
    ) -> Result<Option<Value>, ResolutionError> {
        for namespace in ["user", "tenant"] {
            if path.strip_prefix(namespace).is_some_and(|rest| rest.starts_with('.')) {
                return Err(ResolutionError::UnsupportedNamespace {
                    namespace: namespace.to_string(),
                });
            }
        }

        let mut segments = path.split('.');
        let head = segments.next().unwrap_or_default();
        match bindings.get(head) {
            None => Ok(None),
            Some(VariableBinding::Plain(slots)) => {
                if segments.next().is_some() {
                    return Err(ResolutionError::UnknownPath {
                        path: path.to_string(),
                    });
                }
                Ok(Some(self.plain_value(slots)))
            }
            Some(VariableBinding::Row { entity, item }) => {
                let rest: Vec<&str> = segments.collect();
                self.resolve_row_path(path, entity, item, &rest, touched)
                    .map(Some)
            }
        }
    }

    fn plain_value(&self, slots: &ValueSlots) -> Value {
        let only_text = slots.text_value.is_some()
            && slots.number_value.is_none()
            && slots.date_value.is_none()
            && slots.boolean_value.is_none();
        match (&slots.text_value, self.result_as) {
            (Some(text), ResultType::Number) if only_text => {
                Value::Number(Value::from(text.as_str()).to_number())
            }
            _ => slots.to_value(),
        }
    }

    fn resolve_row_path(
        &self,
        path: &str,
        entity: &str,
        item: &str,
        segments: &[&str],
        touched: &mut Vec<RowId>,
    ) -> Result<Value, ResolutionError> {
        let unknown_path = || ResolutionError::UnknownPath {
            path: path.to_string(),
        };
        let (entity_name, property, aggregator) = match segments {
            [entity_name, property] => (*entity_name, *property, None),
            [entity_name, property, function] => (*entity_name, *property, Some(*function)),
            _ => return Err(unknown_path()),
        };

        let schema = self.schema.entity(entity)?;
        let row = self.rows.row(entity, item)?;
        touched.push(row.id.clone());

        if entity_name == schema.name {
            return self.own_value(&schema, &row, property, aggregator);
        }

        let relationship =
            schema
                .relationship_to(entity_name)
                .ok_or_else(|| ResolutionError::UnknownEntity {
                    path: path.to_string(),
                    entity: entity_name.to_string(),
                    from: schema.name.clone(),
                })?;
        let target = self.schema.entity(&relationship.entity)?;
        let declared = target.property(property);
        if property != ORDER_PROPERTY && declared.is_none() {
            return Err(ResolutionError::UnknownProperty {
                entity: target.name.clone(),
                property: property.to_string(),
            });
        }

        let related = self
            .rows
            .related_rows(&schema.name, &row.id, &relationship.id)?;
        match related.as_slice() {
            [] => match declared {
                Some(p) => Ok(self.rows.property_default(p)?),
                None => Ok(Value::Null),
            },
            [single] => {
                touched.push(single.id.clone());
                self.own_value(&target, single, property, aggregator)
            }
            many => {
                let function = match aggregator {
                    Some(name) => Aggregator::parse(name)?,
                    None => {
                        return Err(ResolutionError::MultipleValues {
                            path: path.to_string(),
                        });
                    }
                };
                let values = many
                    .iter()
                    .map(|r| {
                        touched.push(r.id.clone());
                        self.raw_value(&target, r, property)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(function.apply(values))
            }
        }
    }

    /// A property of one row, optionally reduced by a custom function.
    fn own_value(
        &self,
        schema: &EntitySchema,
        row: &Row,
        property: &str,
        aggregator: Option<&str>,
    ) -> Result<Value, ResolutionError> {
        let raw = self.raw_value(schema, row, property)?;
        match aggregator {
            None => Ok(raw),
            Some(name) => Ok(Aggregator::parse(name)?.apply(vec![raw])),
        }
    }

    fn raw_value(
        &self,
        schema: &EntitySchema,
        row: &Row,
        property: &str,
    ) -> Result<Value, ResolutionError> {
        if property == ORDER_PROPERTY {
            return Ok(Value::Number(row.order));
        }
        if schema.property(property).is_none() {
            return Err(ResolutionError::UnknownProperty {
                entity: schema.name.clone(),
                property: property.to_string(),
            });
        }
        Ok(self.rows.read_property(&schema.name, &row.id, property)?)
    }
}
