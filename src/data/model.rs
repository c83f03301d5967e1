use crate::ast::Value;
use crate::error::ConfigError;
use crate::store::memory::{MemoryRowStore, MemorySchema};
use crate::store::{EntitySchema, RowId};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fs;

/// A row with its stored values, as written in a scenario file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScenarioRow {
    pub entity: String,
    pub id: RowId,
    #[serde(default)]
    pub order: f64,
    #[serde(default)]
    pub values: AHashMap<String, Value>,
}

/// A link from one row to another through a declared relationship.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioRelation {
    pub entity: String,
    pub row: RowId,
    pub relationship: String,
    pub target_entity: String,
    pub target_row: RowId,
}

/// A self-contained entity graph: schemas, rows and relations, loadable
/// from JSON and turned into in-memory collaborators.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Scenario {
    pub entities: Vec<EntitySchema>,
    #[serde(default)]
    pub rows: Vec<ScenarioRow>,
    #[serde(default)]
    pub relations: Vec<ScenarioRelation>,
}

impl Scenario {
    /// Load a scenario from a JSON file.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::JsonParseError(e.to_string()))
    }

    /// Row ids of `entity`, in row order.
    pub fn row_ids(&self, entity: &str) -> Vec<RowId> {
        let mut rows: Vec<&ScenarioRow> = self.rows.iter().filter(|r| r.entity == entity).collect();
        rows.sort_by(|a, b| a.order.total_cmp(&b.order));
        rows.into_iter().map(|r| r.id.clone()).collect()
    }

    /// Validates the scenario and loads it into in-memory stores.
    ///
    /// Every row must belong to a declared entity, every stored value must
    /// name a declared property and fit its type, and every relation must use
    /// a relationship declared on its source entity.
    pub fn into_stores(self) -> Result<(MemorySchema, MemoryRowStore), ConfigError> {
        let mut declared_entities = self.entities;
        for entity in &mut declared_entities {
            for property in &mut entity.properties {
                property.default = property.kind.coerce(std::mem::take(&mut property.default));
            }
        }
        let entities: AHashMap<&str, &EntitySchema> =
            declared_entities.iter().map(|e| (e.name.as_str(), e)).collect();
        let rows = MemoryRowStore::new();

        for row in &self.rows {
            let schema = entities
                .get(row.entity.as_str())
                .ok_or_else(|| invalid(format!("row '{}' uses unknown entity '{}'", row.id, row.entity)))?;
            rows.insert_row(&row.entity, &row.id, row.order)
                .map_err(|e| invalid(e.to_string()))?;
            for (property, value) in &row.values {
                let declared = schema.property(property).ok_or_else(|| {
                    invalid(format!(
                        "row '{}' sets undeclared property '{}.{}'",
                        row.id, row.entity, property
                    ))
                })?;
                let value = declared.kind.coerce(value.clone());
                if !declared.kind.accepts(&value) {
                    return Err(invalid(format!(
                        "{} value {} does not fit property '{}.{}' of type {:?}",
                        value.kind(),
                        value,
                        row.entity,
                        property,
                        declared.kind
                    )));
                }
                rows.set_value(&row.entity, &row.id, property, value)
                    .map_err(|e| invalid(e.to_string()))?;
            }
        }

        for relation in &self.relations {
            let declared = entities
                .get(relation.entity.as_str())
                .and_then(|e| e.relationships.iter().find(|r| r.id == relation.relationship))
                .ok_or_else(|| {
                    invalid(format!(
                        "relationship '{}' is not declared on entity '{}'",
                        relation.relationship, relation.entity
                    ))
                })?;
            if declared.entity != relation.target_entity {
                return Err(invalid(format!(
                    "relationship '{}' leads to '{}', not '{}'",
                    relation.relationship, declared.entity, relation.target_entity
                )));
            }
            rows.relate(
                &relation.entity,
                &relation.row,
                &relation.relationship,
                &relation.target_entity,
                &relation.target_row,
            )
            .map_err(|e| invalid(e.to_string()))?;
        }

        let schema = declared_entities
            .into_iter()
            .fold(MemorySchema::new(), MemorySchema::with_entity);
        Ok((schema, rows))
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Scenario(message)
}
