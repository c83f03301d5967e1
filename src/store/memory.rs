//! In-process collaborators backed by hash maps behind `RwLock`s.

use super::{EntitySchema, Row, RowId, RowStore, SchemaProvider};
use crate::ast::{Value, ValueSlots};
use crate::error::StoreError;
use ahash::AHashMap;
use std::sync::{Arc, RwLock};

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

/// Schemas held in memory, keyed by entity name.
#[derive(Debug, Default)]
pub struct MemorySchema {
    entities: AHashMap<String, Arc<EntitySchema>>,
}

impl MemorySchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, schema: EntitySchema) {
        self.entities.insert(schema.name.clone(), Arc::new(schema));
    }

    pub fn with_entity(mut self, schema: EntitySchema) -> Self {
        self.insert(schema);
        self
    }
}

impl SchemaProvider for MemorySchema {
    fn entity(&self, name: &str) -> Result<Arc<EntitySchema>, StoreError> {
        self.entities
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::EntityNotFound(name.to_string()))
    }
}

#[derive(Debug, Clone)]
struct StoredRow {
    row: Row,
    values: AHashMap<String, Value>,
}

/// A write performed through [`RowStore::write_property`].
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRecord {
    pub entity: String,
    pub row: RowId,
    pub property: String,
    pub value: ValueSlots,
}

type RowKey = (String, RowId);

/// Rows, relations and a journal of writes, all in memory.
#[derive(Debug, Default)]
pub struct MemoryRowStore {
    rows: RwLock<AHashMap<RowKey, StoredRow>>,
    // (entity, row, relationship id) -> related (entity, row) keys
    relations: RwLock<AHashMap<(String, RowId, String), Vec<RowKey>>>,
    writes: RwLock<Vec<WriteRecord>>,
}

impl MemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_row(&self, entity: &str, id: &str, order: f64) -> Result<(), StoreError> {
        let row = Row {
            id: id.to_string(),
            entity: entity.to_string(),
            order,
        };
        self.rows.write().map_err(poisoned)?.insert(
            (entity.to_string(), id.to_string()),
            StoredRow {
                row,
                values: AHashMap::new(),
            },
        );
        Ok(())
    }

    /// Stores a value without recording it as a write.
    pub fn set_value(
        &self,
        entity: &str,
        row: &str,
        property: &str,
        value: Value,
    ) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        let stored = rows
            .get_mut(&(entity.to_string(), row.to_string()))
            .ok_or_else(|| row_not_found(entity, row))?;
        stored.values.insert(property.to_string(), value);
        Ok(())
    }

    /// Links `row` to `target_row` through `relationship_id`.
    pub fn relate(
        &self,
        entity: &str,
        row: &str,
        relationship_id: &str,
        target_entity: &str,
        target_row: &str,
    ) -> Result<(), StoreError> {
        self.relations
            .write()
            .map_err(poisoned)?
            .entry((
                entity.to_string(),
                row.to_string(),
                relationship_id.to_string(),
            ))
            .or_default()
            .push((target_entity.to_string(), target_row.to_string()));
        Ok(())
    }

    /// Every write performed so far, oldest first.
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.writes
            .read()
            .map(|writes| writes.clone())
            .unwrap_or_default()
    }
}

fn row_not_found(entity: &str, row: &str) -> StoreError {
    StoreError::RowNotFound {
        entity: entity.to_string(),
        row: row.to_string(),
    }
}

impl RowStore for MemoryRowStore {
    fn row(&self, entity: &str, row: &str) -> Result<Row, StoreError> {
        self.rows
            .read()
            .map_err(poisoned)?
            .get(&(entity.to_string(), row.to_string()))
            .map(|stored| stored.row.clone())
            .ok_or_else(|| row_not_found(entity, row))
    }

    fn read_property(
        &self,
        entity: &str,
        row: &str,
        property: &str,
    ) -> Result<Value, StoreError> {
        self.rows
            .read()
            .map_err(poisoned)?
            .get(&(entity.to_string(), row.to_string()))
            .map(|stored| stored.values.get(property).cloned().unwrap_or_default())
            .ok_or_else(|| row_not_found(entity, row))
    }

    fn write_property(
        &self,
        entity: &str,
        row: &str,
        property: &str,
        value: &ValueSlots,
    ) -> Result<(), StoreError> {
        self.set_value(entity, row, property, value.to_value())?;
        self.writes.write().map_err(poisoned)?.push(WriteRecord {
            entity: entity.to_string(),
            row: row.to_string(),
            property: property.to_string(),
            value: value.clone(),
        });
        Ok(())
    }

    fn related_rows(
        &self,
        entity: &str,
        row: &str,
        relationship_id: &str,
    ) -> Result<Vec<Row>, StoreError> {
        let keys = self
            .relations
            .read()
            .map_err(poisoned)?
            .get(&(
                entity.to_string(),
                row.to_string(),
                relationship_id.to_string(),
            ))
            .cloned()
            .unwrap_or_default();
        keys.iter()
            .map(|(target_entity, target_row)| self.row(target_entity, target_row))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_journaled_and_readable() {
        let store = MemoryRowStore::new();
        store.insert_row("invoice", "inv-1", 0.0).unwrap();
        store
            .write_property("invoice", "inv-1", "total", &ValueSlots::number(12.0))
            .unwrap();

        assert_eq!(
            store.read_property("invoice", "inv-1", "total").unwrap(),
            Value::Number(12.0)
        );
        assert_eq!(store.writes().len(), 1);
        assert!(store.read_property("invoice", "missing", "total").is_err());
    }

    #[test]
    fn related_rows_follow_insertion_order() {
        let store = MemoryRowStore::new();
        store.insert_row("invoice", "inv-1", 0.0).unwrap();
        store.insert_row("line", "l-1", 0.0).unwrap();
        store.insert_row("line", "l-2", 1.0).unwrap();
        store.relate("invoice", "inv-1", "lines", "line", "l-2").unwrap();
        store.relate("invoice", "inv-1", "lines", "line", "l-1").unwrap();

        let related = store.related_rows("invoice", "inv-1", "lines").unwrap();
        let ids: Vec<_> = related.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["l-2", "l-1"]);
        assert!(store.related_rows("invoice", "inv-1", "other").unwrap().is_empty());
    }
}
