use super::{ExecutionLogEntry, ExecutionLogStore, LogCompletion, LogId, NewLogEntry};
use crate::error::LogError;
use chrono::Utc;
use std::sync::RwLock;

/// Log entries kept in memory, with the queries an audit view needs.
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    entries: RwLock<Vec<ExecutionLogEntry>>,
}

fn poisoned<T>(_: T) -> LogError {
    LogError::Backend("lock poisoned".to_string())
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ExecutionLogEntry> {
        self.entries
            .read()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn get(&self, id: LogId) -> Option<ExecutionLogEntry> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.iter().find(|e| e.id == id).cloned())
    }

    /// Entries of one formula, newest first. `page` starts at 1.
    pub fn entries_for_formula(
        &self,
        formula_id: &str,
        page: usize,
        per_page: usize,
    ) -> Vec<ExecutionLogEntry> {
        let skip = page.saturating_sub(1).saturating_mul(per_page);
        self.entries()
            .into_iter()
            .rev()
            .filter(|e| e.entry.formula_id == formula_id)
            .skip(skip)
            .take(per_page)
            .collect()
    }

    /// Entries whose evaluation read the given row.
    pub fn entries_touching_row(&self, row_id: &str) -> Vec<ExecutionLogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.entry.row_ids.iter().any(|id| id == row_id))
            .collect()
    }
}

impl ExecutionLogStore for MemoryLogStore {
    fn create_log_entry(&self, entry: NewLogEntry) -> Result<LogId, LogError> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        let id = entries.len() as LogId + 1;
        entries.push(ExecutionLogEntry {
            id,
            entry,
            result: None,
            error: None,
            duration_ms: None,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    fn update_log_entry(&self, id: LogId, completion: LogCompletion) -> Result<(), LogError> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(LogError::EntryNotFound(id))?;
        entry.duration_ms = Some(completion.duration_ms);
        entry.result = completion.result;
        entry.error = completion.error;
        Ok(())
    }
}
