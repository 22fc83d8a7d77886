//! In-memory row store for tests.

use super::store::{RowQuery, RowStore};
use crate::error::BackendError;
use crate::models::{parse_date, Entity};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<&'static str, Vec<Value>>>,
    failing: Mutex<HashSet<&'static str>>,
    failing_writes: Mutex<HashSet<&'static str>>,
    summary: Mutex<Option<Value>>,
    next_id: AtomicUsize,
    pub selects: AtomicUsize,
    pub writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicUsize::new(1000),
            ..Default::default()
        }
    }

    pub fn with_rows(self, entity: Entity, rows: Vec<Value>) -> Self {
        self.tables
            .lock()
            .unwrap()
            .entry(entity.table())
            .or_default()
            .extend(rows);
        self
    }

    pub fn failing(self, entity: Entity) -> Self {
        self.failing.lock().unwrap().insert(entity.table());
        self
    }

    /// Reject inserts, updates and deletes on `entity`.
    pub fn failing_writes(self, entity: Entity) -> Self {
        self.failing_writes.lock().unwrap().insert(entity.table());
        self
    }

    pub fn with_summary(self, summary: Value) -> Self {
        *self.summary.lock().unwrap() = Some(summary);
        self
    }

    pub fn rows(&self, entity: Entity) -> Vec<Value> {
        self.tables
            .lock()
            .unwrap()
            .get(entity.table())
            .cloned()
            .unwrap_or_default()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_write(&self, entity: Entity) -> Result<(), BackendError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.failing_writes.lock().unwrap().contains(entity.table()) {
            return Err(BackendError::Status {
                status: 503,
                body: format!("{} is read-only", entity.table()),
            });
        }
        Ok(())
    }

    fn stamp(&self, row: &Value) -> Value {
        let mut stored = row.clone();
        if stored.get("id").is_none() {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            stored["id"] = json!(id.to_string());
        }
        stored
    }

    fn column_text(row: &Value, column: &str) -> Option<String> {
        match row.get(column)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    fn matches(query: &RowQuery, row: &Value) -> bool {
        if let Some(column) = query.entity.date_column() {
            let date = Self::column_text(row, column).and_then(|d| parse_date(&d));
            match date {
                Some(date) if !query.range.contains(date) => return false,
                None if !query.range.is_all_time() => return false,
                _ => {}
            }
        }

        query
            .equals
            .iter()
            .all(|(column, value)| Self::column_text(row, column).as_deref() == Some(value))
    }
}

impl RowStore for MemoryStore {
    async fn select(&self, query: &RowQuery) -> Result<Vec<Value>, BackendError> {
        self.selects.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(query.entity.table()) {
            return Err(BackendError::Status {
                status: 500,
                body: format!("{} unavailable", query.entity.table()),
            });
        }

        let mut rows: Vec<Value> = self
            .rows(query.entity)
            .into_iter()
            .filter(|row| Self::matches(query, row))
            .collect();

        if let Some(column) = query.entity.date_column() {
            rows.sort_by_key(|row| {
                std::cmp::Reverse(Self::column_text(row, column).and_then(|d| parse_date(&d)))
            });
        }

        Ok(rows)
    }

    async fn call(&self, procedure: &str, _args: &Value) -> Result<Value, BackendError> {
        self.summary
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| BackendError::Status {
                status: 404,
                body: format!("function {} does not exist", procedure),
            })
    }

    async fn insert(&self, entity: Entity, row: &Value) -> Result<Value, BackendError> {
        self.check_write(entity)?;
        let stored = self.stamp(row);
        self.tables
            .lock()
            .unwrap()
            .entry(entity.table())
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn insert_many(&self, entity: Entity, rows: &[Value]) -> Result<Vec<Value>, BackendError> {
        self.check_write(entity)?;
        let stored: Vec<Value> = rows.iter().map(|row| self.stamp(row)).collect();
        self.tables
            .lock()
            .unwrap()
            .entry(entity.table())
            .or_default()
            .extend(stored.iter().cloned());
        Ok(stored)
    }

    async fn update(&self, entity: Entity, id: &str, patch: &Value) -> Result<Value, BackendError> {
        self.check_write(entity)?;
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(entity.table()).or_default();
        let row = rows
            .iter_mut()
            .find(|r| Self::column_text(r, "id").as_deref() == Some(id))
            .ok_or_else(|| BackendError::NotFound {
                table: entity.table().to_string(),
                id: id.to_string(),
            })?;

        if let (Some(target), Some(fields)) = (row.as_object_mut(), patch.as_object()) {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        Ok(row.clone())
    }

    async fn delete(&self, entity: Entity, id: &str) -> Result<(), BackendError> {
        self.check_write(entity)?;
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(entity.table()).or_default();
        let before = rows.len();
        rows.retain(|r| Self::column_text(r, "id").as_deref() != Some(id));
        if rows.len() == before {
            return Err(BackendError::NotFound {
                table: entity.table().to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}
