//! Row store abstraction.
//!
//! The backend is a relational store reached through range/equality filtered
//! row queries plus named procedures. [`RowStore`] is the seam between the
//! fetcher / record service and the HTTP client, so both can be exercised
//! against an in-memory store.

use crate::error::BackendError;
use crate::models::{DateRange, Entity};
use serde_json::Value;

/// A filtered, ordered select against one entity collection.
#[derive(Debug, Clone, PartialEq)]
pub struct RowQuery {
    pub entity: Entity,
    /// PostgREST select list, e.g. `*,collection_items(*)`.
    pub select: String,
    pub range: DateRange,
    /// Equality filters as `(column, value)`.
    pub equals: Vec<(String, String)>,
}

impl RowQuery {
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            select: "*".to_string(),
            range: DateRange::all_time(),
            equals: Vec::new(),
        }
    }

    pub fn select(mut self, select: &str) -> Self {
        self.select = select.to_string();
        self
    }

    pub fn within(mut self, range: DateRange) -> Self {
        self.range = range;
        self
    }

    pub fn eq(mut self, column: &str, value: &str) -> Self {
        self.equals.push((column.to_string(), value.to_string()));
        self
    }

    /// Query-string parameters in PostgREST syntax. Rows are always ordered
    /// by the entity's date column, newest first.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.select.clone())];

        if let Some(column) = self.entity.date_column() {
            if let Some(from) = self.range.from {
                params.push((column.to_string(), format!("gte.{}", from)));
            }
            if let Some(to) = self.range.to {
                params.push((column.to_string(), format!("lt.{}", to)));
            }
        }

        for (column, value) in &self.equals {
            params.push((column.clone(), format!("eq.{}", value)));
        }

        match self.entity.date_column() {
            Some(column) => params.push(("order".to_string(), format!("{}.desc", column))),
            None => params.push(("order".to_string(), "name.asc".to_string())),
        }

        params
    }
}

/// Select/insert/update/delete plus procedure calls.
#[allow(async_fn_in_trait)]
pub trait RowStore {
    /// Rows matching the query, newest first.
    async fn select(&self, query: &RowQuery) -> Result<Vec<Value>, BackendError>;

    /// Call a stored procedure and return its JSON result.
    async fn call(&self, procedure: &str, args: &Value) -> Result<Value, BackendError>;

    /// Insert a row and return it as stored (with its id).
    async fn insert(&self, entity: Entity, row: &Value) -> Result<Value, BackendError>;

    /// Insert several rows in one request. Either all rows are stored or
    /// none are.
    async fn insert_many(&self, entity: Entity, rows: &[Value]) -> Result<Vec<Value>, BackendError>;

    /// Patch a row by id and return it as stored.
    async fn update(&self, entity: Entity, id: &str, patch: &Value) -> Result<Value, BackendError>;

    /// Delete a row by id.
    async fn delete(&self, entity: Entity, id: &str) -> Result<(), BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_range_params() {
        let range = DateRange::custom(
            NaiveDate::from_ymd_opt(2026, 10, 1),
            NaiveDate::from_ymd_opt(2026, 11, 1),
        );
        let params = RowQuery::new(Entity::Advances)
            .within(range)
            .eq("agent_id", "a-1")
            .to_params();

        assert_eq!(params[0], ("select".to_string(), "*".to_string()));
        assert!(params.contains(&("date".to_string(), "gte.2026-10-01".to_string())));
        assert!(params.contains(&("date".to_string(), "lt.2026-11-01".to_string())));
        assert!(params.contains(&("agent_id".to_string(), "eq.a-1".to_string())));
        assert_eq!(
            params.last(),
            Some(&("order".to_string(), "date.desc".to_string()))
        );
    }

    #[test]
    fn test_orders_use_order_date() {
        let params = RowQuery::new(Entity::Orders).to_params();
        assert_eq!(params.len(), 2);
        assert_eq!(params[1].1, "order_date.desc");
    }

    #[test]
    fn test_agents_have_no_date_filter() {
        let range = DateRange::this_month(NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
        let params = RowQuery::new(Entity::Agents).within(range).to_params();
        assert!(!params.iter().any(|(k, _)| k == "date"));
        assert_eq!(params[1].1, "name.asc");
    }
}
