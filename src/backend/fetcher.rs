//! Dashboard and statement loading.
//!
//! Every entity is fetched concurrently; the first failure aborts the whole
//! load so a partial dashboard is never shown.

use super::store::{RowQuery, RowStore};
use crate::analysis::SummaryFigures;
use crate::error::{BackendError, FetchError};
use crate::models::{
    Agent, AgentRows, CashAdvance, DateRange, Entity, Expense, FruitCollection, LedgerRows, Order,
    Payment,
};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// Name of the optional aggregate procedure.
pub const SUMMARY_PROCEDURE: &str = "dashboard_summary";

/// Select list for collections, with their weighed items embedded.
const COLLECTION_SELECT: &str = "*,collection_items(*)";

/// Collections only count as activity; their items are not needed.
const ACTIVITY_SELECT: &str = "id,agent_id,date";

/// Result of one dashboard load.
#[derive(Debug, Clone)]
pub struct DashboardData {
    pub range: DateRange,
    pub rows: LedgerRows,
    /// Every advance and collection up to the load date, whatever `range`
    /// is. Alerts are evaluated against these.
    pub activity: LedgerRows,
    /// Backend-computed figures, when the fast path answered.
    pub summary: Option<SummaryFigures>,
}

/// Loads rows for the dashboard and statements.
pub struct DataFetcher<S> {
    store: S,
    use_summary: bool,
}

impl<S: RowStore> DataFetcher<S> {
    pub fn new(store: S, use_summary: bool) -> Self {
        Self { store, use_summary }
    }

    /// Access the underlying store (used by the record commands).
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load everything the dashboard needs for `range`, plus the agent
    /// activity history up to `today`.
    pub async fn load_dashboard(
        &self,
        range: DateRange,
        today: NaiveDate,
    ) -> Result<DashboardData, FetchError> {
        info!("Loading dashboard: {}", range);
        let history = DateRange::custom(None, today.succ_opt());

        let summary = if self.use_summary {
            self.fetch_summary(range).await
        } else {
            None
        };

        let (
            agents,
            advances,
            collections,
            expenses,
            orders,
            payments,
            history_advances,
            history_collections,
        ) = futures::try_join!(
            self.fetch::<Agent>(RowQuery::new(Entity::Agents)),
            self.fetch::<CashAdvance>(RowQuery::new(Entity::Advances).within(range)),
            self.fetch::<FruitCollection>(
                RowQuery::new(Entity::Collections)
                    .select(COLLECTION_SELECT)
                    .within(range)
            ),
            self.fetch::<Expense>(RowQuery::new(Entity::Expenses).within(range)),
            self.fetch::<Order>(RowQuery::new(Entity::Orders).within(range)),
            self.fetch::<Payment>(RowQuery::new(Entity::Payments).within(range)),
            self.fetch::<CashAdvance>(RowQuery::new(Entity::Advances).within(history)),
            self.fetch::<FruitCollection>(
                RowQuery::new(Entity::Collections)
                    .select(ACTIVITY_SELECT)
                    .within(history)
            ),
        )?;

        debug!(
            "Loaded {} agents, {} advances, {} collections, {} expenses, {} orders, {} payments",
            agents.len(),
            advances.len(),
            collections.len(),
            expenses.len(),
            orders.len(),
            payments.len()
        );

        let activity = LedgerRows {
            agents: agents.clone(),
            advances: history_advances,
            collections: history_collections,
            ..Default::default()
        };

        Ok(DashboardData {
            range,
            activity,
            rows: LedgerRows {
                agents,
                advances,
                collections,
                expenses,
                orders,
                payments,
            },
            summary,
        })
    }

    /// Load one agent's advances, collections and expenses for `range`.
    pub async fn load_agent(&self, agent_id: &str, range: DateRange) -> Result<AgentRows, FetchError> {
        info!("Loading statement rows for agent {}: {}", agent_id, range);

        let (agents, advances, collections, expenses) = futures::try_join!(
            self.fetch::<Agent>(RowQuery::new(Entity::Agents).eq("id", agent_id)),
            self.fetch::<CashAdvance>(
                RowQuery::new(Entity::Advances)
                    .within(range)
                    .eq("agent_id", agent_id)
            ),
            self.fetch::<FruitCollection>(
                RowQuery::new(Entity::Collections)
                    .select(COLLECTION_SELECT)
                    .within(range)
                    .eq("agent_id", agent_id)
            ),
            self.fetch::<Expense>(
                RowQuery::new(Entity::Expenses)
                    .within(range)
                    .eq("agent_id", agent_id)
            ),
        )?;

        let agent = agents.into_iter().next().ok_or_else(|| FetchError {
            entity: Entity::Agents.label(),
            source: BackendError::NotFound {
                table: Entity::Agents.table().to_string(),
                id: agent_id.to_string(),
            },
        })?;

        Ok(AgentRows {
            agent,
            range,
            advances,
            collections,
            expenses,
        })
    }

    /// Fetch and decode rows for one query.
    pub async fn fetch<T: DeserializeOwned>(&self, query: RowQuery) -> Result<Vec<T>, FetchError> {
        let entity = query.entity;
        let rows = self
            .store
            .select(&query)
            .await
            .map_err(|source| FetchError {
                entity: entity.label(),
                source,
            })?;

        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| FetchError {
                    entity: entity.label(),
                    source: BackendError::Decode {
                        what: entity.table().to_string(),
                        message: e.to_string(),
                    },
                })
            })
            .collect()
    }

    /// Ask the backend for precomputed figures. Any failure means "no fast
    /// path" and the figures are computed from rows instead.
    async fn fetch_summary(&self, range: DateRange) -> Option<SummaryFigures> {
        let args = json!({
            "p_from": range.from.map(|d| d.to_string()),
            "p_to": range.to.map(|d| d.to_string()),
        });

        let value = match self.store.call(SUMMARY_PROCEDURE, &args).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Summary fast path unavailable, computing locally: {}", e);
                return None;
            }
        };

        // Set-returning procedures answer with a one-row array
        let row = match value {
            Value::Array(mut rows) if !rows.is_empty() => rows.swap_remove(0),
            Value::Array(_) => {
                warn!("Summary fast path returned no rows, computing locally");
                return None;
            }
            other => other,
        };

        match serde_json::from_value::<SummaryFigures>(row) {
            Ok(figures) => Some(figures),
            Err(e) => {
                warn!("Summary fast path returned unexpected shape, computing locally: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{aggregate, AggregateOptions, AlertKind, FiguresSource};
    use crate::backend::memory::MemoryStore;
    use rust_decimal::Decimal;
    use std::sync::atomic::Ordering;

    fn seeded_store() -> MemoryStore {
        MemoryStore::new()
            .with_rows(
                Entity::Agents,
                vec![
                    json!({"id": "a", "name": "Ama", "status": "ACTIVE"}),
                    json!({"id": "b", "name": "Yaw", "status": "INACTIVE"}),
                ],
            )
            .with_rows(
                Entity::Advances,
                vec![
                    json!({"id": 1, "agent_id": "a", "date": "2026-10-02", "amount": "300"}),
                    json!({"id": 2, "agent_id": "a", "date": "2026-10-16", "amount": 200}),
                    json!({"id": 3, "agent_id": "b", "date": "2026-09-20", "amount": "90"}),
                ],
            )
            .with_rows(
                Entity::Collections,
                vec![json!({
                    "id": 10, "agent_id": "a", "date": "2026-10-05", "total_spend": 0,
                    "collection_items": [
                        {"weight_kg": 2, "price_per_kg": 10},
                        {"weight_kg": 3, "price_per_kg": 12},
                        {"weight_kg": 0, "price_per_kg": 5}
                    ]
                })],
            )
            .with_rows(
                Entity::Expenses,
                vec![json!({"id": 20, "agent_id": "a", "date": "2026-10-03", "type": "FUEL", "amount": "120"})],
            )
            .with_rows(
                Entity::Orders,
                vec![
                    json!({"id": 30, "category": "CEMENT", "total": 400, "balance_due": 100,
                           "delivery_status": "PARTIALLY_DELIVERED", "order_date": "2026-10-04"}),
                    json!({"id": 31, "category": "BLOCKS", "total": 250, "balance_due": 0,
                           "delivery_status": "DELIVERED", "order_date": "2026-10-06"}),
                ],
            )
            .with_rows(
                Entity::Payments,
                vec![
                    json!({"id": 40, "order_id": 30, "date": "2026-10-04", "amount": "300"}),
                    json!({"id": 41, "order_id": 31, "date": "2026-10-06", "amount": 250}),
                ],
            )
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn october() -> DateRange {
        DateRange::this_month(today())
    }

    #[tokio::test]
    async fn test_load_dashboard_filters_by_range() {
        let fetcher = DataFetcher::new(seeded_store(), false);
        let data = fetcher.load_dashboard(october(), today()).await.unwrap();

        assert_eq!(data.rows.agents.len(), 2);
        assert_eq!(data.rows.advances.len(), 2);
        // newest first
        assert_eq!(data.rows.advances[0].id, "2");
        assert_eq!(data.rows.collections[0].items.len(), 3);
        assert!(data.summary.is_none());
    }

    #[tokio::test]
    async fn test_any_failure_aborts_load() {
        let fetcher = DataFetcher::new(seeded_store().failing(Entity::Payments), false);
        let err = fetcher.load_dashboard(october(), today()).await.unwrap_err();
        assert_eq!(err.entity, "payments");
        assert!(err.to_string().contains("could not load payments"));
    }

    #[tokio::test]
    async fn test_missing_summary_falls_back() {
        let fetcher = DataFetcher::new(seeded_store(), true);
        let data = fetcher.load_dashboard(october(), today()).await.unwrap();
        assert!(data.summary.is_none());
        // one failed call, then six range selects and two history selects
        assert_eq!(fetcher.store().selects.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn test_fast_path_and_fallback_agree() {
        let today = today();
        let options = AggregateOptions::from(&crate::config::DashboardConfig::default());

        let plain = DataFetcher::new(seeded_store(), false);
        let fallback = plain.load_dashboard(october(), today).await.unwrap();
        let computed = aggregate(october(), &fallback.rows, &fallback.activity, None, options, today);

        let summary_json = json!([{
            "total_advances": "500",
            "total_expenses": 120,
            "total_fruit_spend": "56.00",
            "total_weight": 5,
            "outstanding_orders": 1,
            "delivered_orders": 1,
            "payments_received": "550"
        }]);
        let fast = DataFetcher::new(seeded_store().with_summary(summary_json), true);
        let data = fast.load_dashboard(october(), today).await.unwrap();
        assert!(data.summary.is_some());
        let summarized = aggregate(
            october(),
            &data.rows,
            &data.activity,
            data.summary.as_ref(),
            options,
            today,
        );

        assert_eq!(summarized.figures_source, FiguresSource::Summary);
        assert_eq!(computed.figures_source, FiguresSource::Computed);
        assert_eq!(summarized.totals, computed.totals);
        assert_eq!(summarized.delivery, computed.delivery);
        assert_eq!(computed.totals.cash_balance, Decimal::from(324));
    }

    fn alert_kinds(store: MemoryStore, range: DateRange, today: NaiveDate) -> Vec<AlertKind> {
        let fetcher = DataFetcher::new(store, false);
        let data = tokio_test::block_on(fetcher.load_dashboard(range, today)).unwrap();
        let options = AggregateOptions::from(&crate::config::DashboardConfig::default());
        aggregate(range, &data.rows, &data.activity, None, options, today)
            .alerts
            .into_iter()
            .map(|alert| alert.kind)
            .collect()
    }

    #[test]
    fn test_collection_before_range_start_clears_alert() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 3).unwrap();
        let store = || {
            MemoryStore::new()
                .with_rows(
                    Entity::Agents,
                    vec![json!({"id": "a", "name": "Ama", "status": "ACTIVE"})],
                )
                .with_rows(
                    Entity::Advances,
                    vec![json!({"id": 1, "agent_id": "a", "date": "2026-10-02", "amount": 300})],
                )
                .with_rows(
                    Entity::Collections,
                    vec![json!({"id": 10, "agent_id": "a", "date": "2026-09-30", "total_spend": 50})],
                )
        };

        // The month started two days ago; the collection is in the alert
        // window but not in the displayed range
        let range = DateRange::this_month(today);
        let data = tokio_test::block_on(
            DataFetcher::new(store(), false).load_dashboard(range, today),
        )
        .unwrap();
        assert!(data.rows.collections.is_empty());
        assert_eq!(data.activity.collections.len(), 1);

        assert!(alert_kinds(store(), range, today).is_empty());
    }

    #[test]
    fn test_past_range_uses_current_activity_for_alerts() {
        let store = MemoryStore::new()
            .with_rows(
                Entity::Agents,
                vec![json!({"id": "a", "name": "Ama", "status": "ACTIVE"})],
            )
            .with_rows(
                Entity::Advances,
                vec![
                    json!({"id": 1, "agent_id": "a", "date": "2026-09-20", "amount": 300}),
                    json!({"id": 2, "agent_id": "a", "date": "2026-10-15", "amount": 100}),
                ],
            );
        let september = DateRange::custom(
            NaiveDate::from_ymd_opt(2026, 9, 1),
            NaiveDate::from_ymd_opt(2026, 10, 1),
        );

        // Last activity is three days ago, not the 2026-09-20 advance shown
        assert_eq!(
            alert_kinds(store, september, today()),
            vec![AlertKind::AdvanceWithoutCollection]
        );
    }

    #[tokio::test]
    async fn test_load_agent_rows() {
        let fetcher = DataFetcher::new(seeded_store(), false);
        let rows = fetcher.load_agent("a", DateRange::all_time()).await.unwrap();
        assert_eq!(rows.agent.name, "Ama");
        assert_eq!(rows.advances.len(), 2);
        assert_eq!(rows.collections.len(), 1);
        assert_eq!(rows.expenses.len(), 1);

        let missing = fetcher.load_agent("zzz", DateRange::all_time()).await;
        assert!(matches!(
            missing,
            Err(FetchError {
                source: BackendError::NotFound { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_undecodable_row_fails_load() {
        let store = MemoryStore::new().with_rows(Entity::Agents, vec![json!({"id": 1})]);
        let fetcher = DataFetcher::new(store, false);
        let result = tokio_test::block_on(fetcher.fetch::<Agent>(RowQuery::new(Entity::Agents)));
        assert!(matches!(
            result,
            Err(FetchError {
                source: BackendError::Decode { .. },
                ..
            })
        ));
    }
}
