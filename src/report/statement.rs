//! Per-agent statement model.
//!
//! A statement is built from the same reductions the dashboard uses, so an
//! agent's balance on paper always matches the dashboard for the same range.

use crate::analysis::{effective_spend, BalanceState, Totals};
use crate::models::{Agent, AgentRows, CashAdvance, DateRange, Expense, FruitCollection};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

/// One `weight @ price` line of a collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionLine {
    pub weight_kg: Decimal,
    pub price_per_kg: Decimal,
    pub line_total: Decimal,
}

/// A collection with its itemized breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionBreakdown {
    pub id: String,
    pub date: NaiveDate,
    pub driver: Option<String>,
    pub lines: Vec<CollectionLine>,
    pub total_weight: Decimal,
    /// Stored total, when one was recorded and is positive.
    pub stored_total: Option<Decimal>,
    pub effective_spend: Decimal,
}

impl CollectionBreakdown {
    pub fn from_collection(collection: &FruitCollection) -> Self {
        Self {
            id: collection.id.clone(),
            date: collection.date,
            driver: collection.driver.clone(),
            lines: collection
                .items
                .iter()
                .map(|item| CollectionLine {
                    weight_kg: item.weight_kg,
                    price_per_kg: item.price_per_kg,
                    line_total: item.line_total(),
                })
                .collect(),
            total_weight: collection.total_weight(),
            stored_total: collection.total_spend.filter(|t| *t > Decimal::ZERO),
            effective_spend: effective_spend(collection),
        }
    }
}

/// Everything printed on one agent statement.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStatement {
    pub agent: Agent,
    pub range: DateRange,
    pub generated_on: NaiveDate,
    pub advances: Vec<CashAdvance>,
    pub expenses: Vec<Expense>,
    pub collections: Vec<CollectionBreakdown>,
    pub totals: Totals,
    pub balance_state: BalanceState,
}

impl AgentStatement {
    /// Build a statement from one agent's rows. Rows are listed oldest first.
    pub fn build(rows: &AgentRows, generated_on: NaiveDate) -> Self {
        let totals = Totals::from_rows(&rows.advances, &rows.expenses, &rows.collections);

        let mut advances = rows.advances.clone();
        advances.sort_by_key(|a| a.date);

        let mut expenses = rows.expenses.clone();
        expenses.sort_by_key(|e| e.date);

        let mut collections: Vec<CollectionBreakdown> = rows
            .collections
            .iter()
            .map(CollectionBreakdown::from_collection)
            .collect();
        collections.sort_by_key(|c| c.date);

        Self {
            agent: rows.agent.clone(),
            range: rows.range,
            generated_on,
            advances,
            expenses,
            collections,
            balance_state: totals.balance_state(),
            totals,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.advances.is_empty() && self.expenses.is_empty() && self.collections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentStatus, CollectionItem};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn rows() -> AgentRows {
        AgentRows {
            agent: Agent {
                id: "a".to_string(),
                name: "Ama Owusu".to_string(),
                status: AgentStatus::Active,
                phone: None,
            },
            range: DateRange::all_time(),
            advances: vec![
                CashAdvance {
                    id: "2".to_string(),
                    agent_id: Some("a".to_string()),
                    date: day(9),
                    amount: Decimal::from(200),
                    payment_method: None,
                    signer: None,
                },
                CashAdvance {
                    id: "1".to_string(),
                    agent_id: Some("a".to_string()),
                    date: day(2),
                    amount: Decimal::from(300),
                    payment_method: Some("CASH".to_string()),
                    signer: Some("Kofi".to_string()),
                },
            ],
            collections: vec![FruitCollection {
                id: "10".to_string(),
                agent_id: Some("a".to_string()),
                date: day(5),
                driver: Some("Yaw".to_string()),
                total_spend: Some(Decimal::ZERO),
                items: vec![
                    CollectionItem::new(Decimal::from(2), Decimal::from(10)),
                    CollectionItem::new(Decimal::from(3), Decimal::from(12)),
                    CollectionItem::new(Decimal::ZERO, Decimal::from(5)),
                ],
            }],
            expenses: vec![Expense {
                id: "20".to_string(),
                agent_id: Some("a".to_string()),
                date: day(3),
                expense_type: "FUEL".to_string(),
                amount: Decimal::from(120),
                note: None,
            }],
        }
    }

    #[test]
    fn test_statement_balance_matches_aggregator() {
        let statement = AgentStatement::build(&rows(), day(18));
        assert_eq!(statement.totals.total_advances, Decimal::from(500));
        assert_eq!(statement.totals.total_fruit_spend, Decimal::from(56));
        assert_eq!(statement.totals.cash_balance, Decimal::from(324));
        assert_eq!(statement.balance_state, BalanceState::Surplus);
    }

    #[test]
    fn test_rows_listed_oldest_first() {
        let statement = AgentStatement::build(&rows(), day(18));
        assert_eq!(statement.advances[0].id, "1");
        assert_eq!(statement.advances[1].id, "2");
    }

    #[test]
    fn test_collection_breakdown_lines() {
        let statement = AgentStatement::build(&rows(), day(18));
        let breakdown = &statement.collections[0];
        assert_eq!(breakdown.lines.len(), 3);
        assert_eq!(breakdown.lines[1].line_total, Decimal::from(36));
        assert_eq!(breakdown.stored_total, None);
        assert_eq!(breakdown.effective_spend, Decimal::from(56));
        assert_eq!(breakdown.total_weight, Decimal::from(5));
    }

    #[test]
    fn test_empty_statement_is_zero_surplus() {
        let mut empty = rows();
        empty.advances.clear();
        empty.expenses.clear();
        empty.collections.clear();

        let statement = AgentStatement::build(&empty, day(18));
        assert!(statement.is_empty());
        assert_eq!(statement.totals, Totals::default());
        assert_eq!(statement.balance_state.label(), "CASH BALANCE (SURPLUS)");
    }
}
