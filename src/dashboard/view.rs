//! Dashboard presentation.
//!
//! Renders a [`DashboardSnapshot`] as terminal cards and tables, or as JSON.
//! Selecting a row in the outstanding table hands a [`Route`] to a
//! [`Navigator`]; the view itself never decides what happens next.

use crate::analysis::{AlertKind, DashboardSnapshot, FiguresSource};
use crate::format;
use crate::models::DateRange;
use std::fmt::Write as _;

/// Places the console can move to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Dashboard,
    /// Printable statement for one agent over a range.
    AgentStatement { agent_id: String, range: DateRange },
}

impl Route {
    /// Path form, used for idle-timer route exclusion.
    pub fn path(&self) -> String {
        match self {
            Route::Login => "/login".to_string(),
            Route::Dashboard => "/dashboard".to_string(),
            Route::AgentStatement { agent_id, .. } => format!("/print/statement/{}", agent_id),
        }
    }
}

/// Receives navigation requests from views.
pub trait Navigator {
    fn navigate(&mut self, route: Route);
}

/// Keeps the last requested route.
impl Navigator for Option<Route> {
    fn navigate(&mut self, route: Route) {
        *self = Some(route);
    }
}

pub struct DashboardView<'a> {
    snapshot: &'a DashboardSnapshot,
    currency: &'a str,
    title: &'a str,
}

impl<'a> DashboardView<'a> {
    pub fn new(snapshot: &'a DashboardSnapshot, currency: &'a str, title: &'a str) -> Self {
        Self {
            snapshot,
            currency,
            title,
        }
    }

    fn money(&self, amount: rust_decimal::Decimal) -> String {
        format::money(amount, self.currency)
    }

    /// Full text rendering: KPI cards, delivery and sales cards, outstanding
    /// table and alerts.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.header());
        out.push_str(&self.totals_card());
        out.push_str(&self.delivery_card());
        out.push_str(&self.sales_card());
        out.push_str(&self.outstanding_table());
        out.push_str(&self.alerts_list());
        out
    }

    pub fn render_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self.snapshot)
    }

    /// Forward a click on row `index` (1-based, as numbered in the table).
    pub fn select_row(&self, index: usize, navigator: &mut impl Navigator) -> Option<Route> {
        let row = index
            .checked_sub(1)
            .and_then(|i| self.snapshot.outstanding.get(i))?;
        let route = Route::AgentStatement {
            agent_id: row.agent_id.clone(),
            range: self.snapshot.range,
        };
        navigator.navigate(route.clone());
        Some(route)
    }

    fn header(&self) -> String {
        let s = self.snapshot;
        let source = match s.figures_source {
            FiguresSource::Summary => "backend summary",
            FiguresSource::Computed => "computed from rows",
            FiguresSource::Recomputed => "recomputed (summary disagreed)",
        };
        format!(
            "\n📊 {} Dashboard\n   Period: {} | As of {} | Figures: {}\n\n",
            self.title,
            s.range,
            format::date(s.generated_on),
            source
        )
    }

    fn totals_card(&self) -> String {
        let t = &self.snapshot.totals;
        let mut card = String::from("💰 Cash\n");
        let _ = writeln!(card, "   {:<26}{:>18}", "Total advances", self.money(t.total_advances));
        let _ = writeln!(card, "   {:<26}{:>18}", "Fruit spend", self.money(t.total_fruit_spend));
        let _ = writeln!(card, "   {:<26}{:>18}", "Expenses", self.money(t.total_expenses));
        let _ = writeln!(
            card,
            "   {:<26}{:>18}",
            self.snapshot.balance_state.label(),
            self.money(t.cash_balance)
        );
        let _ = writeln!(card, "   {:<26}{:>18}", "Fruit collected", format::weight(t.total_weight));
        let _ = writeln!(
            card,
            "   Collections: {} | Active agents: {}\n",
            self.snapshot.collection_count, self.snapshot.active_agents
        );
        card
    }

    fn delivery_card(&self) -> String {
        let d = &self.snapshot.delivery;
        format!(
            "🚚 Deliveries\n   Outstanding orders: {} | Delivered: {} | Payments received: {}\n\n",
            d.outstanding_orders,
            d.delivered_orders,
            self.money(d.payments_received)
        )
    }

    fn sales_card(&self) -> String {
        let sales = &self.snapshot.sales;
        let mut card = format!(
            "🧾 Sales\n   Total sales: {} | Balance due: {}\n",
            self.money(sales.total_sales),
            self.money(sales.outstanding_balance)
        );
        if !sales.orders_by_category.is_empty() {
            let breakdown: Vec<String> = sales
                .orders_by_category
                .iter()
                .map(|(category, count)| format!("{}: {}", category, count))
                .collect();
            let _ = writeln!(card, "   Orders: {}", breakdown.join(", "));
        }
        card.push('\n');
        card
    }

    fn outstanding_table(&self) -> String {
        let mut table = String::from("👥 Outstanding by agent\n");
        if self.snapshot.outstanding.is_empty() {
            table.push_str("   No agent activity in this period.\n\n");
            return table;
        }

        let _ = writeln!(
            table,
            "   {:<4}{:<22}{:>16}{:>16}{:>14}{:>16}  {}",
            "#", "Agent", "Advances", "Fruit spend", "Weight", "Balance", "Last activity"
        );
        for (i, row) in self.snapshot.outstanding.iter().enumerate() {
            let _ = writeln!(
                table,
                "   {:<4}{:<22}{:>16}{:>16}{:>14}{:>16}  {}",
                i + 1,
                truncate(&row.agent_name, 21),
                self.money(row.total_advances),
                self.money(row.total_fruit_spend),
                format::weight(row.total_weight),
                self.money(row.balance),
                format::date_opt(row.last_activity)
            );
        }
        table.push('\n');
        table
    }

    fn alerts_list(&self) -> String {
        let mut list = String::from("🔔 Alerts\n");
        if self.snapshot.alerts.is_empty() {
            list.push_str("   None.\n");
            return list;
        }

        for alert in &self.snapshot.alerts {
            let detail = match alert.kind {
                AlertKind::AdvanceWithoutCollection => format!(
                    "{} advanced {} day(s) ago ({}), no collection since",
                    self.money(alert.amount),
                    alert.days,
                    format::date(alert.since)
                ),
                AlertKind::StaleOutstanding => format!(
                    "{} outstanding, no activity for {} days (last {})",
                    self.money(alert.amount),
                    alert.days,
                    format::date(alert.since)
                ),
            };
            let _ = writeln!(list, "   ⚠️  {}: {} - {}", alert.agent_name, alert.kind, detail);
        }
        list
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{aggregate, AggregateOptions};
    use crate::models::{Agent, AgentStatus, CashAdvance, LedgerRows};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn snapshot() -> DashboardSnapshot {
        let agent = |id: &str, name: &str| Agent {
            id: id.to_string(),
            name: name.to_string(),
            status: AgentStatus::Active,
            phone: None,
        };
        let advance = |id: &str, agent_id: &str, day: u32, amount: i64| CashAdvance {
            id: id.to_string(),
            agent_id: Some(agent_id.to_string()),
            date: NaiveDate::from_ymd_opt(2026, 10, day).unwrap(),
            amount: Decimal::from(amount),
            payment_method: None,
            signer: None,
        };
        let rows = LedgerRows {
            agents: vec![agent("a", "Ama"), agent("b", "Yaw")],
            advances: vec![advance("1", "a", 16, 250), advance("2", "b", 1, 1200)],
            ..Default::default()
        };
        aggregate(
            DateRange::this_month(today()),
            &rows,
            &rows,
            None,
            AggregateOptions::from(&crate::config::DashboardConfig::default()),
            today(),
        )
    }

    #[test]
    fn test_render_text_sections() {
        let snapshot = snapshot();
        let text = DashboardView::new(&snapshot, "GH₵", "Palm Fruit Trading").render_text();

        assert!(text.contains("Palm Fruit Trading Dashboard"));
        assert!(text.contains("2026-10-01 to 2026-10-31"));
        assert!(text.contains("GH₵1,450.00"));
        assert!(text.contains("CASH BALANCE (SURPLUS)"));
        assert!(text.contains("Outstanding by agent"));
        assert!(text.contains("Advance with no collection"));
        assert!(text.contains("Stale outstanding"));
        // Yaw advanced more, so is listed first
        let yaw = text.find("Yaw").unwrap();
        let ama = text.find("Ama").unwrap();
        assert!(yaw < ama);
    }

    #[test]
    fn test_render_json() {
        let snapshot = snapshot();
        let json = DashboardView::new(&snapshot, "$", "x").render_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["figures_source"], "computed");
        assert_eq!(value["outstanding"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_select_row_navigates_to_statement() {
        let snapshot = snapshot();
        let view = DashboardView::new(&snapshot, "$", "x");
        let mut navigator: Option<Route> = None;

        let route = view.select_row(1, &mut navigator);
        assert_eq!(
            route,
            Some(Route::AgentStatement {
                agent_id: "b".to_string(),
                range: DateRange::this_month(today()),
            })
        );
        assert_eq!(navigator, route);

        let mut untouched: Option<Route> = None;
        assert!(view.select_row(0, &mut untouched).is_none());
        assert!(view.select_row(3, &mut untouched).is_none());
        assert!(untouched.is_none());
    }

    #[test]
    fn test_route_paths() {
        assert_eq!(Route::Dashboard.path(), "/dashboard");
        let statement = Route::AgentStatement {
            agent_id: "7".to_string(),
            range: DateRange::all_time(),
        };
        assert_eq!(statement.path(), "/print/statement/7");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Ama", 5), "Ama");
        assert_eq!(truncate("Kwabena Asante", 8), "Kwabena…");
    }
}
