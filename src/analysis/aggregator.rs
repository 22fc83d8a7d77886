//! Dashboard aggregation.
//!
//! Pure reductions over fetched rows: ledger totals, per-agent outstanding
//! figures, alert conditions and order KPIs. The same functions back the
//! dashboard and the printable statements, so the two can never disagree.

use crate::amount;
use crate::models::{
    AgentStatus, CashAdvance, CollectionItem, DateRange, Expense, FruitCollection, LedgerRows,
    Order, OrderCategory, Payment, MAX_WINDOW_DAYS,
};
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, warn};

/// Authoritative cash amount for a collection: the stored total when it is
/// positive, otherwise the weight x price sum of its items.
pub fn effective_spend(collection: &FruitCollection) -> Decimal {
    match collection.total_spend {
        Some(stored) if stored > Decimal::ZERO => stored,
        _ => amount::sum(collection.items.iter().map(CollectionItem::line_total)),
    }
}

/// Advances minus everything they were spent on. Positive is a surplus.
pub fn cash_balance(
    total_advances: Decimal,
    total_expenses: Decimal,
    total_fruit_spend: Decimal,
) -> Decimal {
    let spent = amount::add(total_expenses, total_fruit_spend);
    total_advances.checked_sub(spent).unwrap_or_else(|| {
        warn!("Cash balance out of range; showing zero");
        Decimal::ZERO
    })
}

/// Sign of a balance, as printed on statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceState {
    Surplus,
    Deficit,
}

impl BalanceState {
    pub fn of(balance: Decimal) -> Self {
        if balance < Decimal::ZERO {
            BalanceState::Deficit
        } else {
            BalanceState::Surplus
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BalanceState::Surplus => "CASH BALANCE (SURPLUS)",
            BalanceState::Deficit => "DEFICIT (OVERDRAWN)",
        }
    }
}

/// Ledger totals for a set of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Totals {
    pub total_advances: Decimal,
    pub total_expenses: Decimal,
    pub total_fruit_spend: Decimal,
    pub cash_balance: Decimal,
    pub total_weight: Decimal,
}

impl Totals {
    pub fn from_rows(
        advances: &[CashAdvance],
        expenses: &[Expense],
        collections: &[FruitCollection],
    ) -> Self {
        let total_advances = amount::sum(advances.iter().map(|a| a.amount));
        let total_expenses = amount::sum(expenses.iter().map(|e| e.amount));
        let total_fruit_spend = amount::sum(collections.iter().map(effective_spend));
        let total_weight = amount::sum(collections.iter().map(FruitCollection::total_weight));

        Self {
            total_advances,
            total_expenses,
            total_fruit_spend,
            cash_balance: cash_balance(total_advances, total_expenses, total_fruit_spend),
            total_weight,
        }
    }

    pub fn balance_state(&self) -> BalanceState {
        BalanceState::of(self.cash_balance)
    }
}

/// Order fulfilment and money-in figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeliveryKpis {
    pub outstanding_orders: u64,
    pub delivered_orders: u64,
    pub payments_received: Decimal,
}

pub fn delivery_kpis(orders: &[Order], payments: &[Payment]) -> DeliveryKpis {
    DeliveryKpis {
        outstanding_orders: orders
            .iter()
            .filter(|o| o.delivery_status.is_outstanding())
            .count() as u64,
        delivered_orders: orders
            .iter()
            .filter(|o| o.delivery_status == crate::models::DeliveryStatus::Delivered)
            .count() as u64,
        payments_received: amount::sum(payments.iter().map(|p| p.amount)),
    }
}

/// The figures the backend's `dashboard_summary` procedure returns.
///
/// [`SummaryFigures::from_rows`] computes exactly the same fields locally;
/// the fast path is only trusted when the two agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SummaryFigures {
    #[serde(default, deserialize_with = "crate::amount::lenient")]
    pub total_advances: Decimal,
    #[serde(default, deserialize_with = "crate::amount::lenient")]
    pub total_expenses: Decimal,
    #[serde(default, deserialize_with = "crate::amount::lenient")]
    pub total_fruit_spend: Decimal,
    #[serde(default, deserialize_with = "crate::amount::lenient")]
    pub total_weight: Decimal,
    #[serde(default)]
    pub outstanding_orders: u64,
    #[serde(default)]
    pub delivered_orders: u64,
    #[serde(default, deserialize_with = "crate::amount::lenient")]
    pub payments_received: Decimal,
}

impl SummaryFigures {
    pub fn from_rows(rows: &LedgerRows) -> Self {
        let totals = Totals::from_rows(&rows.advances, &rows.expenses, &rows.collections);
        let delivery = delivery_kpis(&rows.orders, &rows.payments);

        Self {
            total_advances: totals.total_advances,
            total_expenses: totals.total_expenses,
            total_fruit_spend: totals.total_fruit_spend,
            total_weight: totals.total_weight,
            outstanding_orders: delivery.outstanding_orders,
            delivered_orders: delivery.delivered_orders,
            payments_received: delivery.payments_received,
        }
    }

    pub fn totals(&self) -> Totals {
        Totals {
            total_advances: self.total_advances,
            total_expenses: self.total_expenses,
            total_fruit_spend: self.total_fruit_spend,
            cash_balance: cash_balance(
                self.total_advances,
                self.total_expenses,
                self.total_fruit_spend,
            ),
            total_weight: self.total_weight,
        }
    }

    pub fn delivery(&self) -> DeliveryKpis {
        DeliveryKpis {
            outstanding_orders: self.outstanding_orders,
            delivered_orders: self.delivered_orders,
            payments_received: self.payments_received,
        }
    }

    /// Names of the fields where `self` and `other` differ.
    pub fn drift(&self, other: &SummaryFigures) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.total_advances != other.total_advances {
            fields.push("total_advances");
        }
        if self.total_expenses != other.total_expenses {
            fields.push("total_expenses");
        }
        if self.total_fruit_spend != other.total_fruit_spend {
            fields.push("total_fruit_spend");
        }
        if self.total_weight != other.total_weight {
            fields.push("total_weight");
        }
        if self.outstanding_orders != other.outstanding_orders {
            fields.push("outstanding_orders");
        }
        if self.delivered_orders != other.delivered_orders {
            fields.push("delivered_orders");
        }
        if self.payments_received != other.payments_received {
            fields.push("payments_received");
        }
        fields
    }
}

/// Where the headline figures came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FiguresSource {
    /// Backend summary, confirmed against the rows.
    Summary,
    /// Computed from rows; no summary was available.
    Computed,
    /// Summary disagreed with the rows and was discarded.
    Recomputed,
}

/// Sales side of the business (blocks, cement, fruit).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SalesKpis {
    /// Order totals, cancelled orders excluded.
    pub total_sales: Decimal,
    /// Sum of balance due on open (non-cancelled) orders.
    pub outstanding_balance: Decimal,
    pub orders_by_category: BTreeMap<OrderCategory, u64>,
}

pub fn sales_kpis(orders: &[Order]) -> SalesKpis {
    let mut kpis = SalesKpis::default();

    for order in orders
        .iter()
        .filter(|o| o.delivery_status != crate::models::DeliveryStatus::Cancelled)
    {
        kpis.total_sales = amount::add(kpis.total_sales, order.total);
        kpis.outstanding_balance =
            amount::add(kpis.outstanding_balance, order.balance_due.max(Decimal::ZERO));
        *kpis.orders_by_category.entry(order.category).or_insert(0) += 1;
    }

    kpis
}

/// One agent's position over the loaded range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutstanding {
    pub agent_id: String,
    pub agent_name: String,
    pub status: Option<AgentStatus>,
    pub total_advances: Decimal,
    pub total_expenses: Decimal,
    pub total_fruit_spend: Decimal,
    pub total_weight: Decimal,
    pub balance: Decimal,
    pub last_advance: Option<NaiveDate>,
    pub last_collection: Option<NaiveDate>,
    /// Later of the last advance and the last collection.
    pub last_activity: Option<NaiveDate>,
}

impl AgentOutstanding {
    fn new(agent_id: &str, rows: &LedgerRows) -> Self {
        let agent = rows.agent(agent_id);
        Self {
            agent_id: agent_id.to_string(),
            agent_name: rows.agent_name(Some(agent_id)),
            status: agent.map(|a| a.status),
            total_advances: Decimal::ZERO,
            total_expenses: Decimal::ZERO,
            total_fruit_spend: Decimal::ZERO,
            total_weight: Decimal::ZERO,
            balance: Decimal::ZERO,
            last_advance: None,
            last_collection: None,
            last_activity: None,
        }
    }

    fn has_activity(&self) -> bool {
        self.last_advance.is_some() || self.last_collection.is_some()
    }
}

/// Per-agent grouping in roster order, agents without advances or
/// collections dropped. Rows without an agent reference are skipped.
pub fn group_by_agent(rows: &LedgerRows) -> Vec<AgentOutstanding> {
    let mut groups: Vec<AgentOutstanding> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for agent in &rows.agents {
        index.insert(agent.id.clone(), groups.len());
        groups.push(AgentOutstanding::new(&agent.id, rows));
    }

    let mut slot = |id: &str, groups: &mut Vec<AgentOutstanding>| -> usize {
        *index.entry(id.to_string()).or_insert_with(|| {
            groups.push(AgentOutstanding::new(id, rows));
            groups.len() - 1
        })
    };

    for advance in &rows.advances {
        let Some(ref id) = advance.agent_id else {
            continue;
        };
        let i = slot(id, &mut groups);
        let group = &mut groups[i];
        group.total_advances = amount::add(group.total_advances, advance.amount);
        group.last_advance = group.last_advance.max(Some(advance.date));
    }

    for collection in &rows.collections {
        let Some(ref id) = collection.agent_id else {
            continue;
        };
        let i = slot(id, &mut groups);
        let group = &mut groups[i];
        group.total_fruit_spend = amount::add(group.total_fruit_spend, effective_spend(collection));
        group.total_weight = amount::add(group.total_weight, collection.total_weight());
        group.last_collection = group.last_collection.max(Some(collection.date));
    }

    for expense in &rows.expenses {
        let Some(ref id) = expense.agent_id else {
            continue;
        };
        if let Some(&i) = index.get(id.as_str()) {
            groups[i].total_expenses = amount::add(groups[i].total_expenses, expense.amount);
        }
    }

    groups.retain(AgentOutstanding::has_activity);
    for group in &mut groups {
        group.balance = cash_balance(
            group.total_advances,
            group.total_expenses,
            group.total_fruit_spend,
        );
        group.last_activity = group.last_advance.max(group.last_collection);
    }

    groups
}

/// Agents sorted by total advances, largest first, top `n` kept. The sort is
/// stable so ties keep roster order.
pub fn outstanding_by_agent(rows: &LedgerRows, n: usize) -> Vec<AgentOutstanding> {
    let mut groups = group_by_agent(rows);
    groups.sort_by(|a, b| b.total_advances.cmp(&a.total_advances));
    groups.truncate(n);
    groups
}

/// Kinds of agent alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Cash went out recently and no fruit came back in the same window.
    AdvanceWithoutCollection,
    /// Agent holds advances but has been quiet for too long.
    StaleOutstanding,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::AdvanceWithoutCollection => write!(f, "Advance with no collection"),
            AlertKind::StaleOutstanding => write!(f, "Stale outstanding"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub agent_id: String,
    pub agent_name: String,
    /// Date that triggered the alert (latest advance, or last activity).
    pub since: NaiveDate,
    /// Days between `since` and the evaluation date.
    pub days: i64,
    /// Advances involved.
    pub amount: Decimal,
}

/// Alert windows, in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertWindows {
    pub no_collection_days: i64,
    pub stale_after_days: i64,
}

impl AlertWindows {
    /// Clamp both windows to `0..=MAX_WINDOW_DAYS`.
    pub fn bounded(self) -> Self {
        let clamp = |name: &str, days: i64| {
            let bounded = days.clamp(0, MAX_WINDOW_DAYS);
            if bounded != days {
                warn!("{} of {} days is out of range; using {}", name, days, bounded);
            }
            bounded
        };
        Self {
            no_collection_days: clamp("no_collection_window_days", self.no_collection_days),
            stale_after_days: clamp("stale_after_days", self.stale_after_days),
        }
    }
}

impl Default for AlertWindows {
    fn default() -> Self {
        Self {
            no_collection_days: 7,
            stale_after_days: 14,
        }
    }
}

/// Evaluate alert conditions against `today`.
///
/// `today` must be read from the wall clock by the caller for every run.
pub fn detect_alerts(rows: &LedgerRows, windows: AlertWindows, today: NaiveDate) -> Vec<Alert> {
    let windows = windows.bounded();
    let window = DateRange::custom(
        today.checked_sub_signed(Duration::days(windows.no_collection_days)),
        today.succ_opt(),
    );

    let groups = group_by_agent(rows);
    let mut alerts = Vec::new();

    for group in &groups {
        let recent_advances: Vec<&CashAdvance> = rows
            .advances
            .iter()
            .filter(|a| a.agent_id.as_deref() == Some(group.agent_id.as_str()))
            .filter(|a| window.contains(a.date))
            .collect();

        let collected_in_window = rows
            .collections
            .iter()
            .filter(|c| c.agent_id.as_deref() == Some(group.agent_id.as_str()))
            .any(|c| window.contains(c.date));

        if !recent_advances.is_empty() && !collected_in_window {
            let since = recent_advances
                .iter()
                .map(|a| a.date)
                .max()
                .unwrap_or(today);
            alerts.push(Alert {
                kind: AlertKind::AdvanceWithoutCollection,
                agent_id: group.agent_id.clone(),
                agent_name: group.agent_name.clone(),
                since,
                days: (today - since).num_days(),
                amount: amount::sum(recent_advances.iter().map(|a| a.amount)),
            });
        }
    }

    for group in &groups {
        let Some(last_activity) = group.last_activity else {
            continue;
        };
        let idle_days = (today - last_activity).num_days();
        if idle_days >= windows.stale_after_days && group.total_advances > Decimal::ZERO {
            alerts.push(Alert {
                kind: AlertKind::StaleOutstanding,
                agent_id: group.agent_id.clone(),
                agent_name: group.agent_name.clone(),
                since: last_activity,
                days: idle_days,
                amount: group.total_advances,
            });
        }
    }

    debug!("Detected {} alerts", alerts.len());
    alerts
}

/// Knobs for one aggregation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateOptions {
    pub top_agents: usize,
    pub windows: AlertWindows,
}

impl From<&crate::config::DashboardConfig> for AggregateOptions {
    fn from(config: &crate::config::DashboardConfig) -> Self {
        Self {
            top_agents: config.top_agents,
            windows: AlertWindows {
                no_collection_days: config.no_collection_window_days,
                stale_after_days: config.stale_after_days,
            }
            .bounded(),
        }
    }
}

/// Everything the dashboard shows for one range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub range: DateRange,
    pub generated_on: NaiveDate,
    pub totals: Totals,
    pub balance_state: BalanceState,
    pub delivery: DeliveryKpis,
    pub sales: SalesKpis,
    pub outstanding: Vec<AgentOutstanding>,
    pub alerts: Vec<Alert>,
    pub figures_source: FiguresSource,
    pub collection_count: usize,
    pub active_agents: usize,
}

/// Reduce one load into a dashboard snapshot.
///
/// `rows` are clipped to `range`. `activity` holds the advances and
/// collections up to `today` with no lower bound; alerts are judged on it
/// so they do not depend on the displayed range.
///
/// `summary` is the backend's precomputed figures, if the fast path
/// answered. It is only used when it matches the rows exactly.
pub fn aggregate(
    range: DateRange,
    rows: &LedgerRows,
    activity: &LedgerRows,
    summary: Option<&SummaryFigures>,
    options: AggregateOptions,
    today: NaiveDate,
) -> DashboardSnapshot {
    let local = SummaryFigures::from_rows(rows);

    let (figures, figures_source) = match summary {
        Some(fast) => {
            let drift = fast.drift(&local);
            if drift.is_empty() {
                (*fast, FiguresSource::Summary)
            } else {
                warn!(
                    "Summary figures disagree with rows on {}; using computed figures",
                    drift.join(", ")
                );
                (local, FiguresSource::Recomputed)
            }
        }
        None => (local, FiguresSource::Computed),
    };

    let totals = figures.totals();

    DashboardSnapshot {
        range,
        generated_on: today,
        balance_state: totals.balance_state(),
        totals,
        delivery: figures.delivery(),
        sales: sales_kpis(&rows.orders),
        outstanding: outstanding_by_agent(rows, options.top_agents),
        alerts: detect_alerts(activity, options.windows, today),
        figures_source,
        collection_count: rows.collections.len(),
        active_agents: rows
            .agents
            .iter()
            .filter(|a| a.status == AgentStatus::Active)
            .count(),
    }
}
