//! Data models for the trading ledger.
//!
//! Rows are deserialized straight from the backend's JSON. Money columns go
//! through the lenient amount parser and date columns accept either a plain
//! date or a full timestamp.

use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::warn;

use crate::amount;

/// Backend entity collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Agents,
    Advances,
    Collections,
    CollectionItems,
    Expenses,
    Orders,
    Payments,
}

impl Entity {
    /// Table name on the backend.
    pub fn table(&self) -> &'static str {
        match self {
            Entity::Agents => "agents",
            Entity::Advances => "cash_advances",
            Entity::Collections => "fruit_collections",
            Entity::CollectionItems => "collection_items",
            Entity::Expenses => "expenses",
            Entity::Orders => "orders",
            Entity::Payments => "payments",
        }
    }

    /// Column used for range filtering and descending ordering.
    pub fn date_column(&self) -> Option<&'static str> {
        match self {
            Entity::Agents | Entity::CollectionItems => None,
            Entity::Orders => Some("order_date"),
            _ => Some("date"),
        }
    }

    /// Human label used in messages.
    pub fn label(&self) -> &'static str {
        match self {
            Entity::Agents => "agents",
            Entity::Advances => "cash advances",
            Entity::Collections => "fruit collections",
            Entity::CollectionItems => "collection items",
            Entity::Expenses => "expenses",
            Entity::Orders => "orders",
            Entity::Payments => "payments",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Longest window, in days, accepted for ranges and alert checks.
pub const MAX_WINDOW_DAYS: i64 = 36_500;

/// Half-open date range `[from, to)`. A missing bound is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn all_time() -> Self {
        Self::default()
    }

    /// The calendar month containing `today`.
    pub fn this_month(today: NaiveDate) -> Self {
        let from = today.with_day(1).unwrap_or(today);
        let to = if from.month() == 12 {
            NaiveDate::from_ymd_opt(from.year() + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(from.year(), from.month() + 1, 1)
        };
        Self {
            from: Some(from),
            to,
        }
    }

    /// The last `days` days, today included. A start before the calendar's
    /// first date leaves the range open at the start.
    pub fn last_days(today: NaiveDate, days: u32) -> Self {
        let back = Duration::days(i64::from(days.saturating_sub(1)));
        Self {
            from: today.checked_sub_signed(back),
            to: today.succ_opt(),
        }
    }

    pub fn custom(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date < to)
    }

    pub fn is_all_time(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.from, self.to) {
            (None, None) => write!(f, "All time"),
            (Some(from), None) => write!(f, "Since {}", from),
            (None, Some(to)) => write!(f, "Before {}", to),
            (Some(from), Some(to)) => {
                // `to` is exclusive; show the last included day
                let last = to.pred_opt().unwrap_or(to);
                write!(f, "{} to {}", from, last)
            }
        }
    }
}

/// Agent status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    #[default]
    Active,
    Inactive,
}

/// A field agent who receives advances and buys fruit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: AgentStatus,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Cash handed to an agent for buying fruit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashAdvance {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default, deserialize_with = "flexible_id_opt")]
    pub agent_id: Option<String>,
    #[serde(deserialize_with = "lenient_date")]
    pub date: NaiveDate,
    #[serde(default, deserialize_with = "amount::lenient")]
    pub amount: Decimal,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub signer: Option<String>,
}

/// One weighed lot inside a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionItem {
    #[serde(default, deserialize_with = "amount::lenient")]
    pub weight_kg: Decimal,
    #[serde(default, deserialize_with = "amount::lenient")]
    pub price_per_kg: Decimal,
}

impl CollectionItem {
    pub fn new(weight_kg: Decimal, price_per_kg: Decimal) -> Self {
        Self {
            weight_kg,
            price_per_kg,
        }
    }

    /// Weight times price, zero if the product does not fit.
    pub fn line_total(&self) -> Decimal {
        self.weight_kg
            .checked_mul(self.price_per_kg)
            .unwrap_or_else(|| {
                warn!(
                    "Collection line {} kg @ {} overflows; counting it as zero",
                    self.weight_kg, self.price_per_kg
                );
                Decimal::ZERO
            })
    }
}

/// A fruit pickup recorded by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FruitCollection {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default, deserialize_with = "flexible_id_opt")]
    pub agent_id: Option<String>,
    #[serde(deserialize_with = "lenient_date")]
    pub date: NaiveDate,
    #[serde(default)]
    pub driver: Option<String>,
    /// Total recorded at entry time; zero or absent means "derive from items".
    #[serde(default, deserialize_with = "amount::lenient_opt")]
    pub total_spend: Option<Decimal>,
    #[serde(default, alias = "collection_items")]
    pub items: Vec<CollectionItem>,
}

impl FruitCollection {
    pub fn total_weight(&self) -> Decimal {
        amount::sum(self.items.iter().map(|i| i.weight_kg))
    }
}

/// Operating expense booked against an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default, deserialize_with = "flexible_id_opt")]
    pub agent_id: Option<String>,
    #[serde(deserialize_with = "lenient_date")]
    pub date: NaiveDate,
    #[serde(rename = "type", default)]
    pub expense_type: String,
    #[serde(default, deserialize_with = "amount::lenient")]
    pub amount: Decimal,
    #[serde(default)]
    pub note: Option<String>,
}

/// What a customer order is for.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderCategory {
    Blocks,
    Cement,
    PalmFruit,
    #[default]
    #[serde(other)]
    Other,
}

impl fmt::Display for OrderCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderCategory::Blocks => write!(f, "Blocks"),
            OrderCategory::Cement => write!(f, "Cement"),
            OrderCategory::PalmFruit => write!(f, "Palm fruit"),
            OrderCategory::Other => write!(f, "Other"),
        }
    }
}

/// Fulfilment state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    #[default]
    Pending,
    PartiallyDelivered,
    Delivered,
    Cancelled,
}

impl DeliveryStatus {
    /// Still waiting on (some) delivery.
    pub fn is_outstanding(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::Pending | DeliveryStatus::PartiallyDelivered
        )
    }

    /// Allowed lifecycle moves.
    pub fn can_move_to(&self, next: DeliveryStatus) -> bool {
        use DeliveryStatus::*;
        matches!(
            (self, next),
            (Pending, PartiallyDelivered)
                | (Pending, Delivered)
                | (Pending, Cancelled)
                | (PartiallyDelivered, Delivered)
                | (PartiallyDelivered, Cancelled)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "PENDING",
            DeliveryStatus::PartiallyDelivered => "PARTIALLY_DELIVERED",
            DeliveryStatus::Delivered => "DELIVERED",
            DeliveryStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Line on a customer order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub description: String,
    #[serde(default, deserialize_with = "amount::lenient")]
    pub quantity: Decimal,
    #[serde(default, deserialize_with = "amount::lenient")]
    pub unit_price: Decimal,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal {
        self.quantity.checked_mul(self.unit_price).unwrap_or_else(|| {
            warn!(
                "Order line {} x {} overflows; counting it as zero",
                self.quantity, self.unit_price
            );
            Decimal::ZERO
        })
    }
}

/// Customer order for blocks, cement or palm fruit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default, deserialize_with = "flexible_id_opt")]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: OrderCategory,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default, deserialize_with = "amount::lenient")]
    pub subtotal: Decimal,
    #[serde(default, deserialize_with = "amount::lenient")]
    pub discount: Decimal,
    #[serde(default, deserialize_with = "amount::lenient")]
    pub total: Decimal,
    #[serde(default, deserialize_with = "amount::lenient")]
    pub amount_paid: Decimal,
    #[serde(default, deserialize_with = "amount::lenient")]
    pub balance_due: Decimal,
    #[serde(default, deserialize_with = "null_as_default")]
    pub delivery_status: DeliveryStatus,
    #[serde(deserialize_with = "lenient_date")]
    pub order_date: NaiveDate,
}

/// Money received against an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default, deserialize_with = "flexible_id_opt")]
    pub order_id: Option<String>,
    #[serde(deserialize_with = "lenient_date")]
    pub date: NaiveDate,
    #[serde(default, deserialize_with = "amount::lenient")]
    pub amount: Decimal,
    #[serde(default)]
    pub method: Option<String>,
}

/// Everything one dashboard load pulls from the backend.
#[derive(Debug, Clone, Default)]
pub struct LedgerRows {
    pub agents: Vec<Agent>,
    pub advances: Vec<CashAdvance>,
    pub collections: Vec<FruitCollection>,
    pub expenses: Vec<Expense>,
    pub orders: Vec<Order>,
    pub payments: Vec<Payment>,
}

impl LedgerRows {
    pub fn agent(&self, id: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Name to show for an agent reference; unknown or missing references
    /// show as "Unknown".
    pub fn agent_name(&self, id: Option<&str>) -> String {
        id.and_then(|id| self.agent(id))
            .map(|a| a.name.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

/// Rows behind one agent statement.
#[derive(Debug, Clone)]
pub struct AgentRows {
    pub agent: Agent,
    pub range: DateRange,
    pub advances: Vec<CashAdvance>,
    pub collections: Vec<FruitCollection>,
    pub expenses: Vec<Expense>,
}

fn id_from_value(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Ids are uuids on some tables and serial integers on others.
fn flexible_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    id_from_value(value).ok_or_else(|| serde::de::Error::custom("row id is missing"))
}

fn flexible_id_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(id_from_value))
}

/// A `null` column reads as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts `2026-03-01` as well as `2026-03-01T08:30:00+00:00`.
fn lenient_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid date '{}'", raw)))
}

/// Parse the date part of a date or timestamp string.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let head = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}
