//! Record keeping: validated create/edit/delete commands.
//!
//! Each draft validates locally first. A draft that fails validation never
//! reaches the backend, so a rejected form issues no write at all.

use crate::amount::{self, parse_amount};
use crate::backend::{RowQuery, RowStore};
use crate::error::{BackendError, RecordError, ValidationError};
use crate::models::{
    Agent, CashAdvance, CollectionItem, DeliveryStatus, Entity, Expense, FruitCollection, Order,
    OrderCategory, OrderItem, Payment,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::io::{BufRead, Write};
use tracing::{debug, error, info, warn};

fn amount_field(field: &'static str, raw: &str) -> Result<Decimal, ValidationError> {
    parse_amount(raw).map_err(|source| ValidationError::Amount { field, source })
}

fn positive(field: &'static str, raw: &str) -> Result<Decimal, ValidationError> {
    let value = amount_field(field, raw)?;
    if value <= Decimal::ZERO {
        return Err(ValidationError::NonPositive(field));
    }
    Ok(value)
}

fn required(field: &'static str, value: Option<&str>) -> Result<String, ValidationError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ValidationError::Missing(field)),
    }
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Parse a `WEIGHT@PRICE` collection item, e.g. `12.5@3.20`.
pub fn parse_collection_item(raw: &str) -> Result<CollectionItem, ValidationError> {
    let (weight, price) = raw
        .split_once('@')
        .ok_or_else(|| ValidationError::BadItem(raw.to_string()))?;
    let weight = parse_amount(weight).map_err(|_| ValidationError::BadItem(raw.to_string()))?;
    let price = parse_amount(price).map_err(|_| ValidationError::BadItem(raw.to_string()))?;

    if weight < Decimal::ZERO {
        return Err(ValidationError::Negative("weight"));
    }
    if price < Decimal::ZERO {
        return Err(ValidationError::Negative("price per kg"));
    }
    Ok(CollectionItem::new(weight, price))
}

/// Parse a `DESCRIPTION:QTY@PRICE` order line, e.g. `6in blocks:200@4.5`.
pub fn parse_order_item(raw: &str) -> Result<OrderItem, ValidationError> {
    let bad = || ValidationError::BadOrderItem(raw.to_string());
    let (description, rest) = raw.rsplit_once(':').ok_or_else(bad)?;
    let (quantity, price) = rest.split_once('@').ok_or_else(bad)?;

    let description = description.trim();
    if description.is_empty() {
        return Err(bad());
    }
    let quantity = parse_amount(quantity).map_err(|_| bad())?;
    let unit_price = parse_amount(price).map_err(|_| bad())?;

    if quantity <= Decimal::ZERO {
        return Err(ValidationError::NonPositive("quantity"));
    }
    if unit_price < Decimal::ZERO {
        return Err(ValidationError::Negative("unit price"));
    }

    Ok(OrderItem {
        description: description.to_string(),
        quantity,
        unit_price,
    })
}

#[derive(Debug, Clone, Default)]
pub struct AgentDraft {
    pub name: String,
    pub phone: Option<String>,
}

impl AgentDraft {
    pub fn validate(&self) -> Result<Value, ValidationError> {
        let name = required("name", Some(self.name.as_str()))?;
        Ok(json!({
            "name": name,
            "phone": optional(&self.phone),
            "status": "ACTIVE",
        }))
    }
}

#[derive(Debug, Clone)]
pub struct AdvanceDraft {
    pub agent_id: Option<String>,
    pub date: NaiveDate,
    pub amount: String,
    pub payment_method: Option<String>,
    pub signer: Option<String>,
}

impl AdvanceDraft {
    pub fn validate(&self) -> Result<Value, ValidationError> {
        let agent_id = required("agent", self.agent_id.as_deref())?;
        let amount = positive("amount", &self.amount)?;
        Ok(json!({
            "agent_id": agent_id,
            "date": self.date,
            "amount": amount,
            "payment_method": optional(&self.payment_method),
            "signer": optional(&self.signer),
        }))
    }
}

#[derive(Debug, Clone)]
pub struct ExpenseDraft {
    pub agent_id: Option<String>,
    pub date: NaiveDate,
    pub expense_type: String,
    pub amount: String,
    pub note: Option<String>,
}

impl ExpenseDraft {
    pub fn validate(&self) -> Result<Value, ValidationError> {
        let expense_type = required("expense type", Some(self.expense_type.as_str()))?.to_uppercase();
        let amount = positive("amount", &self.amount)?;
        Ok(json!({
            "agent_id": optional(&self.agent_id),
            "date": self.date,
            "type": expense_type,
            "amount": amount,
            "note": optional(&self.note),
        }))
    }
}

#[derive(Debug, Clone)]
pub struct CollectionDraft {
    pub agent_id: Option<String>,
    pub date: NaiveDate,
    pub driver: Option<String>,
    /// Raw `WEIGHT@PRICE` entries.
    pub items: Vec<String>,
    /// Total actually paid, when it differs from the items.
    pub total_spend: Option<String>,
}

impl CollectionDraft {
    /// The collection row and its parsed items.
    pub fn validate(&self) -> Result<(Value, Vec<CollectionItem>), ValidationError> {
        let agent_id = required("agent", self.agent_id.as_deref())?;

        let items = self
            .items
            .iter()
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| parse_collection_item(raw))
            .collect::<Result<Vec<_>, _>>()?;

        let stored = match self.total_spend.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                let total = amount_field("total spend", raw)?;
                if total < Decimal::ZERO {
                    return Err(ValidationError::Negative("total spend"));
                }
                Some(total)
            }
            _ => None,
        };

        let has_weight = items.iter().any(|i| i.weight_kg > Decimal::ZERO);
        let has_total = stored.is_some_and(|t| t > Decimal::ZERO);
        if !has_weight && !has_total {
            return Err(ValidationError::NoCollectionItems);
        }

        let item_total = amount::sum(items.iter().map(CollectionItem::line_total));
        let row = json!({
            "agent_id": agent_id,
            "date": self.date,
            "driver": optional(&self.driver),
            "total_spend": stored.unwrap_or(item_total),
        });
        Ok((row, items))
    }
}

#[derive(Debug, Clone)]
pub struct PaymentDraft {
    pub order_id: String,
    pub date: NaiveDate,
    pub amount: String,
    pub method: Option<String>,
}

impl PaymentDraft {
    pub fn validate(&self) -> Result<(String, Decimal), ValidationError> {
        let order_id = required("order", Some(self.order_id.as_str()))?;
        let amount = positive("amount", &self.amount)?;
        Ok((order_id, amount))
    }
}

#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub category: OrderCategory,
    /// Raw `DESCRIPTION:QTY@PRICE` entries.
    pub items: Vec<String>,
    pub discount: Option<String>,
    pub order_date: NaiveDate,
}

impl OrderDraft {
    pub fn validate(&self) -> Result<Value, ValidationError> {
        let customer_name = required("customer", self.customer_name.as_deref())?;

        let items = self
            .items
            .iter()
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| parse_order_item(raw))
            .collect::<Result<Vec<_>, _>>()?;
        if items.is_empty() {
            return Err(ValidationError::Missing("order items"));
        }

        let subtotal = amount::sum(items.iter().map(OrderItem::line_total));
        let discount = match self.discount.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => amount_field("discount", raw)?,
            _ => Decimal::ZERO,
        };
        if discount < Decimal::ZERO {
            return Err(ValidationError::Negative("discount"));
        }
        if discount > subtotal {
            return Err(ValidationError::DiscountTooLarge { discount, subtotal });
        }
        let total = subtotal - discount;

        Ok(json!({
            "customer_id": optional(&self.customer_id),
            "customer_name": customer_name,
            "category": self.category,
            "items": items,
            "subtotal": subtotal,
            "discount": discount,
            "total": total,
            "amount_paid": Decimal::ZERO,
            "balance_due": total,
            "delivery_status": DeliveryStatus::Pending,
            "order_date": self.order_date,
        }))
    }
}

/// Proof that the operator agreed to a delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    entity: Entity,
    id: String,
}

impl Confirmation {
    /// Confirmation given up front (`--yes`).
    pub fn assume_yes(entity: Entity, id: &str) -> Self {
        Self {
            entity,
            id: id.to_string(),
        }
    }

    /// Ask on `output` and read the answer from `input`. Only `y` or `yes`
    /// confirms.
    pub fn prompt(
        entity: Entity,
        id: &str,
        input: &mut impl BufRead,
        output: &mut impl Write,
    ) -> std::io::Result<Option<Self>> {
        write!(output, "Delete {} {}? This cannot be undone. [y/N] ", entity, id)?;
        output.flush()?;

        let mut answer = String::new();
        input.read_line(&mut answer)?;
        let answer = answer.trim().to_ascii_lowercase();

        Ok(if answer == "y" || answer == "yes" {
            Some(Self::assume_yes(entity, id))
        } else {
            None
        })
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// What a confirmed delete actually did.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    Deleted,
    /// Agents are never hard-deleted; they are marked inactive.
    Deactivated,
    /// A payment was removed and its order's balance recomputed.
    PaymentReversed(Box<Order>),
}

/// Submits validated drafts to the backend.
pub struct RecordService<'a, S> {
    store: &'a S,
}

impl<'a, S: RowStore> RecordService<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub async fn create_agent(&self, draft: &AgentDraft) -> Result<Agent, RecordError> {
        let row = draft.validate()?;
        let agent: Agent = self.insert(Entity::Agents, &row).await?;
        info!("Created agent {} ({})", agent.name, agent.id);
        Ok(agent)
    }

    pub async fn create_advance(&self, draft: &AdvanceDraft) -> Result<CashAdvance, RecordError> {
        let row = draft.validate()?;
        let advance: CashAdvance = self.insert(Entity::Advances, &row).await?;
        info!("Recorded advance {} of {}", advance.id, advance.amount);
        Ok(advance)
    }

    pub async fn create_expense(&self, draft: &ExpenseDraft) -> Result<Expense, RecordError> {
        let row = draft.validate()?;
        let expense: Expense = self.insert(Entity::Expenses, &row).await?;
        info!("Recorded {} expense {}", expense.expense_type, expense.id);
        Ok(expense)
    }

    /// Insert the collection, then all of its weighed lots in one request.
    /// If the lots cannot be stored the collection row is removed again.
    pub async fn create_collection(
        &self,
        draft: &CollectionDraft,
    ) -> Result<FruitCollection, RecordError> {
        let (row, items) = draft.validate()?;
        let mut collection: FruitCollection = self.insert(Entity::Collections, &row).await?;

        if !items.is_empty() {
            let item_rows: Vec<Value> = items
                .iter()
                .map(|item| {
                    json!({
                        "collection_id": collection.id,
                        "weight_kg": item.weight_kg,
                        "price_per_kg": item.price_per_kg,
                    })
                })
                .collect();

            if let Err(source) = self
                .store
                .insert_many(Entity::CollectionItems, &item_rows)
                .await
            {
                warn!(
                    "Items for collection {} were not saved; removing the collection",
                    collection.id
                );
                if let Err(undo) = self.store.delete(Entity::Collections, &collection.id).await {
                    error!(
                        "Collection {} is stored without its items: {}",
                        collection.id, undo
                    );
                    return Err(RecordError::Incomplete {
                        message: format!(
                            "collection {} was saved without its items; delete it and record it again",
                            collection.id
                        ),
                        source,
                    });
                }
                return Err(source.into());
            }
            debug!("Inserted {} items for collection {}", items.len(), collection.id);
        }

        collection.items = items;
        info!("Recorded collection {}", collection.id);
        Ok(collection)
    }

    pub async fn create_order(&self, draft: &OrderDraft) -> Result<Order, RecordError> {
        let row = draft.validate()?;
        let order: Order = self.insert(Entity::Orders, &row).await?;
        info!("Created {} order {} for {}", order.category, order.id, order.total);
        Ok(order)
    }

    /// Record a payment and bring the order's paid/balance figures up to
    /// date. Overpaying or paying a cancelled order is rejected before any
    /// write.
    pub async fn record_payment(&self, draft: &PaymentDraft) -> Result<(Payment, Order), RecordError> {
        let (order_id, amount) = draft.validate()?;
        let order: Order = self.fetch_one(Entity::Orders, &order_id).await?;

        if order.delivery_status == DeliveryStatus::Cancelled {
            return Err(ValidationError::OrderCancelled(order.delivery_status.to_string()).into());
        }
        if amount > order.balance_due {
            return Err(ValidationError::Overpayment {
                amount,
                balance_due: order.balance_due,
            }
            .into());
        }

        let row = json!({
            "order_id": order.id,
            "date": draft.date,
            "amount": amount,
            "method": optional(&draft.method),
        });
        let payment: Payment = self.insert(Entity::Payments, &row).await?;
        let order = self.settle_order(&order, &payment.id).await?;

        info!(
            "Recorded payment {} on order {}; balance due {}",
            payment.amount, order.id, order.balance_due
        );
        Ok((payment, order))
    }

    /// Move an order along its delivery lifecycle.
    pub async fn set_status(&self, order_id: &str, next: DeliveryStatus) -> Result<Order, RecordError> {
        let order: Order = self.fetch_one(Entity::Orders, order_id).await?;
        if !order.delivery_status.can_move_to(next) {
            return Err(ValidationError::InvalidTransition {
                from: order.delivery_status.to_string(),
                to: next.to_string(),
            }
            .into());
        }

        let updated = self
            .store
            .update(Entity::Orders, order_id, &json!({ "delivery_status": next }))
            .await?;
        let updated: Order = decode(Entity::Orders, updated)?;
        info!("Order {} moved {} -> {}", order_id, order.delivery_status, next);
        Ok(updated)
    }

    /// Carry out a confirmed delete.
    pub async fn delete(&self, confirmation: Confirmation) -> Result<DeleteOutcome, RecordError> {
        let entity = confirmation.entity();
        let id = confirmation.id();

        match entity {
            Entity::Agents => {
                self.store
                    .update(Entity::Agents, id, &json!({ "status": "INACTIVE" }))
                    .await?;
                info!("Agent {} deactivated", id);
                Ok(DeleteOutcome::Deactivated)
            }
            Entity::Payments => {
                let payment: Payment = self.fetch_one(Entity::Payments, id).await?;
                self.store.delete(Entity::Payments, id).await?;
                info!("Deleted payment {}", id);

                match payment.order_id {
                    Some(order_id) => {
                        let order: Order = self.fetch_one(Entity::Orders, &order_id).await?;
                        let order = self.settle_order(&order, id).await?;
                        Ok(DeleteOutcome::PaymentReversed(Box::new(order)))
                    }
                    None => Ok(DeleteOutcome::Deleted),
                }
            }
            _ => {
                self.store.delete(entity, id).await?;
                info!("Deleted {} {}", entity, id);
                Ok(DeleteOutcome::Deleted)
            }
        }
    }

    /// Bring an order up to date after one of its payments changed. The
    /// payment write has already happened, so a failure leaves the order's
    /// balance stale and is reported as such.
    async fn settle_order(&self, order: &Order, payment_id: &str) -> Result<Order, RecordError> {
        self.refresh_order_balance(order).await.map_err(|source| {
            error!(
                "Payment {} changed but order {} balance was not updated: {}",
                payment_id, order.id, source
            );
            RecordError::Incomplete {
                message: format!(
                    "payment {} was saved but order {} still shows its old balance",
                    payment_id, order.id
                ),
                source,
            }
        })
    }

    /// Recompute amount paid and balance due from the order's payments.
    async fn refresh_order_balance(&self, order: &Order) -> Result<Order, BackendError> {
        let payments = self
            .store
            .select(&RowQuery::new(Entity::Payments).eq("order_id", &order.id))
            .await?;
        let payments: Vec<Payment> = payments
            .into_iter()
            .map(|row| decode(Entity::Payments, row))
            .collect::<Result<_, _>>()?;

        let amount_paid = amount::sum(payments.iter().map(|p| p.amount));
        let balance_due = (order.total - amount_paid).max(Decimal::ZERO);

        let updated = self
            .store
            .update(
                Entity::Orders,
                &order.id,
                &json!({ "amount_paid": amount_paid, "balance_due": balance_due }),
            )
            .await?;
        decode(Entity::Orders, updated)
    }

    async fn insert<T: DeserializeOwned>(&self, entity: Entity, row: &Value) -> Result<T, RecordError> {
        let stored = self.store.insert(entity, row).await?;
        Ok(decode(entity, stored)?)
    }

    async fn fetch_one<T: DeserializeOwned>(&self, entity: Entity, id: &str) -> Result<T, RecordError> {
        let rows = self
            .store
            .select(&RowQuery::new(entity).eq("id", id))
            .await?;
        let row = rows.into_iter().next().ok_or_else(|| BackendError::NotFound {
            table: entity.table().to_string(),
            id: id.to_string(),
        })?;
        Ok(decode(entity, row)?)
    }
}

fn decode<T: DeserializeOwned>(entity: Entity, row: Value) -> Result<T, BackendError> {
    serde_json::from_value(row).map_err(|e| BackendError::Decode {
        what: entity.table().to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryStore;
    use crate::error::AmountError;
    use std::io::Cursor;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn advance(amount: &str) -> AdvanceDraft {
        AdvanceDraft {
            agent_id: Some("a".to_string()),
            date: day(),
            amount: amount.to_string(),
            payment_method: Some("CASH".to_string()),
            signer: None,
        }
    }

    fn order_store() -> MemoryStore {
        MemoryStore::new().with_rows(
            Entity::Orders,
            vec![
                json!({"id": "30", "category": "CEMENT", "total": "400", "amount_paid": "0",
                       "balance_due": "400", "delivery_status": "PENDING", "order_date": "2026-10-04"}),
                json!({"id": "31", "category": "BLOCKS", "total": "100", "amount_paid": "0",
                       "balance_due": "100", "delivery_status": "CANCELLED", "order_date": "2026-10-05"}),
            ],
        )
    }

    #[test]
    fn test_parse_collection_item() {
        let item = parse_collection_item("12.5@3.20").unwrap();
        assert_eq!(item.line_total(), Decimal::from(40));
        assert!(matches!(
            parse_collection_item("12.5"),
            Err(ValidationError::BadItem(_))
        ));
        assert_eq!(
            parse_collection_item("-1@3"),
            Err(ValidationError::Negative("weight"))
        );
    }

    #[test]
    fn test_parse_order_item() {
        let item = parse_order_item("6in blocks: 200 @ 4.5").unwrap();
        assert_eq!(item.description, "6in blocks");
        assert_eq!(item.line_total(), Decimal::from(900));
        assert!(parse_order_item("blocks@4").is_err());
        assert_eq!(
            parse_order_item("blocks:0@4"),
            Err(ValidationError::NonPositive("quantity"))
        );
    }

    #[test]
    fn test_advance_validation() {
        assert!(advance("1,250.00").validate().is_ok());
        assert_eq!(
            advance("0").validate(),
            Err(ValidationError::NonPositive("amount"))
        );
        assert_eq!(
            advance("abc").validate(),
            Err(ValidationError::Amount {
                field: "amount",
                source: AmountError::Invalid("abc".to_string())
            })
        );

        let mut no_agent = advance("10");
        no_agent.agent_id = Some("  ".to_string());
        assert_eq!(no_agent.validate(), Err(ValidationError::Missing("agent")));
    }

    #[test]
    fn test_collection_needs_items_or_total() {
        let mut draft = CollectionDraft {
            agent_id: Some("a".to_string()),
            date: day(),
            driver: None,
            items: vec!["0@5".to_string()],
            total_spend: None,
        };
        assert_eq!(draft.validate(), Err(ValidationError::NoCollectionItems));

        draft.items = vec!["2@10".to_string(), "3@12".to_string(), "0@5".to_string()];
        let (row, items) = draft.validate().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(row["total_spend"], json!("56"));

        draft.items.clear();
        draft.total_spend = Some("75".to_string());
        let (row, items) = draft.validate().unwrap();
        assert!(items.is_empty());
        assert_eq!(row["total_spend"], json!("75"));
    }

    #[test]
    fn test_order_totals_and_discount() {
        let mut draft = OrderDraft {
            customer_id: None,
            customer_name: Some("Kofi Builders".to_string()),
            category: OrderCategory::Blocks,
            items: vec!["6in blocks:200@4.5".to_string(), "delivery:1@50".to_string()],
            discount: Some("50".to_string()),
            order_date: day(),
        };
        let row = draft.validate().unwrap();
        assert_eq!(row["subtotal"], json!("950.0"));
        assert_eq!(row["total"], json!("900.0"));
        assert_eq!(row["balance_due"], row["total"]);
        assert_eq!(row["delivery_status"], json!("PENDING"));

        draft.discount = Some("2000".to_string());
        assert!(matches!(
            draft.validate(),
            Err(ValidationError::DiscountTooLarge { .. })
        ));

        draft.items.clear();
        assert_eq!(draft.validate(), Err(ValidationError::Missing("order items")));
    }

    #[tokio::test]
    async fn test_rejected_draft_issues_no_write() {
        let store = MemoryStore::new();
        let service = RecordService::new(&store);

        let result = service.create_advance(&advance("-5")).await;
        assert!(matches!(result, Err(RecordError::Validation(_))));
        assert_eq!(store.write_count(), 0);

        let created = service.create_advance(&advance("300")).await.unwrap();
        assert_eq!(created.amount, Decimal::from(300));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_collection_inserts_items() {
        let store = MemoryStore::new();
        let service = RecordService::new(&store);
        let draft = CollectionDraft {
            agent_id: Some("a".to_string()),
            date: day(),
            driver: Some("Yaw".to_string()),
            items: vec!["2@10".to_string(), "3@12".to_string()],
            total_spend: None,
        };

        let collection = service.create_collection(&draft).await.unwrap();
        assert_eq!(collection.items.len(), 2);

        let items = store.rows(Entity::CollectionItems);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["collection_id"], json!(collection.id));
    }

    #[tokio::test]
    async fn test_failed_items_remove_collection() {
        let store = MemoryStore::new().failing_writes(Entity::CollectionItems);
        let service = RecordService::new(&store);
        let draft = CollectionDraft {
            agent_id: Some("a".to_string()),
            date: day(),
            driver: None,
            items: vec!["2@10".to_string(), "3@12".to_string()],
            total_spend: Some("56".to_string()),
        };

        let result = service.create_collection(&draft).await;
        assert!(matches!(result, Err(RecordError::Backend(_))));
        assert!(store.rows(Entity::Collections).is_empty());
        assert!(store.rows(Entity::CollectionItems).is_empty());
    }

    #[tokio::test]
    async fn test_payment_with_stale_order_is_reported() {
        let store = order_store().failing_writes(Entity::Orders);
        let service = RecordService::new(&store);
        let draft = PaymentDraft {
            order_id: "30".to_string(),
            date: day(),
            amount: "150".to_string(),
            method: None,
        };

        let result = service.record_payment(&draft).await;
        match result {
            Err(RecordError::Incomplete { message, .. }) => {
                assert!(message.contains("order 30 still shows its old balance"));
            }
            other => panic!("expected incomplete write, got {:?}", other),
        }
        assert_eq!(store.rows(Entity::Payments).len(), 1);
    }

    #[tokio::test]
    async fn test_payment_recomputes_balance() {
        let store = order_store();
        let service = RecordService::new(&store);
        let pay = |amount: &str| PaymentDraft {
            order_id: "30".to_string(),
            date: day(),
            amount: amount.to_string(),
            method: None,
        };

        let (_, order) = service.record_payment(&pay("150")).await.unwrap();
        assert_eq!(order.amount_paid, Decimal::from(150));
        assert_eq!(order.balance_due, Decimal::from(250));

        let (_, order) = service.record_payment(&pay("250")).await.unwrap();
        assert_eq!(order.amount_paid, Decimal::from(400));
        assert_eq!(order.balance_due, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_overpayment_rejected_before_write() {
        let store = order_store();
        let service = RecordService::new(&store);

        let result = service
            .record_payment(&PaymentDraft {
                order_id: "30".to_string(),
                date: day(),
                amount: "400.01".to_string(),
                method: None,
            })
            .await;
        assert!(matches!(
            result,
            Err(RecordError::Validation(ValidationError::Overpayment { .. }))
        ));

        let cancelled = service
            .record_payment(&PaymentDraft {
                order_id: "31".to_string(),
                date: day(),
                amount: "10".to_string(),
                method: None,
            })
            .await;
        assert!(matches!(
            cancelled,
            Err(RecordError::Validation(ValidationError::OrderCancelled(_)))
        ));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let store = order_store();
        let service = RecordService::new(&store);

        let order = service
            .set_status("30", DeliveryStatus::PartiallyDelivered)
            .await
            .unwrap();
        assert_eq!(order.delivery_status, DeliveryStatus::PartiallyDelivered);

        let back = service.set_status("30", DeliveryStatus::Pending).await;
        assert!(matches!(
            back,
            Err(RecordError::Validation(ValidationError::InvalidTransition { .. }))
        ));

        let terminal = service.set_status("31", DeliveryStatus::Delivered).await;
        assert!(terminal.is_err());

        let missing = service.set_status("99", DeliveryStatus::Delivered).await;
        assert!(matches!(
            missing,
            Err(RecordError::Backend(BackendError::NotFound { .. }))
        ));
    }

    #[test]
    fn test_confirmation_prompt() {
        let mut out = Vec::new();
        let yes = Confirmation::prompt(Entity::Expenses, "20", &mut Cursor::new("Yes\n"), &mut out)
            .unwrap();
        assert_eq!(yes, Some(Confirmation::assume_yes(Entity::Expenses, "20")));
        assert!(String::from_utf8(out).unwrap().contains("Delete expenses 20?"));

        let mut out = Vec::new();
        let no = Confirmation::prompt(Entity::Expenses, "20", &mut Cursor::new("\n"), &mut out)
            .unwrap();
        assert!(no.is_none());
    }

    #[tokio::test]
    async fn test_delete_agent_deactivates() {
        let store = MemoryStore::new().with_rows(
            Entity::Agents,
            vec![json!({"id": "a", "name": "Ama", "status": "ACTIVE"})],
        );
        let service = RecordService::new(&store);

        let outcome = service
            .delete(Confirmation::assume_yes(Entity::Agents, "a"))
            .await
            .unwrap();
        assert_eq!(outcome, DeleteOutcome::Deactivated);
        let agents = store.rows(Entity::Agents);
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0]["status"], json!("INACTIVE"));
    }

    #[tokio::test]
    async fn test_delete_payment_restores_balance() {
        let store = order_store();
        let service = RecordService::new(&store);
        let (payment, _) = service
            .record_payment(&PaymentDraft {
                order_id: "30".to_string(),
                date: day(),
                amount: "100".to_string(),
                method: None,
            })
            .await
            .unwrap();

        let outcome = service
            .delete(Confirmation::assume_yes(Entity::Payments, &payment.id))
            .await
            .unwrap();
        match outcome {
            DeleteOutcome::PaymentReversed(order) => {
                assert_eq!(order.amount_paid, Decimal::ZERO);
                assert_eq!(order.balance_due, Decimal::from(400));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_missing_row() {
        let store = MemoryStore::new();
        let service = RecordService::new(&store);
        let result = service
            .delete(Confirmation::assume_yes(Entity::Expenses, "nope"))
            .await;
        assert!(matches!(
            result,
            Err(RecordError::Backend(BackendError::NotFound { .. }))
        ));
    }
}
