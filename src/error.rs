//! Error types.
//!
//! Domain errors are plain enums so callers can match on them; the
//! command handlers in `main` wrap them in `anyhow` with context.

use rust_decimal::Decimal;
use thiserror::Error;

/// Failure to turn a raw wire or form value into a money amount.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("'{0}' is not a valid amount")]
    Invalid(String),
    #[error("'{0}' is larger than any amount the ledger accepts")]
    TooLarge(String),
}

/// Failure talking to the row store.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend not configured: missing {0}")]
    NotConfigured(&'static str),
    #[error("cannot connect to backend at {0}")]
    Connect(String),
    #[error("backend request timed out after {0}s")]
    Timeout(u64),
    #[error("backend error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to send request: {0}")]
    Request(String),
    #[error("failed to decode {what}: {message}")]
    Decode { what: String, message: String },
    #[error("{table} row {id} not found")]
    NotFound { table: String, id: String },
}

/// A dashboard or statement load that could not complete.
///
/// One failing entity aborts the whole load, so this names the entity that
/// failed and nothing is rendered.
#[derive(Debug, Error)]
#[error("could not load {entity}: {source}")]
pub struct FetchError {
    pub entity: &'static str,
    #[source]
    pub source: BackendError,
}

/// A form that must not be submitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: {source}")]
    Amount {
        field: &'static str,
        #[source]
        source: AmountError,
    },
    #[error("{0} must be greater than zero")]
    NonPositive(&'static str),
    #[error("{0} cannot be negative")]
    Negative(&'static str),
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("a collection needs at least one item with weight, or a stored total")]
    NoCollectionItems,
    #[error("invalid collection item '{0}' (expected WEIGHT@PRICE)")]
    BadItem(String),
    #[error("invalid order item '{0}' (expected DESCRIPTION:QTY@PRICE)")]
    BadOrderItem(String),
    #[error("discount {discount} exceeds subtotal {subtotal}")]
    DiscountTooLarge { discount: Decimal, subtotal: Decimal },
    #[error("payment {amount} exceeds balance due {balance_due}")]
    Overpayment { amount: Decimal, balance_due: Decimal },
    #[error("order is {0} and cannot take payments")]
    OrderCancelled(String),
    #[error("cannot move an order from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

/// Failure of a create/edit/delete command.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("rejected: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// Some writes went through before a later one failed.
    #[error("{message}: {source}")]
    Incomplete {
        message: String,
        #[source]
        source: BackendError,
    },
}
