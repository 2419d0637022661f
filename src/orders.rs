//! Order Lifecycle Rules
//!
//! Pure domain logic shared by the handlers and every `Repository`
//! implementation: line-item validation, total computation, order-number
//! generation and the status/payment transitions.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    LineItem, LineItemRequest, NewOrder, Order, OrderStatus, OrderTotals, PaymentMethod,
    PaymentStatus,
};

pub const ORDER_NUMBER_PREFIX: &str = "ORD";

const BPS_DENOMINATOR: i64 = 10_000;

/// Errors raised while validating an order or applying a transition.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrderError {
    #[error("Order must contain at least one item")]
    EmptyOrder,
    #[error("Item {index}: {reason}")]
    InvalidItem { index: usize, reason: &'static str },
    #[error("Order total exceeds the supported range")]
    TotalOverflow,
    #[error("Metadata must be a JSON object")]
    InvalidMetadata,
    #[error("Order cannot be canceled once it is {0}")]
    NotCancelable(OrderStatus),
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Canceled)
    }
}

/// validate_line_items
///
/// Checks every submitted item (name non-empty, price > 0, quantity >= 1) and
/// normalizes it: names and notes are trimmed, blank notes are dropped.
pub fn validate_line_items(items: Vec<LineItemRequest>) -> Result<Vec<LineItem>, OrderError> {
    if items.is_empty() {
        return Err(OrderError::EmptyOrder);
    }

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let name = item.name.trim();
            if name.is_empty() {
                return Err(OrderError::InvalidItem {
                    index,
                    reason: "name must not be empty",
                });
            }
            if item.unit_price <= 0 {
                return Err(OrderError::InvalidItem {
                    index,
                    reason: "unit price must be greater than zero",
                });
            }
            if item.quantity < 1 {
                return Err(OrderError::InvalidItem {
                    index,
                    reason: "quantity must be at least 1",
                });
            }

            let note = item
                .note
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty());

            Ok(LineItem {
                menu_item_id: item.menu_item_id,
                name: name.to_string(),
                unit_price: item.unit_price,
                quantity: item.quantity,
                note,
            })
        })
        .collect()
}

/// compute_totals
///
/// `subtotal = Σ unit_price × quantity`, tax rounded half-up from basis points,
/// `total = subtotal + tax`. All amounts are cents.
pub fn compute_totals(items: &[LineItem], tax_rate_bps: u32) -> Result<OrderTotals, OrderError> {
    let subtotal = items.iter().try_fold(0i64, |acc, item| {
        item.unit_price
            .checked_mul(i64::from(item.quantity))
            .and_then(|line| acc.checked_add(line))
            .ok_or(OrderError::TotalOverflow)
    })?;

    let tax = subtotal
        .checked_mul(i64::from(tax_rate_bps))
        .and_then(|scaled| scaled.checked_add(BPS_DENOMINATOR / 2))
        .map(|scaled| scaled / BPS_DENOMINATOR)
        .ok_or(OrderError::TotalOverflow)?;

    let total = subtotal.checked_add(tax).ok_or(OrderError::TotalOverflow)?;

    Ok(OrderTotals {
        subtotal,
        tax,
        total,
    })
}

/// Produces `ORD-YYMMDD-XXXXXX`: the UTC placement date plus six random hex digits.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(6)
        .collect::<String>()
        .to_uppercase();
    format!("{}-{}-{}", ORDER_NUMBER_PREFIX, now.format("%y%m%d"), suffix)
}

/// Accepts a JSON object (or nothing, which becomes `{}`); rejects any other JSON value.
pub fn normalize_metadata(metadata: Option<Value>) -> Result<Value, OrderError> {
    match metadata {
        None | Some(Value::Null) => Ok(Value::Object(Map::new())),
        Some(Value::Object(map)) => Ok(Value::Object(map)),
        Some(_) => Err(OrderError::InvalidMetadata),
    }
}

/// OrderDraft
///
/// Everything `build_order` needs besides the raw request.
pub struct OrderDraft {
    pub items: Vec<LineItemRequest>,
    pub metadata: Option<Value>,
    pub table_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub tax_rate_bps: u32,
    pub now: DateTime<Utc>,
}

/// build_order
///
/// Validates the draft and produces the insertable order with its totals and a
/// freshly generated order number.
pub fn build_order(draft: OrderDraft) -> Result<NewOrder, OrderError> {
    let items = validate_line_items(draft.items)?;
    let totals = compute_totals(&items, draft.tax_rate_bps)?;
    let metadata = normalize_metadata(draft.metadata)?;

    Ok(NewOrder {
        id: Uuid::new_v4(),
        order_number: generate_order_number(draft.now),
        table_id: draft.table_id,
        customer_id: draft.customer_id,
        items,
        totals,
        metadata,
        created_at: draft.now,
    })
}

/// Order status after a payment update: a served order whose payment becomes
/// `paid` is completed, every other combination keeps its status.
pub fn status_after_payment(current: OrderStatus, payment: PaymentStatus) -> OrderStatus {
    match (current, payment) {
        (OrderStatus::Served, PaymentStatus::Paid) => OrderStatus::Completed,
        (status, _) => status,
    }
}

/// apply_payment
///
/// In-place version of the payment update performed by the SQL repository:
/// stamps `paid_at`/`refunded_at`, keeps the stored method when none is given and
/// auto-promotes the order status.
pub fn apply_payment(
    order: &mut Order,
    status: PaymentStatus,
    method: Option<PaymentMethod>,
    now: DateTime<Utc>,
) {
    order.payment.status = status;
    if method.is_some() {
        order.payment.method = method;
    }
    match status {
        PaymentStatus::Paid => order.payment.paid_at = Some(now),
        PaymentStatus::Refunded => order.payment.refunded_at = Some(now),
        PaymentStatus::Pending | PaymentStatus::Failed => {}
    }
    order.status = status_after_payment(order.status, status);
    order.updated_at = now;
}

/// Cancels the order unless it already reached a terminal state.
pub fn cancel(order: &mut Order, now: DateTime<Utc>) -> Result<(), OrderError> {
    if order.status.is_terminal() {
        return Err(OrderError::NotCancelable(order.status));
    }
    order.status = OrderStatus::Canceled;
    order.updated_at = now;
    Ok(())
}
