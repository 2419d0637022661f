use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, types::Json};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Enumerations ---

/// Raised when a stored or submitted string is not a member of one of the enums below.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Generates `as_str`, `Display` and `FromStr` for a lowercase string enum.
macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ParseEnumError { kind: $kind, value: other.to_string() }),
                }
            }
        }
    };
}

/// OrderStatus
///
/// Kitchen/service lifecycle of an order. `Completed` and `Canceled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum OrderStatus {
    #[default]
    Placed,
    Preparing,
    Ready,
    Served,
    Canceled,
    Completed,
}

string_enum!(OrderStatus, "order status", {
    Placed => "placed",
    Preparing => "preparing",
    Ready => "ready",
    Served => "served",
    Canceled => "canceled",
    Completed => "completed",
});

/// PaymentStatus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

string_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
    Refunded => "refunded",
});

/// PaymentMethod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum PaymentMethod {
    Cash,
    Card,
    Online,
    Other,
}

string_enum!(PaymentMethod, "payment method", {
    Cash => "cash",
    Card => "card",
    Online => "online",
    Other => "other",
});

/// Role
///
/// RBAC role stored on the `users` table. Staff and admin share the elevated permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    Customer,
    Staff,
    Admin,
}

string_enum!(Role, "role", {
    Customer => "customer",
    Staff => "staff",
    Admin => "admin",
});

impl Role {
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Staff | Role::Admin)
    }
}

// --- Core Schemas (Mapped to Database) ---

/// User
///
/// Identity record from the `users` table, loaded during authentication.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    // Raw role column; parsed into `Role` by the auth extractor.
    pub role: String,
}

/// MenuItem
///
/// Read-only view of the `menu_items` table. Line items reference these by id but
/// snapshot the name and price at order time.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct MenuItem {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    /// Price in minor currency units (cents).
    pub price: i64,
    pub is_available: bool,
    pub image_url: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// DiningTable
///
/// A physical table. The token is the secret printed on the table (QR code) and is
/// never echoed back in responses.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct DiningTable {
    pub id: Uuid,
    pub label: String,
    pub seats: i32,
    #[serde(skip)]
    #[ts(skip)]
    pub token: String,
    pub is_active: bool,
}

/// LineItem
///
/// One ordered quantity of a menu item at its order-time price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LineItem {
    pub menu_item_id: Uuid,
    /// Name snapshot taken when the order was placed.
    pub name: String,
    /// Unit price in cents.
    pub unit_price: i64,
    pub quantity: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// OrderTotals
///
/// Derived from the line items at creation time; never recomputed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct OrderTotals {
    pub subtotal: i64,
    pub tax: i64,
    pub total: i64,
}

/// Payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Payment {
    pub status: PaymentStatus,
    pub method: Option<PaymentMethod>,
    #[ts(type = "string | null")]
    pub paid_at: Option<DateTime<Utc>>,
    #[ts(type = "string | null")]
    pub refunded_at: Option<DateTime<Utc>>,
}

/// Order
///
/// The aggregate returned by every order endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub table_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub items: Vec<LineItem>,
    pub totals: OrderTotals,
    pub status: OrderStatus,
    pub payment: Payment,
    /// Free-form JSON object supplied by the client.
    #[schema(value_type = Object)]
    pub metadata: Value,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// NewOrder
///
/// A fully validated order ready to be inserted. Built by `orders::build_order`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub id: Uuid,
    pub order_number: String,
    pub table_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub items: Vec<LineItem>,
    pub totals: OrderTotals,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    /// The order as it looks right after insertion.
    pub fn into_order(self) -> Order {
        Order {
            id: self.id,
            order_number: self.order_number,
            table_id: self.table_id,
            customer_id: self.customer_id,
            items: self.items,
            totals: self.totals,
            status: OrderStatus::Placed,
            payment: Payment::default(),
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// OrderRow
///
/// Raw row of the `orders` table. Line items and metadata live in JSONB columns,
/// the payment sub-record is flattened.
#[derive(Debug, Clone, FromRow)]
pub struct OrderRow {
    pub id: Uuid,
    pub order_number: String,
    pub table_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub items: Json<Vec<LineItem>>,
    pub subtotal: i64,
    pub tax: i64,
    pub total: i64,
    pub status: String,
    pub payment_status: String,
    pub payment_method: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = ParseEnumError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let method = row
            .payment_method
            .as_deref()
            .map(PaymentMethod::from_str)
            .transpose()?;

        Ok(Order {
            id: row.id,
            order_number: row.order_number,
            table_id: row.table_id,
            customer_id: row.customer_id,
            items: row.items.0,
            totals: OrderTotals {
                subtotal: row.subtotal,
                tax: row.tax,
                total: row.total,
            },
            status: row.status.parse()?,
            payment: Payment {
                status: row.payment_status.parse()?,
                method,
                paid_at: row.paid_at,
                refunded_at: row.refunded_at,
            },
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// --- Request Payloads (Input Schemas) ---

/// LineItemRequest
///
/// A line item as submitted by the client, before validation.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LineItemRequest {
    pub menu_item_id: Uuid,
    pub name: String,
    pub unit_price: i64,
    pub quantity: i32,
    #[serde(default)]
    pub note: Option<String>,
}

/// CreateOrderRequest
///
/// Input payload for POST /orders.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateOrderRequest {
    /// Token printed on the table; attributes the order to that table.
    #[serde(default)]
    pub table_token: Option<String>,
    pub items: Vec<LineItemRequest>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Value>,
}

/// UpdateStatusRequest
///
/// Input payload for PATCH /orders/{id}/status.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// UpdatePaymentRequest
///
/// Input payload for PATCH /orders/{id}/payment. Omitting `method` keeps the stored one.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdatePaymentRequest {
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<PaymentMethod>,
}

// --- Output Schemas ---

/// OrderPage
///
/// One page of an order listing.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

/// UserProfile
///
/// Output schema for GET /me.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}
