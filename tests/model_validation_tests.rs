use chrono::Utc;
use serde_json::json;
use sqlx::types::Json;
use table_orders::models::{
    DiningTable, LineItem, Order, OrderRow, OrderStatus, PaymentMethod, PaymentStatus, Role,
    UpdatePaymentRequest, UpdateStatusRequest,
};
use uuid::Uuid;

fn order_row(status: &str, payment_status: &str, method: Option<&str>) -> OrderRow {
    let now = Utc::now();
    OrderRow {
        id: Uuid::new_v4(),
        order_number: "ORD-260101-ABCDEF".to_string(),
        table_id: None,
        customer_id: Some(Uuid::new_v4()),
        items: Json(vec![LineItem {
            menu_item_id: Uuid::new_v4(),
            name: "Margherita".to_string(),
            unit_price: 1200,
            quantity: 2,
            note: None,
        }]),
        subtotal: 2400,
        tax: 0,
        total: 2400,
        status: status.to_string(),
        payment_status: payment_status.to_string(),
        payment_method: method.map(str::to_string),
        paid_at: None,
        refunded_at: None,
        metadata: json!({ "source": "qr" }),
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn test_order_row_maps_flattened_payment_columns() {
    let order = Order::try_from(order_row("served", "paid", Some("card"))).unwrap();

    assert_eq!(order.status, OrderStatus::Served);
    assert_eq!(order.payment.status, PaymentStatus::Paid);
    assert_eq!(order.payment.method, Some(PaymentMethod::Card));
    assert_eq!(order.totals.subtotal, 2400);
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.metadata["source"], "qr");
}

#[test]
fn test_order_row_with_unknown_status_is_rejected() {
    let err = Order::try_from(order_row("cooking", "pending", None)).unwrap_err();
    assert_eq!(err.value, "cooking");
    assert_eq!(err.to_string(), "unknown order status 'cooking'");
}

#[test]
fn test_order_json_uses_lowercase_enums_and_nested_payment() {
    let order = Order::try_from(order_row("placed", "pending", None)).unwrap();
    let value = serde_json::to_value(&order).unwrap();

    assert_eq!(value["status"], "placed");
    assert_eq!(value["payment"]["status"], "pending");
    assert!(value["payment"]["method"].is_null());
    assert_eq!(value["totals"]["total"], 2400);
    assert_eq!(value["items"][0]["unit_price"], 1200);
    // Notes are omitted when absent.
    assert!(value["items"][0].get("note").is_none());
}

#[test]
fn test_enum_round_trip_through_strings() {
    for status in OrderStatus::ALL {
        assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), *status);
    }
    for status in PaymentStatus::ALL {
        assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), *status);
    }
    assert!("Paid".parse::<PaymentStatus>().is_err());
}

#[test]
fn test_only_staff_and_admin_are_elevated() {
    assert!(!Role::Customer.is_staff());
    assert!(Role::Staff.is_staff());
    assert!(Role::Admin.is_staff());
}

#[test]
fn test_dining_table_never_serializes_its_token() {
    let table = DiningTable {
        id: Uuid::new_v4(),
        label: "Patio 4".to_string(),
        seats: 4,
        token: "secret-token".to_string(),
        is_active: true,
    };

    let json_output = serde_json::to_string(&table).unwrap();
    assert!(json_output.contains("Patio 4"));
    assert!(!json_output.contains("secret-token"));
    assert!(!json_output.contains("token"));
}

#[test]
fn test_payment_request_method_is_optional() {
    let req: UpdatePaymentRequest = serde_json::from_value(json!({ "status": "refunded" })).unwrap();
    assert_eq!(req.status, PaymentStatus::Refunded);
    assert_eq!(req.method, None);

    let req: UpdatePaymentRequest =
        serde_json::from_value(json!({ "status": "paid", "method": "cash" })).unwrap();
    assert_eq!(req.method, Some(PaymentMethod::Cash));
}

#[test]
fn test_status_request_rejects_unknown_status() {
    let result = serde_json::from_value::<UpdateStatusRequest>(json!({ "status": "cooking" }));
    assert!(result.is_err());
}
