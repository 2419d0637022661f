//! Runs `PostgresRepository` against a real database.
//!
//! These tests are ignored by default; run them with
//! `DATABASE_URL=... cargo test -- --ignored` against a disposable database.

use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use table_orders::{
    RepoError,
    models::{LineItemRequest, OrderStatus, PaymentMethod, PaymentStatus},
    orders::{self, OrderDraft},
    repository::{CancelOutcome, MenuFilter, OrderFilter, PostgresRepository, Repository},
};
use tokio::test;
use uuid::Uuid;

// --- Test Context and Setup ---

struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        DbTestContext { pool }
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

async fn create_test_user(pool: &PgPool, role: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, email, role) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(format!("{id}@{role}.test"))
        .bind(role)
        .execute(pool)
        .await
        .expect("Failed to create test user");
    id
}

async fn create_test_table(pool: &PgPool, is_active: bool) -> (Uuid, String) {
    let id = Uuid::new_v4();
    let token = format!("token-{id}");
    sqlx::query(
        "INSERT INTO dining_tables (id, label, seats, token, is_active) VALUES ($1, $2, 4, $3, $4)",
    )
    .bind(id)
    .bind(format!("Table {}", &token[6..10]))
    .bind(&token)
    .bind(is_active)
    .execute(pool)
    .await
    .expect("Failed to create test table");
    (id, token)
}

async fn create_test_menu_item(pool: &PgPool, category: &str, is_available: bool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO menu_items (id, name, category, price, is_available) VALUES ($1, $2, $3, 950, $4)",
    )
    .bind(id)
    .bind(format!("Dish {id}"))
    .bind(category)
    .bind(is_available)
    .execute(pool)
    .await
    .expect("Failed to create test menu item");
    id
}

fn draft(customer_id: Option<Uuid>, table_id: Option<Uuid>) -> OrderDraft {
    OrderDraft {
        items: vec![LineItemRequest {
            menu_item_id: Uuid::new_v4(),
            name: "Gyoza".to_string(),
            unit_price: 800,
            quantity: 3,
            note: Some("extra sauce".to_string()),
        }],
        metadata: Some(json!({ "source": "qr" })),
        table_id,
        customer_id,
        tax_rate_bps: 1000,
        now: Utc::now(),
    }
}

// --- Tests ---

#[test]
#[ignore]
async fn test_order_round_trips_through_postgres() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let customer = create_test_user(&ctx.pool, "customer").await;
    let (table_id, _) = create_test_table(&ctx.pool, true).await;

    let created = repo
        .create_order(orders::build_order(draft(Some(customer), Some(table_id))).unwrap())
        .await
        .unwrap();

    let fetched = repo.get_order(created.id).await.unwrap().unwrap();
    assert_eq!(fetched.order_number, created.order_number);
    assert_eq!(fetched.items, created.items);
    assert_eq!(fetched.totals.subtotal, 2400);
    assert_eq!(fetched.totals.tax, 240);
    assert_eq!(fetched.totals.total, 2640);
    assert_eq!(fetched.metadata, json!({ "source": "qr" }));
    assert_eq!(fetched.status, OrderStatus::Placed);
    assert_eq!(fetched.payment.status, PaymentStatus::Pending);
}

#[test]
#[ignore]
async fn test_duplicate_order_number_is_reported() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let first = orders::build_order(draft(None, None)).unwrap();
    let mut second = orders::build_order(draft(None, None)).unwrap();
    second.order_number = first.order_number.clone();

    repo.create_order(first).await.unwrap();
    let err = repo.create_order(second).await.unwrap_err();
    assert!(matches!(err, RepoError::DuplicateOrderNumber(_)));
}

#[test]
#[ignore]
async fn test_inactive_tables_do_not_resolve() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let (active_id, active_token) = create_test_table(&ctx.pool, true).await;
    let (_, inactive_token) = create_test_table(&ctx.pool, false).await;

    let table = repo.get_table_by_token(&active_token).await.unwrap().unwrap();
    assert_eq!(table.id, active_id);
    assert!(repo.get_table_by_token(&inactive_token).await.unwrap().is_none());
}

#[test]
#[ignore]
async fn test_menu_filters_by_category_and_availability() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let category = format!("cat-{}", Uuid::new_v4());
    let available = create_test_menu_item(&ctx.pool, &category, true).await;
    create_test_menu_item(&ctx.pool, &category, false).await;

    let items = repo
        .get_menu_items(MenuFilter {
            category: Some(category.clone()),
            available: Some(true),
        })
        .await
        .unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, available);
}

#[test]
#[ignore]
async fn test_list_orders_filters_and_counts() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let customer = create_test_user(&ctx.pool, "customer").await;

    for _ in 0..3 {
        repo.create_order(orders::build_order(draft(Some(customer), None)).unwrap())
            .await
            .unwrap();
    }
    repo.create_order(orders::build_order(draft(None, None)).unwrap())
        .await
        .unwrap();

    let (page, total) = repo
        .list_orders(OrderFilter {
            customer_id: Some(customer),
            limit: 2,
            offset: 0,
            ..OrderFilter::default()
        })
        .await
        .unwrap();

    assert_eq!(total, 3);
    assert_eq!(page.len(), 2);
    assert!(page.iter().all(|o| o.customer_id == Some(customer)));
    assert!(page[0].created_at >= page[1].created_at);
}

#[test]
#[ignore]
async fn test_payment_on_served_order_completes_it() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let order = repo
        .create_order(orders::build_order(draft(None, None)).unwrap())
        .await
        .unwrap();

    repo.set_order_status(order.id, OrderStatus::Served)
        .await
        .unwrap()
        .unwrap();
    let paid = repo
        .update_payment(order.id, PaymentStatus::Paid, Some(PaymentMethod::Cash))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(paid.status, OrderStatus::Completed);
    assert_eq!(paid.payment.method, Some(PaymentMethod::Cash));
    assert!(paid.payment.paid_at.is_some());

    // Omitting the method keeps the stored one.
    let refunded = repo
        .update_payment(order.id, PaymentStatus::Refunded, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refunded.payment.method, Some(PaymentMethod::Cash));
    assert!(refunded.payment.refunded_at.is_some());
    assert_eq!(refunded.status, OrderStatus::Completed);
}

#[test]
#[ignore]
async fn test_cancel_is_conditional_on_status_and_owner() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let owner = create_test_user(&ctx.pool, "customer").await;
    let stranger = create_test_user(&ctx.pool, "customer").await;
    let order = repo
        .create_order(orders::build_order(draft(Some(owner), None)).unwrap())
        .await
        .unwrap();

    let outcome = repo.cancel_order(order.id, Some(stranger)).await.unwrap();
    assert_eq!(outcome, CancelOutcome::NotFound);

    let outcome = repo.cancel_order(order.id, Some(owner)).await.unwrap();
    assert!(matches!(outcome, CancelOutcome::Canceled(ref o) if o.status == OrderStatus::Canceled));

    let outcome = repo.cancel_order(order.id, None).await.unwrap();
    assert_eq!(outcome, CancelOutcome::Terminal(OrderStatus::Canceled));

    let outcome = repo.cancel_order(Uuid::new_v4(), None).await.unwrap();
    assert_eq!(outcome, CancelOutcome::NotFound);
}
