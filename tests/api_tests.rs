//! End-to-end tests over a real socket and a real database.
//!
//! Ignored by default; they need `DATABASE_URL` pointing at a disposable database.

use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use table_orders::{
    AppConfig, AppState, PostgresRepository, RepositoryState, create_router,
    models::{Order, OrderPage, OrderStatus, PaymentStatus},
};
use tokio::net::TcpListener;
use uuid::Uuid;

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
    pub pool: sqlx::PgPool,
}

async fn spawn_app() -> TestApp {
    dotenv::dotenv().ok();

    let db_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for api tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await
        .expect("Failed to connect to Postgres in tests");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations.");

    let repo = Arc::new(PostgresRepository::new(pool.clone())) as RepositoryState;
    let config = AppConfig {
        db_url,
        tax_rate_bps: 500,
        ..AppConfig::default()
    };
    let router = create_router(AppState { repo, config });

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp { address, pool }
}

async fn seed_user(pool: &sqlx::PgPool, role: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, email, role) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(format!("{id}@example.com"))
        .bind(role)
        .execute(pool)
        .await
        .unwrap();
    id
}

async fn seed_table(pool: &sqlx::PgPool) -> String {
    let token = format!("qr-{}", Uuid::new_v4());
    sqlx::query("INSERT INTO dining_tables (id, label, seats, token) VALUES ($1, 'Patio 1', 4, $2)")
        .bind(Uuid::new_v4())
        .bind(&token)
        .execute(pool)
        .await
        .unwrap();
    token
}

#[tokio::test]
#[ignore]
async fn test_health_check() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let response = client
        .get(&format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());
}

#[tokio::test]
#[ignore]
async fn test_table_order_lifecycle() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let customer = seed_user(&app.pool, "customer").await;
    let staff = seed_user(&app.pool, "staff").await;
    let token = seed_table(&app.pool).await;

    // Place
    let response = client
        .post(&format!("{}/orders", app.address))
        .header("x-user-id", customer.to_string())
        .json(&json!({
            "table_token": token,
            "items": [{ "menu_item_id": Uuid::new_v4(), "name": "Nachos", "unit_price": 1000, "quantity": 1 }]
        }))
        .send()
        .await
        .expect("post fail");
    assert_eq!(response.status(), 201);
    let order: Order = response.json().await.unwrap();
    assert_eq!(order.totals.tax, 50);
    assert_eq!(order.customer_id, Some(customer));

    // Kitchen flow
    for status in ["preparing", "ready", "served"] {
        let response = client
            .patch(&format!("{}/orders/{}/status", app.address, order.id))
            .header("x-user-id", staff.to_string())
            .json(&json!({ "status": status }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    // Settle
    let response = client
        .patch(&format!("{}/orders/{}/payment", app.address, order.id))
        .header("x-user-id", staff.to_string())
        .json(&json!({ "status": "paid", "method": "online" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let settled: Order = response.json().await.unwrap();
    assert_eq!(settled.status, OrderStatus::Completed);
    assert_eq!(settled.payment.status, PaymentStatus::Paid);

    // Completed orders stay completed.
    let response = client
        .patch(&format!("{}/orders/{}/cancel", app.address, order.id))
        .header("x-user-id", customer.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore]
async fn test_customers_only_see_their_own_orders() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let alice = seed_user(&app.pool, "customer").await;
    let bob = seed_user(&app.pool, "customer").await;

    let response = client
        .post(&format!("{}/orders", app.address))
        .header("x-user-id", alice.to_string())
        .json(&json!({
            "items": [{ "menu_item_id": Uuid::new_v4(), "name": "Soda", "unit_price": 250, "quantity": 2 }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let order: Order = response.json().await.unwrap();

    let response = client
        .get(&format!("{}/orders", app.address))
        .header("x-user-id", bob.to_string())
        .send()
        .await
        .unwrap();
    let page: OrderPage = response.json().await.unwrap();
    assert!(page.orders.iter().all(|o| o.customer_id == Some(bob)));

    let response = client
        .get(&format!("{}/orders/{}", app.address, order.id))
        .header("x-user-id", bob.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
}
