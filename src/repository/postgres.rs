use async_trait::async_trait;
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder, types::Json};
use uuid::Uuid;

use super::{CancelOutcome, MenuFilter, OrderFilter, RepoResult, Repository};
use crate::{
    error::RepoError,
    models::{
        DiningTable, MenuItem, NewOrder, Order, OrderRow, OrderStatus, PaymentMethod,
        PaymentStatus, User,
    },
};

const ORDER_COLUMNS: &str = "id, order_number, table_id, customer_id, items, subtotal, tax, total, \
     status, payment_status, payment_method, paid_at, refunded_at, metadata, created_at, updated_at";

const MENU_COLUMNS: &str =
    "id, name, description, category, price, is_available, image_url, created_at";

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decode(row: OrderRow) -> RepoResult<Order> {
    Order::try_from(row).map_err(|e| RepoError::Decode(e.to_string()))
}

fn decode_opt(row: Option<OrderRow>) -> RepoResult<Option<Order>> {
    row.map(decode).transpose()
}

/// Appends the WHERE clause shared by the page query and the count query.
fn push_order_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    builder.push(" WHERE TRUE");
    if let Some(customer_id) = filter.customer_id {
        builder.push(" AND customer_id = ");
        builder.push_bind(customer_id);
    }
    if let Some(table_id) = filter.table_id {
        builder.push(" AND table_id = ");
        builder.push_bind(table_id);
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ");
        builder.push_bind(status.as_str());
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT id, email, role FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// get_menu_items
    ///
    /// Optional category and availability filters, built with QueryBuilder so every
    /// value is bound rather than interpolated.
    async fn get_menu_items(&self, filter: MenuFilter) -> RepoResult<Vec<MenuItem>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {MENU_COLUMNS} FROM menu_items WHERE TRUE"));

        if let Some(category) = filter.category {
            builder.push(" AND category = ");
            builder.push_bind(category);
        }
        if let Some(available) = filter.available {
            builder.push(" AND is_available = ");
            builder.push_bind(available);
        }
        builder.push(" ORDER BY category ASC, name ASC");

        let items = builder
            .build_query_as::<MenuItem>()
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    async fn get_menu_item(&self, id: Uuid) -> RepoResult<Option<MenuItem>> {
        let item = sqlx::query_as::<_, MenuItem>(&format!(
            "SELECT {MENU_COLUMNS} FROM menu_items WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    async fn get_table_by_token(&self, token: &str) -> RepoResult<Option<DiningTable>> {
        let table = sqlx::query_as::<_, DiningTable>(
            "SELECT id, label, seats, token, is_active FROM dining_tables WHERE token = $1 AND is_active = TRUE",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(table)
    }

    /// create_order
    ///
    /// Inserts the validated order with status `placed` and payment `pending`.
    /// A unique violation is reported as `DuplicateOrderNumber` so the caller can
    /// retry with a fresh number.
    async fn create_order(&self, order: NewOrder) -> RepoResult<Order> {
        let sql = format!(
            r#"
            INSERT INTO orders (
                id, order_number, table_id, customer_id, items, subtotal, tax, total,
                status, payment_status, metadata, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'placed', 'pending', $9, $10, $10)
            RETURNING {ORDER_COLUMNS}
            "#
        );

        let result = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(order.id)
            .bind(&order.order_number)
            .bind(order.table_id)
            .bind(order.customer_id)
            .bind(Json(&order.items))
            .bind(order.totals.subtotal)
            .bind(order.totals.tax)
            .bind(order.totals.total)
            .bind(&order.metadata)
            .bind(order.created_at)
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(row) => decode(row),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(RepoError::DuplicateOrderNumber(order.order_number.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_order(&self, id: Uuid) -> RepoResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        decode_opt(row)
    }

    /// list_orders
    ///
    /// Runs the count and the page query with identical filters.
    async fn list_orders(&self, filter: OrderFilter) -> RepoResult<(Vec<Order>, i64)> {
        let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM orders");
        push_order_filters(&mut count, &filter);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut page: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {ORDER_COLUMNS} FROM orders"));
        push_order_filters(&mut page, &filter);
        page.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        page.push_bind(i64::from(filter.limit));
        page.push(" OFFSET ");
        page.push_bind(i64::try_from(filter.offset).unwrap_or(i64::MAX));

        let rows = page
            .build_query_as::<OrderRow>()
            .fetch_all(&self.pool)
            .await?;
        let orders = rows.into_iter().map(decode).collect::<RepoResult<Vec<_>>>()?;

        Ok((orders, total))
    }

    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> RepoResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;
        decode_opt(row)
    }

    /// update_payment
    ///
    /// One statement: sets the payment fields and promotes a `served` order to
    /// `completed` when the payment becomes `paid`.
    async fn update_payment(
        &self,
        id: Uuid,
        status: PaymentStatus,
        method: Option<PaymentMethod>,
    ) -> RepoResult<Option<Order>> {
        let sql = format!(
            r#"
            UPDATE orders
            SET payment_status = $2,
                payment_method = COALESCE($3, payment_method),
                paid_at = CASE WHEN $2 = 'paid' THEN NOW() ELSE paid_at END,
                refunded_at = CASE WHEN $2 = 'refunded' THEN NOW() ELSE refunded_at END,
                status = CASE WHEN $2 = 'paid' AND status = 'served' THEN 'completed' ELSE status END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .bind(status.as_str())
            .bind(method.map(|m| m.as_str()))
            .fetch_optional(&self.pool)
            .await?;
        decode_opt(row)
    }

    /// cancel_order
    ///
    /// Conditional update guarded by the status precondition. When nothing was
    /// updated, a follow-up read tells a terminal order apart from a missing one.
    async fn cancel_order(&self, id: Uuid, owner: Option<Uuid>) -> RepoResult<CancelOutcome> {
        let sql = format!(
            r#"
            UPDATE orders
            SET status = 'canceled', updated_at = NOW()
            WHERE id = $1
              AND status NOT IN ('completed', 'canceled')
              AND ($2::uuid IS NULL OR customer_id = $2)
            RETURNING {ORDER_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = row {
            return Ok(CancelOutcome::Canceled(decode(row)?));
        }

        let status: Option<String> = sqlx::query_scalar(
            "SELECT status FROM orders WHERE id = $1 AND ($2::uuid IS NULL OR customer_id = $2)",
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        match status {
            Some(raw) => {
                let status = raw
                    .parse::<OrderStatus>()
                    .map_err(|e| RepoError::Decode(e.to_string()))?;
                Ok(CancelOutcome::Terminal(status))
            }
            None => Ok(CancelOutcome::NotFound),
        }
    }
}
