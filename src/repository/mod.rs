use crate::{
    error::RepoError,
    models::{DiningTable, MenuItem, NewOrder, Order, OrderStatus, PaymentMethod, PaymentStatus, User},
};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

pub type RepoResult<T> = Result<T, RepoError>;

/// OrderFilter
///
/// Scope and page of an order listing. `customer_id` is set for customers so they
/// only ever see their own orders.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub customer_id: Option<Uuid>,
    pub table_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
    pub limit: u32,
    pub offset: u64,
}

/// MenuFilter
#[derive(Debug, Clone, Default)]
pub struct MenuFilter {
    pub category: Option<String>,
    pub available: Option<bool>,
}

/// Result of the conditional cancel update.
#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    Canceled(Order),
    /// The order exists but is already completed or canceled.
    Terminal(OrderStatus),
    NotFound,
}

/// Repository Trait
///
/// Abstract contract for all persistence operations. Handlers only ever see
/// `Arc<dyn Repository>`, so the Postgres store and the in-memory store are
/// interchangeable.
///
/// Status, payment and cancel updates must each be a single atomic step: the
/// payment auto-promotion and the cancel precondition are evaluated against the
/// stored row, not against a value read earlier by the handler.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Identity ---
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;

    // --- Menu & Tables (read-only) ---
    async fn get_menu_items(&self, filter: MenuFilter) -> RepoResult<Vec<MenuItem>>;
    async fn get_menu_item(&self, id: Uuid) -> RepoResult<Option<MenuItem>>;
    // Only active tables resolve.
    async fn get_table_by_token(&self, token: &str) -> RepoResult<Option<DiningTable>>;

    // --- Orders ---
    // Fails with `RepoError::DuplicateOrderNumber` when the number is taken.
    async fn create_order(&self, order: NewOrder) -> RepoResult<Order>;
    async fn get_order(&self, id: Uuid) -> RepoResult<Option<Order>>;
    // Returns the requested page, newest first, and the total number of matches.
    async fn list_orders(&self, filter: OrderFilter) -> RepoResult<(Vec<Order>, i64)>;
    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> RepoResult<Option<Order>>;
    async fn update_payment(
        &self,
        id: Uuid,
        status: PaymentStatus,
        method: Option<PaymentMethod>,
    ) -> RepoResult<Option<Order>>;
    // `owner` restricts the update to orders of that customer.
    async fn cancel_order(&self, id: Uuid, owner: Option<Uuid>) -> RepoResult<CancelOutcome>;
}

/// RepositoryState
///
/// The shared handle to the persistence layer stored in `AppState`.
pub type RepositoryState = Arc<dyn Repository>;
