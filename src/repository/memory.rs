use async_trait::async_trait;
use chrono::Utc;
use std::sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, Ordering},
};
use uuid::Uuid;

use super::{CancelOutcome, MenuFilter, OrderFilter, RepoResult, Repository};
use crate::{
    error::RepoError,
    models::{
        DiningTable, MenuItem, NewOrder, Order, OrderStatus, PaymentMethod, PaymentStatus, User,
    },
    orders,
};

/// InMemoryRepository
///
/// A `Repository` kept entirely in process memory, used by the handler and
/// router tests. Each operation holds a single lock for its whole duration, which
/// gives it the same atomicity as the single-statement SQL updates.
#[derive(Default)]
pub struct InMemoryRepository {
    users: Mutex<Vec<User>>,
    menu: Mutex<Vec<MenuItem>>,
    tables: Mutex<Vec<DiningTable>>,
    orders: Mutex<Vec<Order>>,
    /// When true, every operation fails like an unreachable database.
    failing: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// A repository whose every call returns a database error.
    pub fn new_failing() -> Self {
        let repo = Self::default();
        repo.failing.store(true, Ordering::SeqCst);
        repo
    }

    pub fn insert_user(&self, user: User) {
        lock(&self.users).push(user);
    }

    pub fn insert_menu_item(&self, item: MenuItem) {
        lock(&self.menu).push(item);
    }

    pub fn insert_table(&self, table: DiningTable) {
        lock(&self.tables).push(table);
    }

    /// Stores an order as-is, bypassing creation rules. Useful to seed arbitrary states.
    pub fn insert_order(&self, order: Order) {
        lock(&self.orders).push(order);
    }

    /// Synchronous read of a stored order, for assertions.
    pub fn get_order_snapshot(&self, id: Uuid) -> Option<Order> {
        lock(&self.orders).iter().find(|o| o.id == id).cloned()
    }

    fn check(&self) -> RepoResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepoError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

fn matches_filter(order: &Order, filter: &OrderFilter) -> bool {
    filter.customer_id.is_none_or(|c| order.customer_id == Some(c))
        && filter.table_id.is_none_or(|t| order.table_id == Some(t))
        && filter.status.is_none_or(|s| order.status == s)
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        self.check()?;
        Ok(lock(&self.users).iter().find(|u| u.id == id).cloned())
    }

    async fn get_menu_items(&self, filter: MenuFilter) -> RepoResult<Vec<MenuItem>> {
        self.check()?;
        let mut items: Vec<MenuItem> = lock(&self.menu)
            .iter()
            .filter(|item| {
                filter.category.as_deref().is_none_or(|c| item.category == c)
                    && filter.available.is_none_or(|a| item.is_available == a)
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.name.cmp(&b.name)));
        Ok(items)
    }

    async fn get_menu_item(&self, id: Uuid) -> RepoResult<Option<MenuItem>> {
        self.check()?;
        Ok(lock(&self.menu).iter().find(|item| item.id == id).cloned())
    }

    async fn get_table_by_token(&self, token: &str) -> RepoResult<Option<DiningTable>> {
        self.check()?;
        Ok(lock(&self.tables)
            .iter()
            .find(|t| t.is_active && t.token == token)
            .cloned())
    }

    async fn create_order(&self, order: NewOrder) -> RepoResult<Order> {
        self.check()?;
        let mut orders = lock(&self.orders);
        if orders.iter().any(|o| o.order_number == order.order_number) {
            return Err(RepoError::DuplicateOrderNumber(order.order_number));
        }
        let order = order.into_order();
        orders.push(order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: Uuid) -> RepoResult<Option<Order>> {
        self.check()?;
        Ok(lock(&self.orders).iter().find(|o| o.id == id).cloned())
    }

    async fn list_orders(&self, filter: OrderFilter) -> RepoResult<(Vec<Order>, i64)> {
        self.check()?;
        let mut matching: Vec<Order> = lock(&self.orders)
            .iter()
            .filter(|o| matches_filter(o, &filter))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        let total = matching.len() as i64;
        let offset = usize::try_from(filter.offset).unwrap_or(usize::MAX);
        let page = matching
            .into_iter()
            .skip(offset)
            .take(filter.limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> RepoResult<Option<Order>> {
        self.check()?;
        let mut orders = lock(&self.orders);
        Ok(orders.iter_mut().find(|o| o.id == id).map(|order| {
            order.status = status;
            order.updated_at = Utc::now();
            order.clone()
        }))
    }

    async fn update_payment(
        &self,
        id: Uuid,
        status: PaymentStatus,
        method: Option<PaymentMethod>,
    ) -> RepoResult<Option<Order>> {
        self.check()?;
        let mut orders = lock(&self.orders);
        Ok(orders.iter_mut().find(|o| o.id == id).map(|order| {
            orders::apply_payment(order, status, method, Utc::now());
            order.clone()
        }))
    }

    async fn cancel_order(&self, id: Uuid, owner: Option<Uuid>) -> RepoResult<CancelOutcome> {
        self.check()?;
        let mut orders = lock(&self.orders);
        let Some(order) = orders
            .iter_mut()
            .find(|o| o.id == id && owner.is_none_or(|c| o.customer_id == Some(c)))
        else {
            return Ok(CancelOutcome::NotFound);
        };

        match orders::cancel(order, Utc::now()) {
            Ok(()) => Ok(CancelOutcome::Canceled(order.clone())),
            Err(_) => Ok(CancelOutcome::Terminal(order.status)),
        }
    }
}
