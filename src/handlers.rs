use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ApiResult, AppJson, AppPath, AppQuery, ErrorBody, RepoError},
    models::{
        CreateOrderRequest, DiningTable, MenuItem, Order, OrderPage, OrderStatus, Role,
        UpdatePaymentRequest, UpdateStatusRequest, UserProfile,
    },
    orders::{self, OrderDraft, OrderError},
    repository::{CancelOutcome, MenuFilter, OrderFilter},
};
use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

/// How many fresh order numbers are tried before giving up on a collision.
const ORDER_NUMBER_ATTEMPTS: usize = 3;

const DEFAULT_PAGE_SIZE: u32 = 20;

// --- Query Structs ---

/// MenuQuery
///
/// Query parameters for GET /menu.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MenuQuery {
    /// Only items of this category.
    pub category: Option<String>,
    /// Only available (`true`) or unavailable (`false`) items.
    pub available: Option<bool>,
}

/// OrderQuery
///
/// Query parameters for GET /orders. `table_id` is ignored for customers.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderQuery {
    pub table_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
    /// 1-based page number (default 1).
    pub page: Option<u32>,
    /// Page size (default 20, capped by configuration).
    pub limit: Option<u32>,
}

/// Page
///
/// Normalized pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    /// Page defaults to 1, limit to 20; limit is clamped into `1..=max_limit`.
    pub fn resolve(page: Option<u32>, limit: Option<u32>, max_limit: u32) -> Self {
        let max_limit = max_limit.max(1);
        Page {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, max_limit),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        let limit = i64::from(self.limit);
        (total + limit - 1) / limit
    }
}

// --- Public Handlers ---

/// list_menu
///
/// [Public Route] Lists menu items, optionally filtered by category and availability.
#[utoipa::path(
    get,
    path = "/menu",
    params(MenuQuery),
    responses((status = 200, description = "Menu items", body = [MenuItem]))
)]
pub async fn list_menu(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<MenuQuery>,
) -> ApiResult<Json<Vec<MenuItem>>> {
    let filter = MenuFilter {
        category: query.category.filter(|c| !c.trim().is_empty()),
        available: query.available,
    };
    Ok(Json(state.repo.get_menu_items(filter).await?))
}

/// get_menu_item
///
/// [Public Route] A single menu item.
#[utoipa::path(
    get,
    path = "/menu/{id}",
    params(("id" = Uuid, Path, description = "Menu item ID")),
    responses(
        (status = 200, description = "Found", body = MenuItem),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_menu_item(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Json<MenuItem>> {
    state
        .repo
        .get_menu_item(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Menu item not found".to_string()))
}

/// resolve_table
///
/// [Public Route] Resolves the token printed on a table so a guest session can
/// attach its orders to that table.
#[utoipa::path(
    get,
    path = "/tables/{token}",
    params(("token" = String, Path, description = "Table token")),
    responses(
        (status = 200, description = "Table", body = DiningTable),
        (status = 404, description = "Unknown or inactive table", body = ErrorBody)
    )
)]
pub async fn resolve_table(
    State(state): State<AppState>,
    AppPath(token): AppPath<String>,
) -> ApiResult<Json<DiningTable>> {
    state
        .repo
        .get_table_by_token(token.trim())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Table not found".to_string()))
}

/// place_order
///
/// [Public Route, optional auth] Places a new order.
///
/// Guests may order; an authenticated customer becomes the order's customer.
/// Line items are validated, totals computed and an order number generated
/// before the order is stored with status `placed` and payment `pending`.
#[utoipa::path(
    post,
    path = "/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = Order),
        (status = 400, description = "Invalid order", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn place_order(
    auth: Option<AuthUser>,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateOrderRequest>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let table_id = match payload
        .table_token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        Some(token) => {
            let table = state
                .repo
                .get_table_by_token(token)
                .await?
                .ok_or_else(|| ApiError::Validation("Unknown table token".to_string()))?;
            Some(table.id)
        }
        None => None,
    };

    let customer_id = auth
        .as_ref()
        .filter(|user| user.role == Role::Customer)
        .map(|user| user.id);

    let now = Utc::now();
    let mut new_order = orders::build_order(OrderDraft {
        items: payload.items,
        metadata: payload.metadata,
        table_id,
        customer_id,
        tax_rate_bps: state.config.tax_rate_bps,
        now,
    })?;

    let mut attempt = 1;
    let order = loop {
        match state.repo.create_order(new_order.clone()).await {
            Ok(order) => break order,
            Err(RepoError::DuplicateOrderNumber(number)) if attempt < ORDER_NUMBER_ATTEMPTS => {
                tracing::warn!(order_number = %number, attempt, "order number collision, retrying");
                new_order.order_number = orders::generate_order_number(now);
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    };

    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        total = order.totals.total,
        items = order.items.len(),
        "order placed"
    );

    Ok((StatusCode::CREATED, Json(order)))
}

// --- Authenticated Handlers ---

/// get_me
///
/// [Authenticated Route] The identity resolved for the current request.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = UserProfile))
)]
pub async fn get_me(
    AuthUser { id, role }: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<UserProfile>> {
    let user = state
        .repo
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Unknown user".to_string()))?;

    Ok(Json(UserProfile {
        id,
        email: user.email,
        role,
    }))
}

/// list_orders
///
/// [Authenticated Route] Role-scoped, paginated order listing.
///
/// Staff and admin see every order and may filter by table and status.
/// Customers only ever see their own orders; the table filter is ignored for them.
#[utoipa::path(
    get,
    path = "/orders",
    params(OrderQuery),
    responses((status = 200, description = "A page of orders", body = OrderPage))
)]
pub async fn list_orders(
    user: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<OrderQuery>,
) -> ApiResult<Json<OrderPage>> {
    let page = Page::resolve(query.page, query.limit, state.config.max_page_size);

    let filter = if user.is_staff() {
        OrderFilter {
            customer_id: None,
            table_id: query.table_id,
            status: query.status,
            limit: page.limit,
            offset: page.offset(),
        }
    } else {
        OrderFilter {
            customer_id: Some(user.id),
            table_id: None,
            status: query.status,
            limit: page.limit,
            offset: page.offset(),
        }
    };

    let (orders, total) = state.repo.list_orders(filter).await?;

    Ok(Json(OrderPage {
        orders,
        page: page.page,
        limit: page.limit,
        total,
        total_pages: page.total_pages(total),
    }))
}

/// get_order
///
/// [Authenticated Route] A single order. Customers may only fetch their own.
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Found", body = Order),
        (status = 403, description = "Not your order", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_order(
    user: AuthUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Json<Order>> {
    let order = find_visible_order(&state, &user, id).await?;
    Ok(Json(order))
}

/// cancel_order
///
/// [Authenticated Route] Cancels an order that is not yet completed or canceled.
///
/// The status precondition is checked by the repository's conditional update, so
/// a concurrent completion cannot be overwritten.
#[utoipa::path(
    patch,
    path = "/orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Canceled", body = Order),
        (status = 400, description = "Already completed or canceled", body = ErrorBody),
        (status = 403, description = "Not your order", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn cancel_order(
    user: AuthUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Json<Order>> {
    // Distinguishes 403 from 404 before the guarded update.
    find_visible_order(&state, &user, id).await?;

    let owner = if user.is_staff() { None } else { Some(user.id) };

    match state.repo.cancel_order(id, owner).await? {
        CancelOutcome::Canceled(order) => {
            tracing::info!(order_id = %order.id, canceled_by = %user.id, "order canceled");
            Ok(Json(order))
        }
        CancelOutcome::Terminal(status) => Err(OrderError::NotCancelable(status).into()),
        CancelOutcome::NotFound => Err(ApiError::NotFound("Order not found".to_string())),
    }
}

// --- Staff Handlers ---

/// update_order_status
///
/// [Staff Route] Moves an order to another status. Totals are left untouched.
#[utoipa::path(
    patch,
    path = "/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Updated", body = Order),
        (status = 400, description = "Unknown status", body = ErrorBody),
        (status = 403, description = "Not staff", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_order_status(
    user: AuthUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateStatusRequest>,
) -> ApiResult<Json<Order>> {
    user.require_staff()?;

    let order = state
        .repo
        .set_order_status(id, payload.status)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;

    tracing::info!(order_id = %order.id, status = %order.status, staff_id = %user.id, "order status updated");
    Ok(Json(order))
}

/// update_payment
///
/// [Staff Route] Records a payment state change. A `paid` payment on a `served`
/// order completes the order in the same update.
#[utoipa::path(
    patch,
    path = "/orders/{id}/payment",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdatePaymentRequest,
    responses(
        (status = 200, description = "Updated", body = Order),
        (status = 400, description = "Unknown payment status or method", body = ErrorBody),
        (status = 403, description = "Not staff", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_payment(
    user: AuthUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdatePaymentRequest>,
) -> ApiResult<Json<Order>> {
    user.require_staff()?;

    let order = state
        .repo
        .update_payment(id, payload.status, payload.method)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;

    tracing::info!(
        order_id = %order.id,
        payment_status = %order.payment.status,
        status = %order.status,
        staff_id = %user.id,
        "order payment updated"
    );
    Ok(Json(order))
}

/// Loads an order and applies the visibility rule: staff see everything,
/// customers only orders placed under their own account.
async fn find_visible_order(state: &AppState, user: &AuthUser, id: Uuid) -> ApiResult<Order> {
    let order = state
        .repo
        .get_order(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;

    if !user.is_staff() && order.customer_id != Some(user.id) {
        return Err(ApiError::Forbidden(
            "Not authorized to access this order".to_string(),
        ));
    }
    Ok(order)
}
