use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch},
};

/// Authenticated Router Module
///
/// Routes for any signed-in user. Visibility is role-scoped inside the handlers:
/// customers only reach their own orders, staff and admin reach all of them.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        .route("/me", get(handlers::get_me))
        // GET /orders?table_id=...&status=...&page=...&limit=...
        .route("/orders", get(handlers::list_orders))
        // GET /orders/{id}
        .route("/orders/{id}", get(handlers::get_order))
        // PATCH /orders/{id}/cancel
        // Conditional update: refused once the order is completed or canceled.
        .route("/orders/{id}/cancel", patch(handlers::cancel_order))
}
