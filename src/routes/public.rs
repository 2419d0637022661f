use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without credentials. Placing an order accepts an optional
/// identity: guests order anonymously (optionally attributed to a table through
/// its token), authenticated customers get the order linked to their account.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers and monitoring.
        .route("/health", get(|| async { "ok" }))
        // GET /menu?category=...&available=...
        .route("/menu", get(handlers::list_menu))
        // GET /menu/{id}
        .route("/menu/{id}", get(handlers::get_menu_item))
        // GET /tables/{token}
        // Lets a guest session resolve the table it is sitting at.
        .route("/tables/{token}", get(handlers::resolve_table))
        // POST /orders
        .route("/orders", post(handlers::place_order))
}
