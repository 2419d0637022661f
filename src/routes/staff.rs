use crate::{AppState, handlers};
use axum::{Router, routing::patch};

/// Staff Router Module
///
/// Order lifecycle mutations. The router sits behind the authentication layer;
/// each handler additionally rejects customers with 403.
pub fn staff_routes() -> Router<AppState> {
    Router::new()
        // PATCH /orders/{id}/status
        .route("/orders/{id}/status", patch(handlers::update_order_status))
        // PATCH /orders/{id}/payment
        // Marking a served order as paid completes it.
        .route("/orders/{id}/payment", patch(handlers::update_payment))
}
