use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{
    AppState, assess_fine, create_book, create_borrowing, get_book, get_borrowing, list_books,
    list_borrowings, payment_cancel, payment_success, return_borrowing, stripe_webhook,
    update_book,
};

/// APIルーターを作成する
///
/// Catalog:
/// - GET /books, POST /books
/// - GET /books/:id, PUT /books/:id
///
/// Borrowings:
/// - POST /borrowings, GET /borrowings
/// - GET /borrowings/:id
/// - POST /borrowings/:id/return
/// - POST /borrowings/:id/fine
///
/// Payments:
/// - POST /payments/webhook
/// - GET /payments/success, GET /payments/cancel
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        .route("/books", get(list_books).post(create_book))
        .route("/books/:id", get(get_book).put(update_book))
        .route("/borrowings", get(list_borrowings).post(create_borrowing))
        .route("/borrowings/:id", get(get_borrowing))
        .route("/borrowings/:id/return", post(return_borrowing))
        .route("/borrowings/:id/fine", post(assess_fine))
        .route("/payments/webhook", post(stripe_webhook))
        .route("/payments/success", get(payment_success))
        .route("/payments/cancel", get(payment_cancel))
        // Add tracing middleware
        .layer(TraceLayer::new_for_http())
        // Add application state
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
