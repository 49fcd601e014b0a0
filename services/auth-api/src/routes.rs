//! Router

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/login", get(handlers::login))
        .route("/callback", get(handlers::callback))
        .route("/refresh", post(handlers::refresh))
        .route("/logout", get(handlers::logout).post(handlers::logout))
        .route("/me", get(handlers::me))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
