//! Route modules for the fill server

pub mod health;
pub mod sessions;

use axum::Router;

use crate::state::AppState;

/// Every route, without transport layers
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest("/api/v1/health", health::router())
        .nest("/api/v1/sessions", sessions::router())
        .with_state(state)
}
