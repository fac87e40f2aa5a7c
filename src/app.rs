use axum::Router;
use tower_http::cors::CorsLayer;

use crate::routes::{commentary, health};
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    Router::<AppState>::new()
        .nest("/health", health::router())
        .nest("/api/portfolios", commentary::router())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
