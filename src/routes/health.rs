use axum::routing::get;
use axum::Router;
use http::StatusCode;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
