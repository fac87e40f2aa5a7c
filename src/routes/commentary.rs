use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use tracing::{error, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{PortfolioCommentaryResponse, PortfolioOverview};
use crate::services::{commentary_service, overview_service};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:portfolio_id/commentary", get(generate_commentary))
        .route("/:portfolio_id/commentary/overview", get(generate_overview))
}

/// The real authentication layer lives upstream; handlers only need the
/// caller's id, delivered in the x-user-id header.
fn requesting_user(headers: &HeaderMap) -> Result<Uuid, AppError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
        .ok_or(AppError::Unauthorized)
}

/// GET /api/portfolios/:portfolio_id/commentary
///
/// RAG-grounded investment commentary for every holding in the portfolio.
/// Returns one entry per holding even when individual generations fail.
async fn generate_commentary(
    Path(portfolio_id): Path<Uuid>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<PortfolioCommentaryResponse>, AppError> {
    let user_id = requesting_user(&headers)?;
    info!("GET /portfolios/{}/commentary (user={})", portfolio_id, user_id);

    let response = commentary_service::generate_portfolio_commentary(
        &state.pool,
        &state.engine,
        portfolio_id,
        user_id,
    )
    .await
    .map_err(|e| {
        error!("Failed to generate commentary for portfolio {}: {}", portfolio_id, e);
        e
    })?;

    Ok(Json(response))
}

/// GET /api/portfolios/:portfolio_id/commentary/overview
///
/// Runs the per-ticker pipeline, then a second synthesis pass producing a
/// portfolio-level narrative.
async fn generate_overview(
    Path(portfolio_id): Path<Uuid>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<PortfolioOverview>, AppError> {
    let user_id = requesting_user(&headers)?;
    info!("GET /portfolios/{}/commentary/overview (user={})", portfolio_id, user_id);

    let commentary = commentary_service::generate_portfolio_commentary(
        &state.pool,
        &state.engine,
        portfolio_id,
        user_id,
    )
    .await?;

    let overview = overview_service::generate_portfolio_overview(
        state.engine.llm(),
        commentary.portfolio_id,
        &commentary.portfolio_name,
        &commentary.commentaries,
    )
    .await
    .map_err(|e| {
        error!("Failed to synthesize overview for portfolio {}: {}", portfolio_id, e);
        e
    })?;

    Ok(Json(overview))
}
