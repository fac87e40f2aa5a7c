use sqlx::PgPool;
use uuid::Uuid;

use crate::models::PortfolioHolding;

/// Fetch every holding in a portfolio. Commentary entries must come back in
/// holdings order, so the ordering here is explicit and stable.
pub async fn fetch_by_portfolio(
    pool: &PgPool,
    portfolio_id: Uuid,
) -> Result<Vec<PortfolioHolding>, sqlx::Error> {
    sqlx::query_as::<_, PortfolioHolding>(
        "SELECT portfolio_id, ticker_id, quantity, cash_balance, notes, created_at, updated_at
           FROM portfolio_holding
          WHERE portfolio_id = $1
          ORDER BY created_at, ticker_id")
        .bind(portfolio_id)
        .fetch_all(pool)
        .await
}
