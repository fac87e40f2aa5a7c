use sqlx::PgPool;
use uuid::Uuid;

use crate::models::UserPortfolio;

/// Fetch a portfolio only if it is owned by the given user. A nonexistent
/// portfolio and a portfolio owned by someone else are indistinguishable
/// here: both return `None`, so callers cannot leak which portfolios exist.
pub async fn fetch_owned(
    pool: &PgPool,
    portfolio_id: Uuid,
    user_id: Uuid,
) -> Result<Option<UserPortfolio>, sqlx::Error> {
    sqlx::query_as::<_, UserPortfolio>(
        "SELECT portfolio_id, user_id, portfolio_name, base_currency, created_at, updated_at
           FROM user_portfolio
          WHERE portfolio_id = $1
            AND user_id = $2")
        .bind(portfolio_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}
