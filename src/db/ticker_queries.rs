use sqlx::PgPool;

use crate::models::TickerInfo;

pub async fn fetch_one(
    pool: &PgPool,
    ticker_id: &str,
) -> Result<Option<TickerInfo>, sqlx::Error> {
    sqlx::query_as::<_, TickerInfo>(
        "SELECT ticker_id, company_name, sector, industry, currency
           FROM dim_ticker
          WHERE ticker_id = $1")
        .bind(ticker_id)
        .fetch_optional(pool)
        .await
}
