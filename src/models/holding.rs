use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A position held in a portfolio, keyed by (portfolio_id, ticker_id).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PortfolioHolding {
    pub portfolio_id: uuid::Uuid,
    pub ticker_id: String,
    pub quantity: BigDecimal,
    pub cash_balance: Option<BigDecimal>,
    pub notes: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}
