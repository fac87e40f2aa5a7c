use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// A user-owned, named collection of holdings. Ownership is enforced at query
// time; this core never mutates portfolios.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserPortfolio {
    pub portfolio_id: uuid::Uuid,
    pub user_id: uuid::Uuid,
    pub portfolio_name: String,
    pub base_currency: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}
