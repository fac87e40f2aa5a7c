use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Company metadata for a ticker. All descriptive columns are nullable in the
/// dimension table; callers fall back to the ticker symbol and "Unknown"
/// sector when metadata is missing.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TickerInfo {
    pub ticker_id: String,
    pub company_name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub currency: Option<String>,
}
