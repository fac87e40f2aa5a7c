use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{PortfolioOverview, TickerCommentary};
use crate::services::llm_service::LlmProvider;
use crate::services::prompts;

/// Synthesize a holistic portfolio-level narrative from the per-ticker
/// commentaries. Runs after and independent of the per-ticker loop; a
/// failure here only fails the overview request, never the commentaries.
pub async fn generate_portfolio_overview(
    llm: Arc<dyn LlmProvider>,
    portfolio_id: Uuid,
    portfolio_name: &str,
    commentaries: &[TickerCommentary],
) -> Result<PortfolioOverview, AppError> {
    info!(
        "Synthesizing overview for portfolio {} from {} commentaries",
        portfolio_id,
        commentaries.len()
    );

    let combined = join_commentaries(commentaries);
    let system_prompt = prompts::overview_system_prompt();
    let user_prompt = prompts::overview_user_prompt(portfolio_name, &combined);

    let overview = llm.generate(&system_prompt, &user_prompt).await?;

    Ok(PortfolioOverview {
        portfolio_id,
        portfolio_name: portfolio_name.to_string(),
        overview,
        generated_at: Utc::now(),
    })
}

/// One labelled block per position so the strategist prompt can attribute
/// themes to tickers.
fn join_commentaries(commentaries: &[TickerCommentary]) -> String {
    commentaries
        .iter()
        .map(|c| format!("## {} ({})\n{}", c.ticker_id, c.sector, c.commentary))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commentary(ticker: &str, sector: &str, text: &str) -> TickerCommentary {
        TickerCommentary {
            ticker_id: ticker.to_string(),
            company_name: ticker.to_string(),
            sector: sector.to_string(),
            commentary: text.to_string(),
            filing_year: Some(2023),
            chunks_used: 5,
        }
    }

    #[test]
    fn test_join_labels_each_position() {
        let commentaries = vec![
            commentary("AAPL", "Technology", "Strong margins."),
            commentary("XOM", "Energy", "Commodity exposure."),
        ];
        let combined = join_commentaries(&commentaries);
        assert!(combined.contains("## AAPL (Technology)\nStrong margins."));
        assert!(combined.contains("## XOM (Energy)\nCommodity exposure."));

        let first = combined.find("AAPL").unwrap();
        let second = combined.find("XOM").unwrap();
        assert!(first < second);
    }
}
