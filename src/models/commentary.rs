use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Terminal state of the per-ticker pipeline. External-service failure is an
/// expected outcome here, not an exception: every variant maps to exactly one
/// `TickerCommentary` entry in the response.
#[derive(Debug, Clone, PartialEq)]
pub enum TickerOutcome {
    Done {
        commentary: String,
        dominant_year: i32,
        chunks_used: usize,
    },
    NoData,
    Failed {
        message: String,
    },
}

/// Commentary generated for a single holding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerCommentary {
    pub ticker_id: String,
    pub company_name: String,
    pub sector: String,
    pub commentary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filing_year: Option<i32>,
    pub chunks_used: i32,
}

impl TickerCommentary {
    /// Collapse a pipeline outcome into the response entry for one holding.
    pub fn from_outcome(
        ticker_id: String,
        company_name: String,
        sector: String,
        outcome: TickerOutcome,
    ) -> Self {
        match outcome {
            TickerOutcome::Done { commentary, dominant_year, chunks_used } => Self {
                ticker_id,
                company_name,
                sector,
                commentary,
                filing_year: Some(dominant_year),
                chunks_used: chunks_used as i32,
            },
            TickerOutcome::NoData => Self {
                ticker_id,
                company_name,
                sector,
                commentary: "No SEC filing data available for this ticker.".to_string(),
                filing_year: None,
                chunks_used: 0,
            },
            TickerOutcome::Failed { message } => Self {
                ticker_id,
                company_name,
                sector,
                commentary: format!("Commentary could not be generated: {}", message),
                filing_year: None,
                chunks_used: 0,
            },
        }
    }
}

/// Response for the whole portfolio: one commentary per holding, in holdings
/// order, even when individual generations fail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioCommentaryResponse {
    pub portfolio_id: Uuid,
    pub portfolio_name: String,
    pub commentaries: Vec<TickerCommentary>,
    pub generated_at: DateTime<Utc>,
}

/// Second-pass synthesis across all per-ticker commentaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioOverview {
    pub portfolio_id: Uuid,
    pub portfolio_name: String,
    pub overview: String,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_done_outcome_carries_year_and_chunk_count() {
        let commentary = TickerCommentary::from_outcome(
            "AAPL".to_string(),
            "Apple Inc.".to_string(),
            "Technology".to_string(),
            TickerOutcome::Done {
                commentary: "Solid quarter.".to_string(),
                dominant_year: 2023,
                chunks_used: 5,
            },
        );
        assert_eq!(commentary.filing_year, Some(2023));
        assert_eq!(commentary.chunks_used, 5);
        assert_eq!(commentary.commentary, "Solid quarter.");
    }

    #[test]
    fn test_no_data_outcome_reports_unavailability() {
        let commentary = TickerCommentary::from_outcome(
            "ZZZZ".to_string(),
            "ZZZZ".to_string(),
            "Unknown".to_string(),
            TickerOutcome::NoData,
        );
        assert_eq!(commentary.chunks_used, 0);
        assert_eq!(commentary.filing_year, None);
        assert!(commentary.commentary.contains("No SEC filing data available"));
    }

    #[test]
    fn test_failed_outcome_embeds_error_message() {
        let commentary = TickerCommentary::from_outcome(
            "MSFT".to_string(),
            "Microsoft".to_string(),
            "Technology".to_string(),
            TickerOutcome::Failed { message: "request timed out".to_string() },
        );
        assert_eq!(commentary.chunks_used, 0);
        assert!(commentary.commentary.starts_with("Commentary could not be generated:"));
        assert!(commentary.commentary.contains("request timed out"));
    }
}
