use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use sqlx::PgPool;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db;
use crate::errors::{AppError, RetrievalError};
use crate::external::filing_store::FilingChunkStore;
use crate::models::{
    FilingChunk, PortfolioCommentaryResponse, TickerCommentary, TickerInfo, TickerOutcome,
    UserPortfolio,
};
use crate::services::llm_service::LlmProvider;
use crate::services::prompts;

/// The query embedded and sent to the vector DB for similarity search.
/// Intentionally broad so that it surfaces the most relevant excerpts
/// across Items 1A, 3, 7 and 7A.
const ANALYSIS_QUERY: &str =
    "financial performance revenue growth profitability risk factors \
     legal proceedings regulatory concerns market risk interest rate \
     foreign exchange commodity exposure management discussion analysis";

#[derive(Debug, Clone)]
pub struct CommentaryConfig {
    /// Maximum chunks retrieved per ticker
    pub max_chunks: i64,
    /// Worker pool size for the per-holding fan-out, sized to respect
    /// external-service rate limits
    pub max_concurrency: usize,
    /// Deadline for one ticker's retrieve-then-generate round trip
    pub ticker_timeout_secs: u64,
}

impl Default for CommentaryConfig {
    fn default() -> Self {
        Self {
            max_chunks: 15,
            max_concurrency: 4,
            ticker_timeout_secs: 60,
        }
    }
}

impl CommentaryConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_chunks: std::env::var("COMMENTARY_MAX_CHUNKS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_chunks),
            max_concurrency: std::env::var("COMMENTARY_MAX_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_concurrency),
            ticker_timeout_secs: std::env::var("COMMENTARY_TICKER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.ticker_timeout_secs),
        }
    }
}

/// Identity and company metadata for one holding, resolved ahead of the
/// fan-out so the pipeline itself needs no database access.
#[derive(Debug, Clone)]
pub struct HoldingContext {
    pub ticker_id: String,
    pub company_name: String,
    pub sector: String,
}

impl HoldingContext {
    /// Metadata lookup is best-effort: a missing row (or NULL columns) falls
    /// back to the ticker symbol and "Unknown" sector.
    pub fn resolve(ticker_id: String, info: Option<TickerInfo>) -> Self {
        let (company_name, sector) = match info {
            Some(info) => (
                info.company_name.unwrap_or_else(|| ticker_id.clone()),
                info.sector.unwrap_or_else(|| "Unknown".to_string()),
            ),
            None => (ticker_id.clone(), "Unknown".to_string()),
        };
        Self { ticker_id, company_name, sector }
    }
}

/// Drives the per-ticker RAG pipeline: embed the analysis query, retrieve
/// filing chunks scoped to the ticker, assemble grounding context, and
/// generate commentary. All clients are shared and stateless; the engine is
/// freely usable from concurrent tasks.
pub struct CommentaryEngine {
    llm: Arc<dyn LlmProvider>,
    chunk_store: Arc<dyn FilingChunkStore>,
    config: CommentaryConfig,
}

impl CommentaryEngine {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        chunk_store: Arc<dyn FilingChunkStore>,
        config: CommentaryConfig,
    ) -> Self {
        Self { llm, chunk_store, config }
    }

    pub fn llm(&self) -> Arc<dyn LlmProvider> {
        self.llm.clone()
    }

    /// Retrieve the most relevant filing chunks for a ticker, optionally
    /// filtered to a specific filing year. Zero matches is "no data", not an
    /// error; the caller decides what that means.
    pub async fn retrieve_chunks(
        &self,
        ticker: &str,
        filing_year: Option<i32>,
    ) -> Result<Vec<FilingChunk>, RetrievalError> {
        let query_vector = self.llm.embed(ANALYSIS_QUERY).await?;
        let chunks = self
            .chunk_store
            .search_chunks(ticker, &query_vector, filing_year, self.config.max_chunks)
            .await?;
        Ok(chunks)
    }

    /// One holding's pipeline under the configured deadline. Never fails:
    /// retrieval errors, generation errors, and timeouts all degrade to a
    /// placeholder commentary so a single ticker cannot poison the batch.
    pub async fn generate_for_holding(&self, ctx: &HoldingContext) -> TickerCommentary {
        let deadline = Duration::from_secs(self.config.ticker_timeout_secs);
        let outcome = match tokio::time::timeout(deadline, self.run_pipeline(ctx)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                error!("Commentary for ticker={} exceeded {:?} deadline", ctx.ticker_id, deadline);
                TickerOutcome::Failed {
                    message: format!("timed out after {}s", self.config.ticker_timeout_secs),
                }
            }
        };

        TickerCommentary::from_outcome(
            ctx.ticker_id.clone(),
            ctx.company_name.clone(),
            ctx.sector.clone(),
            outcome,
        )
    }

    /// RETRIEVE -> (empty => NoData; non-empty => assemble) -> GENERATE ->
    /// (error => Failed; success => Done)
    async fn run_pipeline(&self, ctx: &HoldingContext) -> TickerOutcome {
        let chunks = match self.retrieve_chunks(&ctx.ticker_id, None).await {
            Ok(chunks) => chunks,
            Err(e) => {
                error!("Retrieval failed for ticker={}: {}", ctx.ticker_id, e);
                return TickerOutcome::Failed { message: e.to_string() };
            }
        };

        if chunks.is_empty() {
            warn!("No SEC filing data found for ticker={}", ctx.ticker_id);
            return TickerOutcome::NoData;
        }

        let context = prompts::format_chunks_as_context(&chunks);
        let dominant_year = dominant_filing_year(&chunks).unwrap_or_default();

        let system_prompt = prompts::commentary_system_prompt();
        let user_prompt = prompts::commentary_user_prompt(
            &ctx.ticker_id,
            &ctx.company_name,
            &ctx.sector,
            &context,
        );

        match self.llm.generate(&system_prompt, &user_prompt).await {
            Ok(text) => TickerOutcome::Done {
                commentary: text,
                dominant_year,
                chunks_used: chunks.len(),
            },
            Err(e) => {
                error!("Generation failed for ticker={}: {}", ctx.ticker_id, e);
                TickerOutcome::Failed { message: e.to_string() }
            }
        }
    }

    /// Fan out one task per holding onto a semaphore-bounded pool and collect
    /// results into a slot array indexed by holding position, so the output
    /// order always matches holdings order regardless of completion order.
    pub async fn generate_all(&self, contexts: &[HoldingContext]) -> Vec<TickerCommentary> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));

        let tasks: Vec<_> = contexts
            .iter()
            .enumerate()
            .map(|(position, ctx)| {
                let semaphore = semaphore.clone();
                async move {
                    let _permit = semaphore.acquire().await.expect("semaphore never closed");
                    (position, self.generate_for_holding(ctx).await)
                }
            })
            .collect();

        let mut slots: Vec<Option<TickerCommentary>> = vec![None; contexts.len()];
        for (position, commentary) in join_all(tasks).await {
            slots[position] = Some(commentary);
        }

        slots
            .into_iter()
            .map(|slot| slot.expect("every slot filled by the fan-out"))
            .collect()
    }
}

/// The most frequent filing year among the retrieved chunks. Ties resolve to
/// the most recent year so the result is deterministic.
pub fn dominant_filing_year(chunks: &[FilingChunk]) -> Option<i32> {
    let mut counts: HashMap<i32, usize> = HashMap::new();
    for chunk in chunks {
        *counts.entry(chunk.filing_year).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by_key(|&(year, count)| (count, year))
        .map(|(year, _)| year)
}

/// Nonexistence and unauthorized access collapse into the same "not found"
/// so callers cannot probe which portfolio ids exist.
fn require_owned(portfolio: Option<UserPortfolio>) -> Result<UserPortfolio, AppError> {
    portfolio.ok_or(AppError::NotFound)
}

/// Generate investment commentary for every ticker held in the given
/// portfolio. One commentary per holding, in holdings order, always.
pub async fn generate_portfolio_commentary(
    pool: &PgPool,
    engine: &CommentaryEngine,
    portfolio_id: Uuid,
    user_id: Uuid,
) -> Result<PortfolioCommentaryResponse, AppError> {
    info!("Generating commentary for portfolio {} (user={})", portfolio_id, user_id);

    let portfolio =
        require_owned(db::portfolio_queries::fetch_owned(pool, portfolio_id, user_id).await?)?;

    let holdings = db::holding_queries::fetch_by_portfolio(pool, portfolio_id).await?;
    if holdings.is_empty() {
        warn!("Portfolio {} has no holdings", portfolio_id);
        return Ok(PortfolioCommentaryResponse {
            portfolio_id,
            portfolio_name: portfolio.portfolio_name,
            commentaries: Vec::new(),
            generated_at: Utc::now(),
        });
    }

    let mut contexts = Vec::with_capacity(holdings.len());
    for holding in &holdings {
        let info = match db::ticker_queries::fetch_one(pool, &holding.ticker_id).await {
            Ok(info) => info,
            Err(e) => {
                warn!("Metadata lookup failed for ticker={}: {}", holding.ticker_id, e);
                None
            }
        };
        contexts.push(HoldingContext::resolve(holding.ticker_id.clone(), info));
    }

    let commentaries = engine.generate_all(&contexts).await;

    info!(
        "Generated {} commentaries for portfolio {}",
        commentaries.len(),
        portfolio_id
    );

    Ok(PortfolioCommentaryResponse {
        portfolio_id,
        portfolio_name: portfolio.portfolio_name,
        commentaries,
        generated_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::errors::LlmError;
    use crate::external::filing_store::FilingStoreError;

    fn chunk_with_year(year: i32) -> FilingChunk {
        FilingChunk {
            ticker: "AAPL".to_string(),
            filing_year: year,
            filing_type: "10-K".to_string(),
            filing_period: "FY".to_string(),
            item_code: "item_7".to_string(),
            chunk_index: 0,
            chunk_text: "text".to_string(),
            similarity: 0.9,
        }
    }

    #[test]
    fn test_commentary_config_default() {
        let config = CommentaryConfig::default();
        assert_eq!(config.max_chunks, 15);
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.ticker_timeout_secs, 60);
    }

    #[test]
    fn test_dominant_year_picks_most_frequent() {
        let chunks: Vec<FilingChunk> =
            [2023, 2023, 2022, 2023, 2022].iter().map(|&y| chunk_with_year(y)).collect();
        assert_eq!(dominant_filing_year(&chunks), Some(2023));
    }

    #[test]
    fn test_dominant_year_tie_prefers_most_recent() {
        let chunks: Vec<FilingChunk> =
            [2021, 2023, 2021, 2023].iter().map(|&y| chunk_with_year(y)).collect();
        assert_eq!(dominant_filing_year(&chunks), Some(2023));
    }

    #[test]
    fn test_dominant_year_empty_is_none() {
        assert_eq!(dominant_filing_year(&[]), None);
    }

    #[test]
    fn test_holding_context_falls_back_when_metadata_missing() {
        let ctx = HoldingContext::resolve("ZZZZ".to_string(), None);
        assert_eq!(ctx.company_name, "ZZZZ");
        assert_eq!(ctx.sector, "Unknown");
    }

    #[test]
    fn test_holding_context_falls_back_on_null_columns() {
        let info = TickerInfo {
            ticker_id: "AAPL".to_string(),
            company_name: None,
            sector: None,
            industry: None,
            currency: None,
        };
        let ctx = HoldingContext::resolve("AAPL".to_string(), Some(info));
        assert_eq!(ctx.company_name, "AAPL");
        assert_eq!(ctx.sector, "Unknown");
    }

    #[test]
    fn test_holding_context_uses_metadata_when_present() {
        let info = TickerInfo {
            ticker_id: "AAPL".to_string(),
            company_name: Some("Apple Inc.".to_string()),
            sector: Some("Technology".to_string()),
            industry: Some("Consumer Electronics".to_string()),
            currency: Some("USD".to_string()),
        };
        let ctx = HoldingContext::resolve("AAPL".to_string(), Some(info));
        assert_eq!(ctx.company_name, "Apple Inc.");
        assert_eq!(ctx.sector, "Technology");
    }

    #[test]
    fn test_missing_portfolio_and_unowned_portfolio_are_indistinguishable() {
        // Both ownership failure and nonexistence arrive here as None.
        let result = require_owned(None);
        assert!(matches!(result, Err(AppError::NotFound)));
    }

    // -----------------------------------------------------------------------
    // Engine pipeline tests over mock providers
    // -----------------------------------------------------------------------

    struct ScriptedChunkStore {
        chunks_by_ticker: HashMap<String, Vec<FilingChunk>>,
        delay_ms_by_ticker: HashMap<String, u64>,
        requests: Mutex<Vec<(String, Option<i32>, i64)>>,
    }

    impl ScriptedChunkStore {
        fn new(chunks_by_ticker: HashMap<String, Vec<FilingChunk>>) -> Self {
            Self {
                chunks_by_ticker,
                delay_ms_by_ticker: HashMap::new(),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<(String, Option<i32>, i64)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FilingChunkStore for ScriptedChunkStore {
        async fn search_chunks(
            &self,
            ticker: &str,
            _query_vector: &[f32],
            filing_year: Option<i32>,
            limit: i64,
        ) -> Result<Vec<FilingChunk>, FilingStoreError> {
            if let Some(&delay_ms) = self.delay_ms_by_ticker.get(ticker) {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            self.requests
                .lock()
                .unwrap()
                .push((ticker.to_string(), filing_year, limit));
            Ok(self.chunks_by_ticker.get(ticker).cloned().unwrap_or_default())
        }
    }

    struct ScriptedLlm {
        embed_calls: AtomicUsize,
        generate_calls: AtomicUsize,
        fail_for: HashSet<String>,
    }

    impl ScriptedLlm {
        fn new() -> Self {
            Self {
                embed_calls: AtomicUsize::new(0),
                generate_calls: AtomicUsize::new(0),
                fail_for: HashSet::new(),
            }
        }

        fn failing_for(tickers: &[&str]) -> Self {
            let mut llm = Self::new();
            llm.fail_for = tickers.iter().map(|t| t.to_string()).collect();
            llm
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        async fn generate(&self, _system_prompt: &str, user_prompt: &str) -> Result<String, LlmError> {
            self.generate_calls.fetch_add(1, Ordering::SeqCst);
            for ticker in &self.fail_for {
                if user_prompt.contains(ticker.as_str()) {
                    return Err(LlmError::ApiError("scripted generation failure".to_string()));
                }
            }
            Ok("generated commentary".to_string())
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
            self.embed_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0.1, 0.2, 0.3])
        }
    }

    fn worked_example_chunks() -> Vec<FilingChunk> {
        let similarities = [0.91, 0.87, 0.80, 0.75, 0.70];
        let years = [2023, 2023, 2022, 2023, 2022];
        similarities
            .iter()
            .zip(years)
            .enumerate()
            .map(|(i, (&similarity, year))| FilingChunk {
                ticker: "AAPL".to_string(),
                filing_year: year,
                filing_type: "10-K".to_string(),
                filing_period: "FY".to_string(),
                item_code: "item_1a".to_string(),
                chunk_index: i as i32,
                chunk_text: format!("chunk {}", i),
                similarity,
            })
            .collect()
    }

    fn holding(ticker: &str) -> HoldingContext {
        HoldingContext::resolve(ticker.to_string(), None)
    }

    fn engine_with(
        llm: Arc<ScriptedLlm>,
        store: Arc<ScriptedChunkStore>,
        config: CommentaryConfig,
    ) -> CommentaryEngine {
        CommentaryEngine::new(llm, store, config)
    }

    #[tokio::test]
    async fn test_worked_example_dominant_year_and_single_generation() {
        let llm = Arc::new(ScriptedLlm::new());
        let store = Arc::new(ScriptedChunkStore::new(HashMap::from([(
            "AAPL".to_string(),
            worked_example_chunks(),
        )])));
        let engine = engine_with(llm.clone(), store.clone(), CommentaryConfig::default());

        let commentary = engine.generate_for_holding(&holding("AAPL")).await;

        assert_eq!(commentary.ticker_id, "AAPL");
        assert_eq!(commentary.commentary, "generated commentary");
        assert_eq!(commentary.filing_year, Some(2023));
        assert_eq!(commentary.chunks_used, 5);
        assert_eq!(llm.embed_calls.load(Ordering::SeqCst), 1);
        assert_eq!(llm.generate_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retrieval_is_scoped_to_ticker_with_configured_limit() {
        let llm = Arc::new(ScriptedLlm::new());
        let store = Arc::new(ScriptedChunkStore::new(HashMap::from([(
            "AAPL".to_string(),
            worked_example_chunks(),
        )])));
        let engine = engine_with(llm, store.clone(), CommentaryConfig::default());

        let chunks = engine.retrieve_chunks("AAPL", None).await.unwrap();

        assert!(chunks.iter().all(|c| c.ticker == "AAPL"));
        assert_eq!(store.requests(), vec![("AAPL".to_string(), None, 15)]);
    }

    #[tokio::test]
    async fn test_retrieval_passes_year_filter_through() {
        let llm = Arc::new(ScriptedLlm::new());
        let store = Arc::new(ScriptedChunkStore::new(HashMap::new()));
        let engine = engine_with(llm, store.clone(), CommentaryConfig::default());

        let chunks = engine.retrieve_chunks("MSFT", Some(2023)).await.unwrap();

        assert!(chunks.is_empty());
        assert_eq!(store.requests(), vec![("MSFT".to_string(), Some(2023), 15)]);
    }

    #[tokio::test]
    async fn test_zero_chunks_skips_generation() {
        let llm = Arc::new(ScriptedLlm::new());
        let store = Arc::new(ScriptedChunkStore::new(HashMap::new()));
        let engine = engine_with(llm.clone(), store, CommentaryConfig::default());

        let commentary = engine.generate_for_holding(&holding("ZZZZ")).await;

        assert!(commentary.commentary.contains("No SEC filing data available"));
        assert_eq!(commentary.chunks_used, 0);
        assert_eq!(commentary.filing_year, None);
        assert_eq!(llm.generate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_generation_failure_is_isolated_to_one_ticker() {
        let llm = Arc::new(ScriptedLlm::failing_for(&["MSFT"]));
        let store = Arc::new(ScriptedChunkStore::new(HashMap::from([
            ("AAPL".to_string(), worked_example_chunks()),
            (
                "MSFT".to_string(),
                worked_example_chunks()
                    .into_iter()
                    .map(|mut c| {
                        c.ticker = "MSFT".to_string();
                        c
                    })
                    .collect(),
            ),
        ])));
        let engine = engine_with(llm, store, CommentaryConfig::default());

        let contexts = vec![holding("AAPL"), holding("MSFT")];
        let commentaries = engine.generate_all(&contexts).await;

        assert_eq!(commentaries.len(), 2);
        assert_eq!(commentaries[0].commentary, "generated commentary");
        assert_eq!(commentaries[0].chunks_used, 5);
        assert!(commentaries[1].commentary.starts_with("Commentary could not be generated:"));
        assert_eq!(commentaries[1].chunks_used, 0);
    }

    #[tokio::test]
    async fn test_results_keep_holdings_order_regardless_of_completion_order() {
        let llm = Arc::new(ScriptedLlm::new());
        let mut store = ScriptedChunkStore::new(HashMap::new());
        // Earlier holdings finish last
        store.delay_ms_by_ticker = HashMap::from([
            ("A".to_string(), 120),
            ("B".to_string(), 80),
            ("C".to_string(), 40),
            ("D".to_string(), 0),
        ]);
        let engine = engine_with(llm, Arc::new(store), CommentaryConfig::default());

        let contexts: Vec<HoldingContext> = ["A", "B", "C", "D"].iter().map(|t| holding(t)).collect();
        let commentaries = engine.generate_all(&contexts).await;

        let tickers: Vec<&str> = commentaries.iter().map(|c| c.ticker_id.as_str()).collect();
        assert_eq!(tickers, vec!["A", "B", "C", "D"]);
    }

    #[tokio::test]
    async fn test_empty_holding_list_makes_no_external_calls() {
        let llm = Arc::new(ScriptedLlm::new());
        let store = Arc::new(ScriptedChunkStore::new(HashMap::new()));
        let engine = engine_with(llm.clone(), store.clone(), CommentaryConfig::default());

        let commentaries = engine.generate_all(&[]).await;

        assert!(commentaries.is_empty());
        assert_eq!(llm.embed_calls.load(Ordering::SeqCst), 0);
        assert_eq!(llm.generate_calls.load(Ordering::SeqCst), 0);
        assert!(store.requests().is_empty());
    }

    #[tokio::test]
    async fn test_slow_ticker_degrades_to_placeholder() {
        let llm = Arc::new(ScriptedLlm::new());
        let mut store = ScriptedChunkStore::new(HashMap::new());
        store.delay_ms_by_ticker = HashMap::from([("SLOW".to_string(), 2_000)]);
        let config = CommentaryConfig { ticker_timeout_secs: 1, ..CommentaryConfig::default() };
        let engine = engine_with(llm, Arc::new(store), config);

        let commentary = engine.generate_for_holding(&holding("SLOW")).await;

        assert!(commentary.commentary.starts_with("Commentary could not be generated:"));
        assert!(commentary.commentary.contains("timed out after 1s"));
        assert_eq!(commentary.chunks_used, 0);
    }
}
