use async_trait::async_trait;
use pgvector::Vector;
use sqlx::PgPool;
use thiserror::Error;
use tracing::debug;

use crate::models::FilingChunk;

#[derive(Debug, Error)]
pub enum FilingStoreError {
    #[error("query failed: {0}")]
    Query(String),
}

/// Read-only access to the pre-embedded filing chunk corpus. The corpus is
/// populated by an external ingestion pipeline; this core never writes to it.
#[async_trait]
pub trait FilingChunkStore: Send + Sync {
    /// Nearest-neighbor search scoped to a single ticker (and optionally a
    /// filing year). Returns at most `limit` chunks ordered by strictly
    /// descending similarity; an empty result means "no data", not failure.
    async fn search_chunks(
        &self,
        ticker: &str,
        query_vector: &[f32],
        filing_year: Option<i32>,
        limit: i64,
    ) -> Result<Vec<FilingChunk>, FilingStoreError>;
}

/// pgvector-backed store. Similarity is 1 − cosine distance, with `<=>`
/// being pgvector's cosine-distance operator. The ticker equality filter is
/// part of the correctness contract: chunks from other tickers must never
/// appear in the result.
pub struct PgVectorChunkStore {
    pool: PgPool,
}

const SIMILARITY_SEARCH_SQL: &str =
    "SELECT ticker, filing_year, filing_type, filing_period,
            item_code, chunk_index, chunk_text,
            1 - (embedding <=> $2) AS similarity
       FROM sec_filing_chunks
      WHERE ticker = $1
      ORDER BY embedding <=> $2
      LIMIT $3";

const SIMILARITY_SEARCH_BY_YEAR_SQL: &str =
    "SELECT ticker, filing_year, filing_type, filing_period,
            item_code, chunk_index, chunk_text,
            1 - (embedding <=> $2) AS similarity
       FROM sec_filing_chunks
      WHERE ticker = $1
        AND filing_year = $3
      ORDER BY embedding <=> $2
      LIMIT $4";

impl PgVectorChunkStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FilingChunkStore for PgVectorChunkStore {
    async fn search_chunks(
        &self,
        ticker: &str,
        query_vector: &[f32],
        filing_year: Option<i32>,
        limit: i64,
    ) -> Result<Vec<FilingChunk>, FilingStoreError> {
        let embedding = Vector::from(query_vector.to_vec());

        let chunks = match filing_year {
            Some(year) => {
                sqlx::query_as::<_, FilingChunk>(SIMILARITY_SEARCH_BY_YEAR_SQL)
                    .bind(ticker)
                    .bind(&embedding)
                    .bind(year)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query_as::<_, FilingChunk>(SIMILARITY_SEARCH_SQL)
                    .bind(ticker)
                    .bind(&embedding)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| FilingStoreError::Query(e.to_string()))?;

        debug!(
            "Retrieved {} chunks for ticker={} (top similarity: {})",
            chunks.len(),
            ticker,
            chunks.first().map(|c| format!("{:.4}", c.similarity)).unwrap_or_else(|| "N/A".to_string())
        );

        Ok(chunks)
    }
}
