use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A pre-chunked, pre-embedded fragment of a SEC filing, as returned by a
/// similarity search. `similarity` is computed at query time
/// (1 - cosine distance) and is not stored in the corpus.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FilingChunk {
    pub ticker: String,
    pub filing_year: i32,
    pub filing_type: String,
    pub filing_period: String,
    pub item_code: String,
    pub chunk_index: i32,
    pub chunk_text: String,
    pub similarity: f64,
}
