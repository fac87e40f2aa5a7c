mod app;
mod db;
mod errors;
mod external;
mod logging;
mod models;
mod routes;
mod services;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

use crate::external::filing_store::PgVectorChunkStore;
use crate::logging::{init_logging, LoggingConfig};
use crate::services::commentary_service::{CommentaryConfig, CommentaryEngine};
use crate::services::llm_service::OpenAiProvider;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_logging(LoggingConfig::from_env())
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
    // The chunk corpus lives in its own datasource; it falls back to the
    // application database when the two are co-located.
    let vector_database_url =
        std::env::var("VECTOR_DATABASE_URL").unwrap_or_else(|_| database_url.clone());

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .context("failed to connect to application database")?;

    let vector_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&vector_database_url)
        .await
        .context("failed to connect to vector database")?;

    let llm = OpenAiProvider::from_env()
        .map_err(|e| anyhow::anyhow!("failed to create LLM provider: {}", e))?;

    let engine = CommentaryEngine::new(
        Arc::new(llm),
        Arc::new(PgVectorChunkStore::new(vector_pool)),
        CommentaryConfig::from_env(),
    );

    let state = AppState {
        pool,
        engine: Arc::new(engine),
    };
    let app = app::create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("🚀 FinStream commentary backend running at http://{}/", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
