use std::sync::Arc;

use sqlx::PgPool;

use crate::services::commentary_service::CommentaryEngine;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub engine: Arc<CommentaryEngine>,
}
