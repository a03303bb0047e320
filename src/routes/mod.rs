pub mod admin;
pub mod ingest;

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// Assemble the API router.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(ingest::routes())
        .merge(admin::routes())
}
