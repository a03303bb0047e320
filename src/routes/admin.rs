//! Snapshot polling and maintenance endpoints.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::db::state_store;
use crate::error::HubError;
use crate::signals::{Family, SymbolState};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/state", get(api_state))
        .route("/api/admin/clear", post(api_clear_family))
}

/// GET /api/state — the current snapshot, same shape as the WS push.
async fn api_state(State(state): State<Arc<AppState>>) -> Json<Value> {
    let store = state.store.lock().await;
    Json(store.snapshot_message())
}

#[derive(Debug, Deserialize)]
pub struct ClearFamilyBody {
    pub family: Family,
}

/// POST /api/admin/clear — wipe one family's channels for every symbol.
///
/// Unlike webhook traffic this persists synchronously: a clear that doesn't
/// reach the store would resurrect the cleared signals on restart, which is
/// exactly what the operator is trying to prevent.
async fn api_clear_family(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ClearFamilyBody>,
) -> Result<Json<Value>, HubError> {
    let (touched, exports): (Vec<String>, Vec<(String, SymbolState)>) = {
        let mut store = state.store.lock().await;
        let touched = store.clear_family(body.family);
        if !touched.is_empty() {
            state
                .broadcast
                .publish_state(store.snapshot_message().to_string());
        }
        let exports = touched
            .iter()
            .filter_map(|symbol| {
                store
                    .symbol_state(symbol)
                    .cloned()
                    .map(|s| (symbol.clone(), s))
            })
            .collect();
        (touched, exports)
    };

    tracing::info!("cleared family {} for {} symbols", body.family, touched.len());

    let persisted = match &state.db {
        Some(pool) => {
            let conn = pool.get()?;
            for (symbol, snapshot) in &exports {
                state_store::save_symbol_state(&conn, symbol, snapshot, state.config.ttl_days)?;
            }
            true
        }
        None => {
            tracing::warn!("persistence disabled, clear is in-memory only");
            false
        }
    };

    Ok(Json(json!({
        "status": "ok",
        "family": body.family,
        "cleared": touched.len(),
        "persisted": persisted,
    })))
}
