//! Webhook ingress: validation in front of the transition engine.
//!
//! Ordering per event: validate, mutate under the store lock, publish the
//! snapshot while still holding the lock (so snapshot order matches commit
//! order), then hand the symbol's state to a detached persistence task.
//! Only validation failures are visible to the caller; persistence failures
//! affect durability alone.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::db::state_store::{self, StoreError};
use crate::error::HubError;
use crate::registry;
use crate::signals::engine::Transition;
use crate::signals::{Family, Polarity, PriceTick, RangeWindow, SymbolState};
use crate::state::AppState;
use crate::ws;

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

// ── Request bodies ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SignalEventBody {
    pub symbol: String,
    pub signal: String,
    pub indicator: i64,
    pub price: f64,
    pub time: String,
}

#[derive(Debug, Deserialize)]
pub struct RangeEventBody {
    pub symbol: String,
    #[serde(rename = "type")]
    pub window: String,
    pub high: f64,
    pub low: f64,
    pub time: String,
}

/// Map a webhook indicator code to its channel family.
///
/// Hourly variants are base+100, second-page variants base+200.
fn indicator_family(code: i64) -> Option<Family> {
    match code {
        1 => Some(Family::Call1),
        10 => Some(Family::Call2),
        3 => Some(Family::Call3),
        101 => Some(Family::Call1Hourly),
        110 => Some(Family::Call2Hourly),
        103 => Some(Family::Call3Hourly),
        201 => Some(Family::Call1Page2),
        210 => Some(Family::Call2Page2),
        _ => None,
    }
}

// ── Routes ───────────────────────────────────────────────────────────────

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/webhook", post(webhook_signal))
        .route("/webhook/range", post(webhook_range))
        .route("/webhook/price", post(webhook_price))
}

// ── Handlers ─────────────────────────────────────────────────────────────

/// POST /webhook — signal event from an indicator alert.
async fn webhook_signal(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SignalEventBody>,
) -> Result<Json<Value>, HubError> {
    let family = indicator_family(body.indicator)
        .ok_or_else(|| HubError::BadRequest(format!("unknown indicator code {}", body.indicator)))?;
    let polarity: Polarity = body
        .signal
        .parse()
        .map_err(|_| HubError::BadRequest(format!("invalid signal type {:?}", body.signal)))?;

    let mut store = state.store.lock().await;
    let transition = store.apply_signal(&body.symbol, family, polarity, body.price, &body.time, now_ms())?;

    match transition {
        Transition::Updated { key, record } => {
            state
                .broadcast
                .publish_state(store.snapshot_message().to_string());
            let snapshot = store.symbol_state(&body.symbol).cloned();
            drop(store);

            spawn_persist(&state, body.symbol.clone(), snapshot);
            tracing::info!(
                "signal applied: {} {} @ {} (count {})",
                body.symbol,
                key,
                body.price,
                record.repeat_count
            );
            Ok(Json(json!({
                "status": "ok",
                "channel": key,
                "repeat_count": record.repeat_count,
            })))
        }
        Transition::Ignored => {
            tracing::debug!("{}: stop without active go on {} ignored", body.symbol, family);
            Ok(Json(json!({ "status": "ignored" })))
        }
    }
}

/// POST /webhook/range — high/low of a fixed window; no counter logic.
async fn webhook_range(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RangeEventBody>,
) -> Result<Json<Value>, HubError> {
    let window: RangeWindow = body
        .window
        .parse()
        .map_err(|_| HubError::BadRequest(format!("unknown range window {:?}", body.window)))?;

    let mut store = state.store.lock().await;
    store.apply_range(&body.symbol, window, body.high, body.low, &body.time, now_ms())?;
    state
        .broadcast
        .publish_state(store.snapshot_message().to_string());
    let snapshot = store.symbol_state(&body.symbol).cloned();
    drop(store);

    spawn_persist(&state, body.symbol.clone(), snapshot);
    tracing::info!("range stored: {} {} {}-{}", body.symbol, window, body.low, body.high);
    Ok(Json(json!({ "status": "ok", "window": window })))
}

/// POST /webhook/price — ephemeral tick, broadcast-only; bypasses the
/// engine and is never persisted.
async fn webhook_price(
    State(state): State<Arc<AppState>>,
    Json(tick): Json<PriceTick>,
) -> Result<Json<Value>, HubError> {
    if !registry::is_tracked(&tick.symbol) {
        return Err(HubError::BadRequest(format!(
            "symbol {:?} is not tracked",
            tick.symbol
        )));
    }

    let message = ws::tick_message(&tick);
    state
        .ticks
        .write()
        .await
        .insert(tick.symbol.clone(), tick);
    state.broadcast.publish_ticks(message);
    Ok(Json(json!({ "status": "ok" })))
}

/// Fire-and-forget write-through after the in-memory commit. Failures are
/// logged and never roll back state or block broadcast.
fn spawn_persist(state: &Arc<AppState>, symbol: String, snapshot: Option<SymbolState>) {
    let Some(pool) = state.db.clone() else {
        tracing::debug!("persistence disabled, state for {symbol} kept in memory only");
        return;
    };
    let Some(snapshot) = snapshot else { return };
    let ttl_days = state.config.ttl_days;
    tokio::spawn(async move {
        let result = pool
            .get()
            .map_err(StoreError::from)
            .and_then(|conn| state_store::save_symbol_state(&conn, &symbol, &snapshot, ttl_days));
        match result {
            Ok(()) => tracing::debug!("persisted state for {symbol}"),
            Err(e) => tracing::error!("failed to persist state for {symbol}: {e}"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_table_covers_all_families_once() {
        let codes = [1, 10, 3, 101, 110, 103, 201, 210];
        let mapped: Vec<Family> = codes.iter().map(|&c| indicator_family(c).unwrap()).collect();
        for family in Family::ALL {
            assert_eq!(mapped.iter().filter(|&&f| f == family).count(), 1, "{family}");
        }
    }

    #[test]
    fn unknown_indicator_codes_are_unmapped() {
        for code in [0, 2, 4, 11, 100, 111, 200, 300, -1] {
            assert!(indicator_family(code).is_none(), "code {code}");
        }
    }
}
