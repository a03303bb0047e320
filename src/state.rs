use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use chrono::Utc;

use crate::config::HubConfig;
use crate::db::pool::{open_pool, DbPool};
use crate::db::state_store;
use crate::signals::store::SignalStore;
use crate::signals::PriceTick;
use crate::ws::broadcast::BroadcastHub;

/// Shared application state, passed to all route handlers via `axum::extract::State`.
///
/// The store mutex is the single mutation owner: engine calls run to
/// completion under it, so per-symbol updates are serialized and snapshots
/// are never torn.
pub struct AppState {
    pub config: HubConfig,
    pub store: Mutex<SignalStore>,
    pub broadcast: BroadcastHub,

    /// Latest tick per symbol, kept only to replay to new viewers.
    pub ticks: RwLock<BTreeMap<String, PriceTick>>,

    /// Persistence pool; `None` runs the hub memory-only.
    pub db: Option<DbPool>,
}

impl AppState {
    pub fn new(config: HubConfig) -> Arc<Self> {
        let db = open_pool(&config.db_path, 4);

        Arc::new(Self {
            config,
            store: Mutex::new(SignalStore::new()),
            broadcast: BroadcastHub::new(),
            ticks: RwLock::new(BTreeMap::new()),
            db,
        })
    }

    /// Reload persisted per-symbol state over the freshly initialized map.
    ///
    /// Runs once at startup. Any failure is logged and leaves the in-memory
    /// state at its initialized (empty) value — the hub still starts.
    pub async fn restore_from_db(&self) {
        let Some(pool) = &self.db else {
            tracing::warn!("persistence disabled, starting with empty state");
            return;
        };
        let conn = match pool.get() {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!("failed to get DB connection for restore: {e}");
                return;
            }
        };
        if let Err(e) = state_store::ensure_schema(&conn) {
            tracing::error!("failed to ensure state schema: {e}");
            return;
        }
        match state_store::purge_expired(&conn, Utc::now().timestamp()) {
            Ok(purged) if purged > 0 => tracing::info!("purged {purged} expired state rows"),
            Ok(_) => {}
            Err(e) => tracing::warn!("expired-row purge failed: {e}"),
        }
        match state_store::load_all(&conn) {
            Ok(loaded) => {
                let restored = self.store.lock().await.hydrate(loaded);
                tracing::info!("restored persisted state for {restored} symbols");
            }
            Err(e) => tracing::error!("failed to load persisted state: {e}"),
        }
    }
}
