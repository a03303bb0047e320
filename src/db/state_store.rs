//! SQLite-backed persistence for per-symbol signal state.
//!
//! One row per symbol holding the serialized [`SymbolState`] blob, a
//! last-write timestamp and a sliding expiry marker. The expiry is a
//! best-effort reclamation window for symbols that stop receiving events,
//! not an exact-time deletion: expired rows are dropped on the next startup
//! purge, and every fresh write slides the window forward.

use chrono::Utc;
use rusqlite::{params, Connection};
use std::collections::BTreeMap;

use crate::signals::SymbolState;

const SECS_PER_DAY: i64 = 24 * 60 * 60;

/// Errors returned by state-store operations.
#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    Pool(r2d2::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Sqlite(e) => write!(f, "sqlite: {e}"),
            StoreError::Pool(e) => write!(f, "pool: {e}"),
            StoreError::Json(e) => write!(f, "json: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Sqlite(e)
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(e: r2d2::Error) -> Self {
        StoreError::Pool(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Json(e)
    }
}

pub fn ensure_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS signal_state (
             symbol       TEXT PRIMARY KEY,
             state_json   TEXT    NOT NULL,
             last_updated TEXT    NOT NULL,
             expires_at   INTEGER NOT NULL
         );",
    )?;
    Ok(())
}

/// Write-through of one symbol's state. Each write slides the expiry window
/// forward by `ttl_days`.
pub fn save_symbol_state(
    conn: &Connection,
    symbol: &str,
    state: &SymbolState,
    ttl_days: u32,
) -> Result<(), StoreError> {
    let json = serde_json::to_string(state)?;
    let now = Utc::now();
    let expires_at = now.timestamp() + i64::from(ttl_days) * SECS_PER_DAY;
    conn.execute(
        "INSERT OR REPLACE INTO signal_state (symbol, state_json, last_updated, expires_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![symbol, json, now.to_rfc3339(), expires_at],
    )?;
    Ok(())
}

/// Drop rows whose expiry window has passed. Returns the purged count.
pub fn purge_expired(conn: &Connection, now_s: i64) -> Result<usize, StoreError> {
    let purged = conn.execute(
        "DELETE FROM signal_state WHERE expires_at <= ?1",
        params![now_s],
    )?;
    Ok(purged)
}

/// Scan every persisted row. Blobs that fail to parse are logged and
/// skipped rather than aborting the reload.
pub fn load_all(conn: &Connection) -> Result<BTreeMap<String, SymbolState>, StoreError> {
    let mut stmt = conn.prepare("SELECT symbol, state_json FROM signal_state")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut loaded = BTreeMap::new();
    for row in rows {
        let (symbol, json) = row?;
        match serde_json::from_str::<SymbolState>(&json) {
            Ok(state) => {
                loaded.insert(symbol, state);
            }
            Err(e) => tracing::warn!("skipping undecodable state row for {symbol}: {e}"),
        }
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::engine;
    use crate::signals::{Family, Polarity};

    fn open_temp_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = Connection::open(dir.path().join("signals.db")).unwrap();
        ensure_schema(&conn).unwrap();
        (dir, conn)
    }

    fn sample_state() -> SymbolState {
        let mut state = SymbolState::default();
        engine::apply(&mut state, Family::Call1, Polarity::Buy, 100.0, "t1", 1_000);
        engine::apply(&mut state, Family::Call1, Polarity::Buy, 101.0, "t2", 2_000);
        engine::apply(&mut state, Family::Call3, Polarity::Buy, 99.0, "t3", 3_000);
        state
    }

    #[test]
    fn save_and_load_round_trip() {
        let (_dir, conn) = open_temp_db();
        let state = sample_state();

        save_symbol_state(&conn, "NIFTY", &state, 15).unwrap();
        let loaded = load_all(&conn).unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get("NIFTY"), Some(&state));
    }

    #[test]
    fn rewrite_replaces_the_row() {
        let (_dir, conn) = open_temp_db();
        let mut state = sample_state();
        save_symbol_state(&conn, "NIFTY", &state, 15).unwrap();

        engine::apply(&mut state, Family::Call1, Polarity::Sell, 98.0, "t4", 4_000);
        save_symbol_state(&conn, "NIFTY", &state, 15).unwrap();

        let loaded = load_all(&conn).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get("NIFTY"), Some(&state));
    }

    #[test]
    fn each_write_slides_expiry_forward() {
        let (_dir, conn) = open_temp_db();
        let state = sample_state();

        save_symbol_state(&conn, "NIFTY", &state, 1).unwrap();
        let first: i64 = conn
            .query_row("SELECT expires_at FROM signal_state WHERE symbol = 'NIFTY'", [], |r| r.get(0))
            .unwrap();
        save_symbol_state(&conn, "NIFTY", &state, 15).unwrap();
        let second: i64 = conn
            .query_row("SELECT expires_at FROM signal_state WHERE symbol = 'NIFTY'", [], |r| r.get(0))
            .unwrap();

        assert!(second > first);
        let now_s = Utc::now().timestamp();
        assert!(second >= now_s + 14 * SECS_PER_DAY);
    }

    #[test]
    fn purge_drops_only_expired_rows() {
        let (_dir, conn) = open_temp_db();
        let state = sample_state();
        save_symbol_state(&conn, "NIFTY", &state, 15).unwrap();
        save_symbol_state(&conn, "TCS", &state, 15).unwrap();
        conn.execute("UPDATE signal_state SET expires_at = 10 WHERE symbol = 'TCS'", [])
            .unwrap();

        let purged = purge_expired(&conn, Utc::now().timestamp()).unwrap();
        assert_eq!(purged, 1);

        let loaded = load_all(&conn).unwrap();
        assert!(loaded.contains_key("NIFTY"));
        assert!(!loaded.contains_key("TCS"));
    }

    #[test]
    fn undecodable_row_is_skipped_not_fatal() {
        let (_dir, conn) = open_temp_db();
        save_symbol_state(&conn, "NIFTY", &sample_state(), 15).unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO signal_state (symbol, state_json, last_updated, expires_at)
             VALUES ('TCS', 'not json', '', 9999999999)",
            [],
        )
        .unwrap();

        let loaded = load_all(&conn).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key("NIFTY"));
    }

    #[test]
    fn empty_table_loads_empty_map() {
        let (_dir, conn) = open_temp_db();
        assert!(load_all(&conn).unwrap().is_empty());
    }
}
