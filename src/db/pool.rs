use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Open (creating if missing) the signal-state database.
///
/// Returns `None` on failure — persistence is best-effort and the hub runs
/// memory-only without it.
pub fn open_pool(path: &Path, max_size: u32) -> Option<DbPool> {
    let manager = SqliteConnectionManager::file(path);
    match Pool::builder().max_size(max_size).build(manager) {
        Ok(pool) => Some(pool),
        Err(e) => {
            tracing::error!("Failed to create DB pool for {}: {e}", path.display());
            None
        }
    }
}
