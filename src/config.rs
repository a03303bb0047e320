use std::env;
use std::path::PathBuf;

/// Hub configuration derived from environment variables.
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub bind: String,
    pub port: u16,

    /// SQLite file holding the per-symbol state rows.
    pub db_path: PathBuf,
    /// Sliding expiry window for persisted rows.
    pub ttl_days: u32,

    /// Interval between liveness pings to each viewer.
    pub ws_ping_secs: u64,

    /// Directory served as the router fallback (viewer assets).
    pub static_dir: PathBuf,
}

fn env_str(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_u16(name: &str, default: u16) -> u16 {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_path(name: &str, default: &str) -> PathBuf {
    PathBuf::from(env_str(name, default))
}

impl HubConfig {
    pub fn from_env() -> Self {
        Self {
            bind: env_str("SIGNAL_HUB_BIND", "127.0.0.1"),
            port: env_u16("SIGNAL_HUB_PORT", 3000),
            db_path: env_path("SIGNAL_HUB_DB", "signal_state.db"),
            ttl_days: env_u32("SIGNAL_HUB_TTL_DAYS", 15),
            ws_ping_secs: env_u64("SIGNAL_HUB_WS_PING_SECS", 30),
            static_dir: env_path("SIGNAL_HUB_STATIC_DIR", "public"),
        }
    }
}
