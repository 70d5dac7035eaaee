//! Runtime configuration loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_STATIC_DIR: &str = "public";
pub const DEFAULT_SAVE_DIR: &str = ".";
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 10_000;

/// Relay server configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// TCP port to listen on (all interfaces)
    pub port: u16,
    /// Directory served for every path that isn't `/ws`, `/dump` or `/save_chat`
    pub static_dir: PathBuf,
    /// Maximum number of messages kept in history (None = unbounded)
    pub history_limit: Option<usize>,
    /// Per-recipient write deadline during a broadcast pass (None = no deadline)
    pub write_timeout: Option<Duration>,
    /// Directory that chat transcripts are written to
    pub save_dir: PathBuf,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            history_limit: None,
            write_timeout: Some(Duration::from_millis(DEFAULT_WRITE_TIMEOUT_MS)),
            save_dir: PathBuf::from(DEFAULT_SAVE_DIR),
        }
    }
}

impl RelayConfig {
    /// Load config from environment variables
    ///
    /// - `CHAT_PORT`: listen port (default 8080)
    /// - `CHAT_STATIC_DIR`: static asset directory (default `public`)
    /// - `CHAT_HISTORY_LIMIT`: keep only the newest N messages (unset or 0 = unbounded)
    /// - `CHAT_WRITE_TIMEOUT_MS`: per-recipient write deadline (0 = disabled)
    /// - `CHAT_SAVE_DIR`: transcript directory (default `.`)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = parse_var("CHAT_PORT").unwrap_or(defaults.port);

        let static_dir = non_empty_var("CHAT_STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.static_dir);

        let history_limit = parse_var::<usize>("CHAT_HISTORY_LIMIT").filter(|n| *n > 0);

        let write_timeout = match parse_var::<u64>("CHAT_WRITE_TIMEOUT_MS") {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => defaults.write_timeout,
        };

        let save_dir = non_empty_var("CHAT_SAVE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.save_dir);

        match history_limit {
            Some(limit) => tracing::info!("History retention: newest {} messages", limit),
            None => tracing::warn!("History retention: unbounded, memory grows with every message"),
        }

        tracing::info!(
            port,
            static_dir = %static_dir.display(),
            write_timeout_ms = write_timeout.map(|d| d.as_millis() as u64),
            save_dir = %save_dir.display(),
            "Relay config loaded"
        );

        Self {
            port,
            static_dir,
            history_limit,
            write_timeout,
            save_dir,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse an env var, warning and returning None if it is set but invalid
fn parse_var<T: FromStr>(key: &str) -> Option<T> {
    let raw = non_empty_var(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {}: {:?}", key, raw);
            None
        }
    }
}
