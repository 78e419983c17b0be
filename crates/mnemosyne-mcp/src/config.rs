use std::path::PathBuf;
use std::time::Duration;

pub const DB_ENV: &str = "MNEMOSYNE_DB";
pub const LOG_FILE_ENV: &str = "MNEMOSYNE_LOG_FILE";
pub const LOG_FILTER_ENV: &str = "MNEMOSYNE_LOG";
pub const BUSY_TIMEOUT_ENV: &str = "MNEMOSYNE_BUSY_TIMEOUT_MS";
pub const MAX_FRAME_BYTES_ENV: &str = "MNEMOSYNE_MAX_FRAME_BYTES";

const DEFAULT_DB_PATH: &str = "./data/mnemosyne.db";
const DEFAULT_LOG_FILE: &str = "./data/server.log";
const DEFAULT_LOG_FILTER: &str = "info";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const MAX_BUSY_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;
const MIN_MAX_FRAME_BYTES: usize = 1024;
const MAX_MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub db_path: PathBuf,
    pub log_file: PathBuf,
    pub log_filter: String,
    pub busy_timeout: Duration,
    /// Largest `Content-Length` body the stdio loop will accept.
    pub max_frame_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable source. Blank values fall
    /// back to the defaults; the busy timeout is clamped to one minute and the
    /// frame limit to 1 KiB..=64 MiB.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let busy_timeout_ms = non_empty(BUSY_TIMEOUT_ENV)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_BUSY_TIMEOUT_MS)
            .min(MAX_BUSY_TIMEOUT_MS);
        let max_frame_bytes = non_empty(MAX_FRAME_BYTES_ENV)
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_FRAME_BYTES)
            .clamp(MIN_MAX_FRAME_BYTES, MAX_MAX_FRAME_BYTES);

        Self {
            db_path: non_empty(DB_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            log_file: non_empty(LOG_FILE_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.log_file),
            log_filter: non_empty(LOG_FILTER_ENV).unwrap_or(defaults.log_filter),
            busy_timeout: Duration::from_millis(busy_timeout_ms),
            max_frame_bytes,
        }
    }
}
