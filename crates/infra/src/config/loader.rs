//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Loads a `.env` file if one is present (via dotenvy)
//! 2. Attempts to load from environment variables
//! 3. If the required variables are missing, probes for a config file
//! 4. Falls back to built-in defaults when neither source exists
//!
//! ## Environment Variables
//! - `STASH_DB_PATH`: Database file path (required for env loading)
//! - `STASH_DB_POOL_SIZE`: Connection pool size
//! - `STASH_MAX_RETRIES`: Attempt-count ceiling before dead-lettering
//! - `STASH_CACHE_TTL_SECS`: Recovery cache TTL in seconds
//! - `STASH_MAX_CACHE_ENTRIES`: Recovery cache capacity
//! - `STASH_MAX_CONCURRENT_DOWNLOADS`: Dispatcher worker pool size
//! - `STASH_MAX_DAILY_STORAGE_MB`: Per-run storage budget in megabytes
//!
//! Only `STASH_DB_PATH` is required; the other variables overlay the
//! defaults.
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./stash.json` or `./stash.toml` (current working directory)
//! 3. Parent directories (up to 2 levels)
//! 4. Relative to executable location

use std::path::{Path, PathBuf};

use stash_domain::{Config, Result, StashError};
use tracing::{debug, info};

/// Load configuration with automatic fallback strategy
///
/// Tries environment variables first, then a config file, then built-in
/// defaults. The retry queue and cache must keep working on a machine
/// with no configuration at all, so defaults are a valid final answer.
pub fn load() -> Result<Config> {
    dotenvy::dotenv().ok();

    match load_from_env() {
        Ok(config) => {
            info!("configuration loaded from environment variables");
            return Ok(config);
        }
        Err(e) => {
            debug!(error = ?e, "environment incomplete, trying config file");
        }
    }

    match load_from_file(None) {
        Ok(config) => Ok(config),
        Err(e) => {
            debug!(error = ?e, "no config file found, using defaults");
            Ok(Config::default())
        }
    }
}

/// Load configuration from environment variables
///
/// `STASH_DB_PATH` must be set; every other variable overlays the
/// corresponding default.
///
/// # Errors
/// Returns `StashError::Config` if `STASH_DB_PATH` is missing or any set
/// variable has an invalid value.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    config.database.path = env_var("STASH_DB_PATH")?;

    if let Some(pool_size) = env_parse::<u32>("STASH_DB_POOL_SIZE")? {
        config.database.pool_size = pool_size;
    }
    if let Some(max_retries) = env_parse::<u32>("STASH_MAX_RETRIES")? {
        config.retry.max_retries = max_retries;
    }
    if let Some(ttl_secs) = env_parse::<u64>("STASH_CACHE_TTL_SECS")? {
        config.cache.ttl_secs = ttl_secs;
    }
    if let Some(max_entries) = env_parse::<u64>("STASH_MAX_CACHE_ENTRIES")? {
        config.cache.max_entries = max_entries;
    }
    if let Some(concurrency) = env_parse::<usize>("STASH_MAX_CONCURRENT_DOWNLOADS")? {
        config.dispatcher.max_concurrent_downloads = concurrency;
    }
    if let Some(storage_mb) = env_parse::<u64>("STASH_MAX_DAILY_STORAGE_MB")? {
        config.dispatcher.max_daily_storage_mb = storage_mb;
    }

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `StashError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(StashError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            StashError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    info!(path = %config_path.display(), "loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| StashError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content, format detected by extension.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| StashError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| StashError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(StashError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// Searches the current working directory, up to two parent levels, and
/// the executable's directory. Returns the first config file found.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(vec![
            cwd.join("config.json"),
            cwd.join("config.toml"),
            cwd.join("stash.json"),
            cwd.join("stash.toml"),
            cwd.join("../config.json"),
            cwd.join("../config.toml"),
            cwd.join("../../config.json"),
            cwd.join("../../config.toml"),
        ]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(vec![
                exe_dir.join("config.json"),
                exe_dir.join("config.toml"),
                exe_dir.join("stash.json"),
                exe_dir.join("stash.toml"),
            ]);
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| StashError::Config(format!("Missing required environment variable: {key}")))
}

/// Parse an optional environment variable into `T`
///
/// Absent variables yield `Ok(None)`; present-but-invalid values are an
/// error rather than a silent fallback.
fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| StashError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}
