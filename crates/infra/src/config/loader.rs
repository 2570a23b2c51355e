//! Configuration loader
//!
//! Loads process configuration from environment variables or files. The
//! per-cycle queue settings are not here: those live in the database and
//! are snapshotted at the start of every cycle.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `EKUATIA_DB_PATH`: Database file path
//! - `EKUATIA_DB_POOL_SIZE`: Connection pool size
//! - `EKUATIA_TRANSPORT_TIMEOUT`: Authority request timeout in seconds
//!   (optional, defaults to 30)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./ekuatia.json` or `./ekuatia.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)

use std::path::{Path, PathBuf};

use ekuatia_domain::{Config, DatabaseConfig, EkuatiaError, Result, TransportConfig};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `EkuatiaError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Required fields are missing
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `EkuatiaError::Config` if required variables are missing or have
/// invalid values.
pub fn load_from_env() -> Result<Config> {
    let db_path = env_var("EKUATIA_DB_PATH")?;
    let db_pool_size = env_var("EKUATIA_DB_POOL_SIZE").and_then(|s| {
        s.parse::<u32>().map_err(|e| EkuatiaError::Config(format!("Invalid pool size: {e}")))
    })?;

    let timeout_seconds = match std::env::var("EKUATIA_TRANSPORT_TIMEOUT") {
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|e| EkuatiaError::Config(format!("Invalid transport timeout: {e}")))?,
        Err(_) => TransportConfig::default().timeout_seconds,
    };

    Ok(Config {
        database: DatabaseConfig { path: db_path, pool_size: db_pool_size },
        transport: TransportConfig { timeout_seconds },
    })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `EkuatiaError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File content cannot be parsed
pub fn load_from_file(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => probe_config_paths().ok_or_else(|| {
            EkuatiaError::Config("no configuration file found in probed locations".into())
        })?,
    };

    let contents = std::fs::read_to_string(&path)
        .map_err(|e| EkuatiaError::Config(format!("reading {}: {e}", path.display())))?;

    parse_config(&path, &contents)
}

fn parse_config(path: &Path, contents: &str) -> Result<Config> {
    let is_toml = path.extension().map(|ext| ext == "toml").unwrap_or(false);

    if is_toml {
        toml::from_str(contents)
            .map_err(|e| EkuatiaError::Config(format!("parsing {}: {e}", path.display())))
    } else {
        serde_json::from_str(contents)
            .map_err(|e| EkuatiaError::Config(format!("parsing {}: {e}", path.display())))
    }
}

fn probe_config_paths() -> Option<PathBuf> {
    const CANDIDATES: &[&str] = &[
        "./config.json",
        "./config.toml",
        "./ekuatia.json",
        "./ekuatia.toml",
        "../config.json",
        "../config.toml",
    ];

    CANDIDATES.iter().map(PathBuf::from).find(|p| p.exists())
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| EkuatiaError::Config(format!("missing environment variable {name}")))
}
