//! Configuration loading and resolution
//!
//! Settings resolve with CLI argument → environment variable → TOML config
//! file → compiled default priority. Everything is read once at startup into
//! an explicit [`ServerConfig`] that gets passed to constructors; nothing
//! re-reads configuration while the process is running.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default HTTP bind address
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5780";

/// Default reconciliation cadence (hourly)
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 3600;

/// On-disk TOML configuration (`~/.config/rastro/config.toml`)
///
/// Every field is optional; missing values fall back to environment
/// variables and compiled defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub database_path: Option<String>,
    pub bind_address: Option<String>,
    pub correios_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub jwt_secret: Option<String>,
    pub refresh_interval_secs: Option<u64>,
    pub refresh_enabled: Option<bool>,
}

impl TomlConfig {
    /// Load the TOML config file if one exists, otherwise defaults.
    ///
    /// A missing file is not an error; a file that fails to parse is.
    pub fn load() -> Result<Self> {
        match config_file_path() {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(&path)?;
                toml::from_str(&content).map_err(|e| {
                    Error::Config(format!("Failed to parse {}: {}", path.display(), e))
                })
            }
            _ => Ok(Self::default()),
        }
    }
}

/// Platform config file location (`<config_dir>/rastro/config.toml`)
fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("rastro").join("config.toml"))
}

/// OS-dependent default database location (`<data_dir>/rastro/rastro.db`)
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("rastro"))
        .unwrap_or_else(|| PathBuf::from("./rastro_data"))
        .join("rastro.db")
}

/// Resolved process configuration
///
/// Secrets are held here for the lifetime of the process; there is no
/// hot-reload.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// SQLite database file path
    pub database_path: PathBuf,
    /// HTTP listen address
    pub bind_address: String,
    /// API key for the Correios tracking service
    pub correios_api_key: String,
    /// API key for the Gemini vision model (OCR assist); optional — the
    /// OCR endpoint reports an error when unconfigured
    pub gemini_api_key: Option<String>,
    /// HMAC secret for signing bearer tokens
    pub jwt_secret: String,
    /// Seconds between reconciliation cycles
    pub refresh_interval_secs: u64,
    /// Whether the background refresh service runs at all
    pub refresh_enabled: bool,
}

impl ServerConfig {
    /// Resolve the full configuration.
    ///
    /// `cli_database` and `cli_bind` are command-line overrides and take
    /// highest priority. Required secrets (Correios API key, JWT secret)
    /// produce a descriptive `Error::Config` when absent everywhere.
    pub fn resolve(cli_database: Option<&str>, cli_bind: Option<&str>) -> Result<Self> {
        let toml = TomlConfig::load()?;

        let database_path = cli_database
            .map(PathBuf::from)
            .or_else(|| std::env::var("RASTRO_DATABASE").ok().map(PathBuf::from))
            .or_else(|| toml.database_path.as_ref().map(PathBuf::from))
            .unwrap_or_else(default_database_path);

        let bind_address = cli_bind
            .map(str::to_string)
            .or_else(|| std::env::var("RASTRO_BIND").ok())
            .or_else(|| toml.bind_address.clone())
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let correios_api_key = resolve_secret(
            "RASTRO_CORREIOS_API_KEY",
            toml.correios_api_key.as_deref(),
        )
        .ok_or_else(|| {
            Error::Config(
                "Correios API key not configured. Please configure using one of:\n\
                 1. Environment: RASTRO_CORREIOS_API_KEY=your-key-here\n\
                 2. TOML config: ~/.config/rastro/config.toml (correios_api_key = \"your-key\")"
                    .to_string(),
            )
        })?;

        let jwt_secret = resolve_secret("RASTRO_JWT_SECRET", toml.jwt_secret.as_deref())
            .ok_or_else(|| {
                Error::Config(
                    "JWT secret not configured. Please configure using one of:\n\
                     1. Environment: RASTRO_JWT_SECRET=your-secret-here\n\
                     2. TOML config: ~/.config/rastro/config.toml (jwt_secret = \"your-secret\")"
                        .to_string(),
                )
            })?;

        let gemini_api_key =
            resolve_secret("RASTRO_GEMINI_API_KEY", toml.gemini_api_key.as_deref());

        let refresh_interval_secs = std::env::var("RASTRO_REFRESH_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(toml.refresh_interval_secs)
            .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS);

        let refresh_enabled = toml.refresh_enabled.unwrap_or(true);

        Ok(Self {
            database_path,
            bind_address,
            correios_api_key,
            gemini_api_key,
            jwt_secret,
            refresh_interval_secs,
            refresh_enabled,
        })
    }
}

/// ENV → TOML secret resolution; blank values are treated as unset
fn resolve_secret(env_var: &str, toml_value: Option<&str>) -> Option<String> {
    if let Ok(value) = std::env::var(env_var) {
        if is_valid_key(&value) {
            return Some(value);
        }
    }
    toml_value.filter(|v| is_valid_key(v)).map(str::to_string)
}

/// Validate a key or secret (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_config_parses_all_fields() {
        let config: TomlConfig = toml::from_str(
            r#"
            database_path = "/tmp/rastro.db"
            bind_address = "0.0.0.0:8080"
            correios_api_key = "key-a"
            gemini_api_key = "key-b"
            jwt_secret = "secret"
            refresh_interval_secs = 600
            refresh_enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.database_path.as_deref(), Some("/tmp/rastro.db"));
        assert_eq!(config.bind_address.as_deref(), Some("0.0.0.0:8080"));
        assert_eq!(config.correios_api_key.as_deref(), Some("key-a"));
        assert_eq!(config.gemini_api_key.as_deref(), Some("key-b"));
        assert_eq!(config.jwt_secret.as_deref(), Some("secret"));
        assert_eq!(config.refresh_interval_secs, Some(600));
        assert_eq!(config.refresh_enabled, Some(false));
    }

    #[test]
    fn test_toml_config_all_fields_optional() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert!(config.database_path.is_none());
        assert!(config.correios_api_key.is_none());
    }

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("abc"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   "));
    }

    #[test]
    fn test_resolve_secret_falls_back_to_toml() {
        // Env var intentionally unset for this name
        let value = resolve_secret("RASTRO_TEST_UNSET_SECRET", Some("from-toml"));
        assert_eq!(value.as_deref(), Some("from-toml"));
    }

    #[test]
    fn test_resolve_secret_rejects_blank_toml_value() {
        let value = resolve_secret("RASTRO_TEST_UNSET_SECRET", Some("   "));
        assert!(value.is_none());
    }
}
