//! Configuration system for itemcmp.
//!
//! Uses `figment` for layered configuration: defaults -> user config file -> explicit or
//! working-directory config file -> environment -> CLI args.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Name of the config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "itemcmp.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub idempotency: IdempotencyConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Largest accepted request body.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// `host:port` suitable for `TcpListener::bind`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// JSON file holding the array of items.
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
}

fn default_data_file() -> PathBuf {
    PathBuf::from("data/items.json")
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
        }
    }
}

/// Response cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
    /// Fold the requested field filter into the cache key. When false the key
    /// depends on the ids alone.
    #[serde(default = "default_true")]
    pub key_includes_fields: bool,
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl_secs() -> u64 {
    60
}

fn default_cache_max_entries() -> usize {
    1000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_cache_ttl_secs(),
            max_entries: default_cache_max_entries(),
            key_includes_fields: true,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Idempotency cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_idempotency_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_idempotency_max_entries")]
    pub max_entries: usize,
}

fn default_idempotency_ttl_secs() -> u64 {
    300
}

fn default_idempotency_max_entries() -> usize {
    5000
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_idempotency_ttl_secs(),
            max_entries: default_idempotency_max_entries(),
        }
    }
}

impl IdempotencyConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl AppConfig {
    /// Reject settings that would make a component useless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.request_timeout_secs == 0 {
            return Err(invalid("server.request_timeout_secs must be greater than 0"));
        }
        if self.server.max_body_bytes == 0 {
            return Err(invalid("server.max_body_bytes must be greater than 0"));
        }
        if self.cache.enabled {
            if self.cache.ttl_secs == 0 {
                return Err(invalid("cache.ttl_secs must be greater than 0"));
            }
            if self.cache.max_entries == 0 {
                return Err(invalid("cache.max_entries must be greater than 0"));
            }
        }
        if self.idempotency.enabled {
            if self.idempotency.ttl_secs == 0 {
                return Err(invalid("idempotency.ttl_secs must be greater than 0"));
            }
            if self.idempotency.max_entries == 0 {
                return Err(invalid("idempotency.max_entries must be greater than 0"));
            }
        }
        Ok(())
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid {
        message: message.to_string(),
    }
}

/// Path of the user-level config file, if a home directory is known.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "itemcmp", "itemcmp")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load configuration from all sources, merging in priority order.
///
/// `config_file` replaces the `./itemcmp.toml` lookup when given; it must exist.
pub fn load_config(
    config_file: Option<&Path>,
    overrides: Option<&AppConfig>,
) -> Result<AppConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    // User-level config
    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Explicit or working-directory config
    match config_file {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::FileNotFound {
                    path: path.to_path_buf(),
                });
            }
            figment = figment.merge(Toml::file(path));
        }
        None => {
            let local = Path::new(LOCAL_CONFIG_FILE);
            if local.exists() {
                figment = figment.merge(Toml::file(local));
            }
        }
    }

    // Environment variables (ITEMCMP_SERVER__PORT, ITEMCMP_CACHE__TTL_SECS, etc.)
    figment = figment.merge(Env::prefixed("ITEMCMP_").split("__"));

    // Explicit overrides
    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.max_body_bytes, 65536);
        assert_eq!(config.catalog.data_file, PathBuf::from("data/items.json"));
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.cache.max_entries, 1000);
        assert!(config.cache.key_includes_fields);
        assert_eq!(config.idempotency.ttl(), Duration::from_secs(300));
        assert_eq!(config.idempotency.max_entries, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: AppConfig = toml::from_str("[cache]\nttl_secs = 5\n").unwrap();
        assert_eq!(config.cache.ttl_secs, 5);
        assert_eq!(config.cache.max_entries, 1000);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_load_config_with_overrides() {
        let mut overrides = AppConfig::default();
        overrides.server.port = 9999;
        overrides.cache.enabled = false;

        let config = load_config(None, Some(&overrides)).unwrap();
        assert_eq!(config.server.port, 9999);
        assert!(!config.cache.enabled);
    }

    #[test]
    fn test_load_config_from_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            r#"
[server]
port = 3000

[idempotency]
ttl_secs = 30
"#,
        )
        .unwrap();

        let config = load_config(Some(&path), None).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.idempotency.ttl_secs, 30);
        assert_eq!(config.cache.ttl_secs, 60);
    }

    #[test]
    fn test_load_config_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        match load_config(Some(&missing), None) {
            Err(ConfigError::FileNotFound { path }) => assert_eq!(path, missing),
            other => panic!("Expected FileNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_load_config_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[server]\nport = \"not a number\"\n").unwrap();

        let err = load_config(Some(&path), None).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().starts_with("Configuration parse error:"));
    }

    #[test]
    fn test_validate_rejects_zero_ttl() {
        let mut config = AppConfig::default();
        config.cache.ttl_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cache.ttl_secs"));

        // Disabled caches are not checked.
        config.cache.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_capacity_and_timeout() {
        let mut config = AppConfig::default();
        config.idempotency.max_entries = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.request_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bind_addr() {
        let server = ServerConfig {
            host: "127.0.0.1".into(),
            port: 8081,
            ..Default::default()
        };
        assert_eq!(server.bind_addr(), "127.0.0.1:8081");
    }
}
