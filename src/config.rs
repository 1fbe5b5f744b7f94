//! Configuration file parser for ~/.config/feedrelay/config.toml.
//!
//! The config file is optional and a missing file yields `Config::default()`.
//! Every section is `#[serde(default)]`, so any subset of keys can be given.
//! Unknown keys are accepted but logged as warnings, since they are usually
//! typos.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::content::DEFAULT_WEBPARSER_ENDPOINT;
use crate::feed::{FailurePolicy, IngestStrategy, DEFAULT_CONVERTER_URL};

/// Env var that overrides `[ingest] converter_api_key`.
pub const CONVERTER_API_KEY_ENV: &str = "FEEDRELAY_CONVERTER_API_KEY";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub ingest: IngestConfig,
    pub webparser: WebParserConfig,
    pub enrichment: EnrichmentConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the HTTP server binds to.
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file. `None` means `feeds.db` in the config directory.
    pub path: Option<String>,
}

/// Feed ingestion settings.
///
/// Custom Debug impl masks `converter_api_key`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub strategy: IngestStrategy,
    pub failure_policy: FailurePolicy,
    pub converter_url: String,
    /// Converter API key. The env var takes precedence over this.
    pub converter_api_key: Option<String>,
    /// Maximum items kept per feed (0 = unlimited).
    pub max_items: usize,
    pub timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            strategy: IngestStrategy::default(),
            failure_policy: FailurePolicy::default(),
            converter_url: DEFAULT_CONVERTER_URL.to_string(),
            converter_api_key: None,
            max_items: 0,
            timeout_secs: 30,
        }
    }
}

impl std::fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestConfig")
            .field("strategy", &self.strategy)
            .field("failure_policy", &self.failure_policy)
            .field("converter_url", &self.converter_url)
            .field(
                "converter_api_key",
                &self.converter_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("max_items", &self.max_items)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl IngestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Resolve the converter key: env var first, then the file.
    pub fn api_key(&self) -> Option<SecretString> {
        std::env::var(CONVERTER_API_KEY_ENV)
            .ok()
            .or_else(|| self.converter_api_key.clone())
            .filter(|key| !key.trim().is_empty())
            .map(SecretString::from)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebParserConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for WebParserConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_WEBPARSER_ENDPOINT.to_string(),
            timeout_secs: 30,
        }
    }
}

impl WebParserConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Fetch full article content for every rendered item.
    pub enabled: bool,
    /// Web parser requests in flight per render.
    pub concurrency: usize,
    /// Extracted articles kept in memory.
    pub cache_size: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            concurrency: 8,
            cache_size: 256,
        }
    }
}

const KNOWN_KEYS: &[(&str, &[&str])] = &[
    ("server", &["listen"]),
    ("storage", &["path"]),
    (
        "ingest",
        &[
            "strategy",
            "failure_policy",
            "converter_url",
            "converter_api_key",
            "max_items",
            "timeout_secs",
        ],
    ),
    ("webparser", &["endpoint", "timeout_secs"]),
    ("enrichment", &["enabled", "concurrency", "cache_size"]),
];

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::parse(&content).inspect(|config| {
            tracing::info!(
                path = %path.display(),
                listen = %config.server.listen,
                strategy = %config.ingest.strategy,
                "Loaded configuration"
            );
        })
    }

    /// Parse TOML text. Blank input yields the defaults.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(&raw);
        }

        Ok(toml::from_str(content)?)
    }
}

fn warn_unknown_keys(raw: &toml::Table) {
    for (section, value) in raw {
        let Some((_, keys)) = KNOWN_KEYS.iter().find(|(name, _)| name == section) else {
            tracing::warn!(key = %section, "Unknown section in config file, ignoring");
            continue;
        };
        if let Some(table) = value.as_table() {
            for key in table.keys() {
                if !keys.contains(&key.as_str()) {
                    tracing::warn!(section = %section, key = %key, "Unknown key in config file, ignoring");
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn write_config(name: &str, content: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("feedrelay_config_{}_{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    fn cleanup(path: &Path) {
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.listen, "127.0.0.1:3000");
        assert!(config.storage.path.is_none());
        assert_eq!(config.ingest.strategy, IngestStrategy::Convert);
        assert_eq!(config.ingest.failure_policy, FailurePolicy::Empty);
        assert_eq!(config.ingest.converter_url, DEFAULT_CONVERTER_URL);
        assert_eq!(config.ingest.timeout_secs, 30);
        assert_eq!(config.webparser.endpoint, DEFAULT_WEBPARSER_ENDPOINT);
        assert!(config.enrichment.enabled);
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/feedrelay_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:3000");
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let path = write_config("whitespace", "   \n  \n  ");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.ingest.max_items, 0);
        cleanup(&path);
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let config = Config::parse("[server]\nlisten = \"0.0.0.0:8080\"\n").unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:8080");
        assert_eq!(config.ingest.timeout_secs, 30);
        assert_eq!(config.enrichment.concurrency, 8);
    }

    #[test]
    fn test_full_config() {
        let content = r#"
[server]
listen = "127.0.0.1:4000"

[storage]
path = "/var/lib/feedrelay/feeds.db"

[ingest]
strategy = "direct"
failure_policy = "placeholder"
converter_url = "http://localhost:9000/convert"
converter_api_key = "test-key-123"
max_items = 25
timeout_secs = 10

[webparser]
endpoint = "http://localhost:9000/webparser"
timeout_secs = 5

[enrichment]
enabled = false
concurrency = 2
cache_size = 10
"#;
        let path = write_config("full", content);
        let config = Config::load(&path).unwrap();

        assert_eq!(config.server.listen, "127.0.0.1:4000");
        assert_eq!(config.storage.path.as_deref(), Some("/var/lib/feedrelay/feeds.db"));
        assert_eq!(config.ingest.strategy, IngestStrategy::Direct);
        assert_eq!(config.ingest.failure_policy, FailurePolicy::Placeholder);
        assert_eq!(config.ingest.max_items, 25);
        assert_eq!(config.ingest.timeout(), Duration::from_secs(10));
        assert_eq!(config.ingest.converter_api_key.as_deref(), Some("test-key-123"));
        assert_eq!(config.webparser.endpoint, "http://localhost:9000/webparser");
        assert_eq!(config.webparser.timeout(), Duration::from_secs(5));
        assert!(!config.enrichment.enabled);
        assert_eq!(config.enrichment.cache_size, 10);

        cleanup(&path);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let err = Config::parse("this is not [valid toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_unknown_strategy_returns_error() {
        let result = Config::parse("[ingest]\nstrategy = \"scrape\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let content = r#"
totally_fake_key = "should not fail"

[server]
listen = "127.0.0.1:3001"
typo_key = 1
"#;
        let config = Config::parse(content).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:3001");
    }

    #[test]
    fn test_wrong_type_returns_error() {
        assert!(Config::parse("[enrichment]\nenabled = \"yes\"\n").is_err());
    }

    #[test]
    fn test_too_large_file_rejected() {
        let path = write_config("too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
        cleanup(&path);
    }

    #[test]
    fn test_zero_timeout_clamped() {
        let config = Config::parse("[ingest]\ntimeout_secs = 0\n").unwrap();
        assert_eq!(config.ingest.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_api_key_from_file() {
        // Only meaningful when the env override is absent
        if std::env::var(CONVERTER_API_KEY_ENV).is_ok() {
            return;
        }
        let config = Config::parse("[ingest]\nconverter_api_key = \"file-key\"\n").unwrap();
        let key = config.ingest.api_key().unwrap();
        assert_eq!(key.expose_secret(), "file-key");

        let blank = Config::parse("[ingest]\nconverter_api_key = \"  \"\n").unwrap();
        assert!(blank.ingest.api_key().is_none());
    }

    #[test]
    fn test_debug_masks_api_key() {
        let mut config = Config::default();
        config.ingest.converter_api_key = Some("super-secret-key-12345".to_string());

        let debug_output = format!("{:?}", config);
        assert!(
            !debug_output.contains("super-secret-key-12345"),
            "Debug output should not contain the API key"
        );
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[test]
    fn test_debug_shows_none_when_no_api_key() {
        let debug_output = format!("{:?}", Config::default());
        assert!(!debug_output.contains("[REDACTED]"));
    }
}
