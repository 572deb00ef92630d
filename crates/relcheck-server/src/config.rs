use std::path::Path;
use std::time::Duration;

use relcheck_core::engine::EngineConfig;
use relcheck_core::model::ModelLimits;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub engine: EngineConfigValues,
    pub model_limits: ModelLimitsConfig,
    pub cache: CacheConfig,
    pub gc: GcConfig,
    pub auth: AuthConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfigValues {
    pub max_depth: usize,
    pub check_timeout_ms: u64,
    pub max_concurrent_checks: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelLimitsConfig {
    pub max_types: usize,
    pub max_relations_per_type: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: u64,
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GcConfig {
    /// Seconds between compaction runs. Zero disables compaction.
    pub interval_secs: u64,
    pub retain_revisions: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// No keys means authentication is off.
    pub api_keys: Vec<ApiKeyEntry>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ApiKeyEntry {
    pub key_id: String,
    pub key_hash: String,
    #[serde(default)]
    pub revoked: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for EngineConfigValues {
    fn default() -> Self {
        Self {
            max_depth: 25,
            check_timeout_ms: 10_000,
            max_concurrent_checks: 10,
        }
    }
}

impl Default for ModelLimitsConfig {
    fn default() -> Self {
        Self {
            max_types: 50,
            max_relations_per_type: 50,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 10_000,
            ttl_secs: 30,
        }
    }
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            retain_revisions: 1_000,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e.to_string()))?;
            toml::from_str::<AppConfig>(&contents)
                .map_err(|e| ConfigError::ParseToml(e.to_string()))?
        } else {
            AppConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("RELCHECK_HTTP_HOST") {
            self.http.host = v;
        }
        if let Ok(v) = std::env::var("RELCHECK_HTTP_PORT")
            && let Ok(port) = v.parse()
        {
            self.http.port = port;
        }
        if let Ok(v) = std::env::var("RELCHECK_ENGINE_MAX_DEPTH")
            && let Ok(n) = v.parse()
        {
            self.engine.max_depth = n;
        }
        if let Ok(v) = std::env::var("RELCHECK_ENGINE_CHECK_TIMEOUT_MS")
            && let Ok(n) = v.parse()
        {
            self.engine.check_timeout_ms = n;
        }
        if let Ok(v) = std::env::var("RELCHECK_CACHE_ENABLED")
            && let Ok(b) = v.parse()
        {
            self.cache.enabled = b;
        }
        if let Ok(v) = std::env::var("RELCHECK_GC_INTERVAL_SECS")
            && let Ok(n) = v.parse()
        {
            self.gc.interval_secs = n;
        }
        if let Ok(v) = std::env::var("RELCHECK_LOG_LEVEL") {
            self.log.level = v;
        }
        if let Ok(v) = std::env::var("RELCHECK_LOG_FORMAT") {
            match v.as_str() {
                "json" => self.log.format = LogFormat::Json,
                "pretty" => self.log.format = LogFormat::Pretty,
                _ => {}
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.http.port == 0 {
            return Err(ConfigError::Validation(
                "http.port must be non-zero".to_string(),
            ));
        }
        if self.engine.max_depth == 0 {
            return Err(ConfigError::Validation(
                "engine.max_depth must be non-zero".to_string(),
            ));
        }
        if self.engine.check_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "engine.check_timeout_ms must be non-zero".to_string(),
            ));
        }
        if self.engine.max_concurrent_checks == 0 {
            return Err(ConfigError::Validation(
                "engine.max_concurrent_checks must be non-zero".to_string(),
            ));
        }
        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(ConfigError::Validation(
                "cache.max_entries must be non-zero when the cache is enabled".to_string(),
            ));
        }
        for entry in &self.auth.api_keys {
            if entry.key_id.is_empty() || entry.key_hash.is_empty() {
                return Err(ConfigError::Validation(
                    "auth.api_keys entries need key_id and key_hash".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_depth: self.engine.max_depth,
            check_timeout: Duration::from_millis(self.engine.check_timeout_ms),
            max_concurrent_checks: self.engine.max_concurrent_checks,
        }
    }

    pub fn to_model_limits(&self) -> ModelLimits {
        ModelLimits {
            max_types: self.model_limits.max_types,
            max_relations_per_type: self.model_limits.max_relations_per_type,
        }
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http.host, self.http.port)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{0}': {1}")]
    ReadFile(String, String),

    #[error("failed to parse TOML config: {0}")]
    ParseToml(String),

    #[error("config validation failed: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_has_sensible_values() {
        let config = AppConfig::default();

        assert_eq!(config.http.host, "0.0.0.0");
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.engine.max_depth, 25);
        assert_eq!(config.engine.check_timeout_ms, 10_000);
        assert!(config.cache.enabled);
        assert!(config.auth.api_keys.is_empty());
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[http]
host = "127.0.0.1"
port = 9090

[engine]
max_depth = 10
check_timeout_ms = 250

[cache]
enabled = false

[gc]
retain_revisions = 5

[[auth.api_keys]]
key_id = "abcd1234"
key_hash = "$argon2id$stub"

[log]
format = "pretty"
level = "debug"
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();

        assert_eq!(config.http.host, "127.0.0.1");
        assert_eq!(config.http.port, 9090);
        assert_eq!(config.engine.max_depth, 10);
        assert_eq!(config.engine.max_concurrent_checks, 10);
        assert!(!config.cache.enabled);
        assert_eq!(config.gc.retain_revisions, 5);
        assert_eq!(config.gc.interval_secs, 60);
        assert_eq!(
            config.auth.api_keys,
            vec![ApiKeyEntry {
                key_id: "abcd1234".to_string(),
                key_hash: "$argon2id$stub".to_string(),
                revoked: false,
            }]
        );
        assert_eq!(config.log.format, LogFormat::Pretty);
        assert_eq!(config.log.level, "debug");
        assert_eq!(
            config.to_engine_config().check_timeout,
            Duration::from_millis(250)
        );
    }

    #[test]
    fn env_vars_override_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[http]
port = 9090
"#
        )
        .unwrap();

        // SAFETY: no other test reads or writes this variable
        unsafe { std::env::set_var("RELCHECK_HTTP_PORT", "8181") };
        let config = AppConfig::load(Some(&path)).unwrap();
        unsafe { std::env::remove_var("RELCHECK_HTTP_PORT") };

        assert_eq!(config.http.port, 8181);
    }

    #[test]
    fn missing_file_is_read_error() {
        let result = AppConfig::load(Some(Path::new("/nonexistent/relcheck.toml")));

        assert!(matches!(result, Err(ConfigError::ReadFile(..))));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[http\nport = ").unwrap();

        assert!(matches!(
            AppConfig::load(Some(&path)),
            Err(ConfigError::ParseToml(_))
        ));
    }

    #[test]
    fn validation_rejects_zero_port() {
        let mut config = AppConfig::default();
        config.http.port = 0;

        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Validation(ref msg)) if msg.contains("port")));
    }

    #[test]
    fn validation_rejects_zero_max_depth() {
        let mut config = AppConfig::default();
        config.engine.max_depth = 0;

        let result = config.validate();
        assert!(
            matches!(result, Err(ConfigError::Validation(ref msg)) if msg.contains("max_depth"))
        );
    }

    #[test]
    fn validation_rejects_zero_timeout() {
        let mut config = AppConfig::default();
        config.engine.check_timeout_ms = 0;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(ref msg)) if msg.contains("check_timeout_ms")
        ));
    }

    #[test]
    fn model_limits_carried_over() {
        let mut config = AppConfig::default();
        config.model_limits.max_types = 3;

        assert_eq!(config.to_model_limits().max_types, 3);
        assert_eq!(config.to_model_limits().max_relations_per_type, 50);
    }
}
