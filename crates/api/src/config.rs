use domain::services::{IdempotencyPolicy, MissingKeyPolicy, PayloadMismatchPolicy};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub remote: RemoteConfig,
    #[serde(default)]
    pub idempotency: IdempotencyConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Only needed when `idempotency.backend = "postgres"`.
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub base_url: String,

    #[serde(default = "default_base_path")]
    pub base_path: String,

    #[serde(default)]
    pub api_key: String,

    /// Shared secret for `x-internal-signature`; writes go unsigned when empty.
    #[serde(default)]
    pub signing_secret: String,

    #[serde(default = "default_remote_timeout")]
    pub timeout_secs: u64,

    /// Retries after the first rate-limited attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdempotencyBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdempotencyConfig {
    #[serde(default = "default_retention_hours")]
    pub retention_hours: i64,

    #[serde(default)]
    pub missing_key: MissingKeyPolicy,

    #[serde(default)]
    pub payload_mismatch: PayloadMismatchPolicy,

    #[serde(default)]
    pub backend: IdempotencyBackend,

    #[serde(default = "default_purge_interval")]
    pub purge_interval_minutes: u64,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            retention_hours: default_retention_hours(),
            missing_key: MissingKeyPolicy::default(),
            payload_mismatch: PayloadMismatchPolicy::default(),
            backend: IdempotencyBackend::default(),
            purge_interval_minutes: default_purge_interval(),
        }
    }
}

impl IdempotencyConfig {
    pub fn policy(&self) -> IdempotencyPolicy {
        IdempotencyPolicy {
            retention: chrono::Duration::hours(self.retention_hours),
            missing_key: self.missing_key,
            payload_mismatch: self.payload_mismatch,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_type_lookup_ttl")]
    pub type_lookup_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            type_lookup_ttl_secs: default_type_lookup_ttl(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl From<&DatabaseConfig> for persistence::DatabaseConfig {
    fn from(cfg: &DatabaseConfig) -> Self {
        Self {
            url: cfg.url.clone(),
            max_connections: cfg.max_connections,
            min_connections: cfg.min_connections,
            connect_timeout_secs: cfg.connect_timeout_secs,
            idle_timeout_secs: cfg.idle_timeout_secs,
        }
    }
}

// Default value functions
fn default_base_path() -> String {
    "/functions/v1/catalog".to_string()
}
fn default_remote_timeout() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    1000
}
fn default_max_backoff_ms() -> u64 {
    10_000
}
fn default_retention_hours() -> i64 {
    24
}
fn default_purge_interval() -> u64 {
    60
}
fn default_type_lookup_ttl() -> u64 {
    300
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_max_connections() -> u32 {
    10
}
fn default_min_connections() -> u32 {
    1
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with CATALOG__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("CATALOG").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration from embedded defaults plus overrides, without touching the file system.
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [remote]
            base_url = "http://localhost:54321"
            base_path = "/functions/v1/catalog"
            api_key = "test-api-key"
            signing_secret = "test-signing-secret"
            timeout_secs = 30
            max_retries = 3
            backoff_base_ms = 1000
            max_backoff_ms = 10000

            [idempotency]
            retention_hours = 24
            missing_key = "generate"
            payload_mismatch = "replay"
            backend = "memory"
            purge_interval_minutes = 60

            [cache]
            type_lookup_ttl_secs = 300

            [logging]
            level = "info"
            format = "json"
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        // Validation is left to the caller so tests can build partial configs.
        builder.build()?.try_deserialize()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.remote.base_url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "CATALOG__REMOTE__BASE_URL environment variable must be set".to_string(),
            ));
        }
        if !self.remote.base_url.starts_with("http://")
            && !self.remote.base_url.starts_with("https://")
        {
            return Err(ConfigValidationError::InvalidValue(
                "remote.base_url must be an http(s) URL".to_string(),
            ));
        }
        if self.remote.api_key.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "CATALOG__REMOTE__API_KEY environment variable must be set".to_string(),
            ));
        }
        if self.remote.timeout_secs == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "remote.timeout_secs cannot be 0".to_string(),
            ));
        }
        if self.remote.backoff_base_ms > self.remote.max_backoff_ms {
            return Err(ConfigValidationError::InvalidValue(
                "remote.backoff_base_ms cannot exceed remote.max_backoff_ms".to_string(),
            ));
        }
        if self.idempotency.retention_hours <= 0 {
            return Err(ConfigValidationError::InvalidValue(
                "idempotency.retention_hours must be positive".to_string(),
            ));
        }
        if self.idempotency.purge_interval_minutes == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "idempotency.purge_interval_minutes cannot be 0".to_string(),
            ));
        }

        if self.idempotency.backend == IdempotencyBackend::Postgres {
            let db = self.database.as_ref().filter(|db| !db.url.is_empty()).ok_or_else(|| {
                ConfigValidationError::MissingRequired(
                    "CATALOG__DATABASE__URL must be set when idempotency.backend = postgres"
                        .to_string(),
                )
            })?;
            if db.min_connections > db.max_connections {
                return Err(ConfigValidationError::InvalidValue(
                    "min_connections cannot exceed max_connections".to_string(),
                ));
            }
        }

        Ok(())
    }
}
