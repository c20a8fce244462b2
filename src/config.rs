// Configuration
//
// Two sources:
// - Secrets: one file per value (host, user, passwd, kafkaAddr, kafkaTopic)
//   in a mounted directory, /etc/config by default. All are required.
// - Tuning: optional TOML file with environment variable overrides.
//   Loaded from ~/.config/quota-sync/config.toml unless a path is given.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::normalize::DEFAULT_STORAGE_CLASS;
use crate::publisher::RetryConfig;

/// Default directory holding the secret files
pub const DEFAULT_SECRETS_DIR: &str = "/etc/config";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Control-plane HTTP client
    pub http: HttpConfig,

    /// Kafka producer
    pub kafka: KafkaConfig,

    /// Bus write retries
    pub publish: PublishConfig,

    /// Synchronization behaviour
    pub sync: SyncConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// Timeout in seconds for every control-plane request
    pub timeout_secs: u64,

    /// Accept invalid TLS certificates from the control plane
    pub insecure_skip_verify: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            insecure_skip_verify: false,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct KafkaConfig {
    /// Partition every event is written to
    pub partition: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PublishConfig {
    /// Write attempts per event, including the first
    pub max_attempts: usize,

    /// Delay before the first retry in milliseconds
    pub base_delay_ms: u64,

    /// Longest delay between retries in milliseconds
    pub max_delay_ms: u64,

    /// Random delay variation (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
            jitter: 0.1,
        }
    }
}

impl PublishConfig {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .max_attempts(self.max_attempts)
            .base_delay(Duration::from_millis(self.base_delay_ms))
            .max_delay(Duration::from_millis(self.max_delay_ms))
            .jitter(self.jitter)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Directory with the secret files
    pub secrets_dir: PathBuf,

    /// Storage class whose request key appears in zero-usage events
    pub storage_class: String,

    /// Fail the run after the drain if any pair was skipped
    pub fail_on_skipped: bool,

    /// Seconds between runs in daemon mode
    pub interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            secrets_dir: PathBuf::from(DEFAULT_SECRETS_DIR),
            storage_class: DEFAULT_STORAGE_CLASS.to_string(),
            fail_on_skipped: false,
            interval_secs: 300,
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve /metrics in daemon mode
    pub enabled: bool,

    /// Port for metrics server
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

impl Config {
    /// Load configuration from `path`
    ///
    /// A missing file yields the defaults (with environment overrides).
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the resulting configuration is invalid.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|source| ConfigError::FileUnreadable {
                path: path.to_path_buf(),
                source,
            })?;
            let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
            tracing::debug!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Default configuration file path
    ///
    /// Returns `~/.config/quota-sync/config.toml` on Linux
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("io", "kubesphere", "quota-sync") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config").join("quota-sync").join("config.toml")
        }
    }

    /// Apply environment variable overrides
    ///
    /// Environment variables take precedence over config file values:
    /// - QUOTA_SYNC_LOG_LEVEL
    /// - QUOTA_SYNC_LOG_FORMAT
    /// - QUOTA_SYNC_HTTP_TIMEOUT_SECS
    /// - QUOTA_SYNC_INSECURE_SKIP_VERIFY
    /// - QUOTA_SYNC_KAFKA_PARTITION
    /// - QUOTA_SYNC_SECRETS_DIR
    /// - QUOTA_SYNC_STORAGE_CLASS
    /// - QUOTA_SYNC_FAIL_ON_SKIPPED
    /// - QUOTA_SYNC_INTERVAL_SECS
    /// - QUOTA_SYNC_METRICS_ENABLED
    /// - QUOTA_SYNC_METRICS_PORT
    fn apply_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("QUOTA_SYNC_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("QUOTA_SYNC_LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Some(timeout) = lookup("QUOTA_SYNC_HTTP_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                if timeout > 0 {
                    self.http.timeout_secs = timeout;
                }
            }
        }
        if let Some(insecure) = lookup("QUOTA_SYNC_INSECURE_SKIP_VERIFY") {
            self.http.insecure_skip_verify = insecure.parse().unwrap_or(self.http.insecure_skip_verify);
        }

        if let Some(partition) = lookup("QUOTA_SYNC_KAFKA_PARTITION") {
            if let Ok(partition) = partition.parse::<i32>() {
                if partition >= 0 {
                    self.kafka.partition = partition;
                }
            }
        }

        if let Some(dir) = lookup("QUOTA_SYNC_SECRETS_DIR") {
            self.sync.secrets_dir = PathBuf::from(dir);
        }
        if let Some(class) = lookup("QUOTA_SYNC_STORAGE_CLASS") {
            self.sync.storage_class = class;
        }
        if let Some(strict) = lookup("QUOTA_SYNC_FAIL_ON_SKIPPED") {
            self.sync.fail_on_skipped = strict.parse().unwrap_or(self.sync.fail_on_skipped);
        }
        if let Some(interval) = lookup("QUOTA_SYNC_INTERVAL_SECS") {
            if let Ok(interval) = interval.parse::<u64>() {
                if interval > 0 {
                    self.sync.interval_secs = interval;
                }
            }
        }

        if let Some(enabled) = lookup("QUOTA_SYNC_METRICS_ENABLED") {
            self.metrics.enabled = enabled.parse().unwrap_or(self.metrics.enabled);
        }
        if let Some(port) = lookup("QUOTA_SYNC_METRICS_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.metrics.port = port;
            }
        }

        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "Invalid log format: {}. Must be one of: json, pretty, compact",
                    self.logging.format
                )))
            }
        }

        if self.http.timeout_secs == 0 {
            return Err(ConfigError::Invalid("HTTP timeout must be > 0".into()));
        }
        if self.kafka.partition < 0 {
            return Err(ConfigError::Invalid("Kafka partition must be >= 0".into()));
        }
        if self.publish.max_attempts == 0 {
            return Err(ConfigError::Invalid("Publish attempts must be > 0".into()));
        }
        if self.publish.base_delay_ms > self.publish.max_delay_ms {
            return Err(ConfigError::Invalid(
                "Publish base delay must not exceed max delay".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.publish.jitter) {
            return Err(ConfigError::Invalid("Publish jitter must be within 0.0..=1.0".into()));
        }
        if self.sync.storage_class.trim().is_empty() {
            return Err(ConfigError::Invalid("Storage class must not be empty".into()));
        }
        if self.sync.interval_secs == 0 {
            return Err(ConfigError::Invalid("Sync interval must be > 0".into()));
        }
        if self.metrics.port == 0 {
            return Err(ConfigError::Invalid("Metrics port must be > 0".into()));
        }

        Ok(())
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level, ConfigError> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("Failed to parse log level: {}", e)))
    }
}

/// Values mounted as one file each in the secrets directory
#[derive(Clone, PartialEq)]
pub struct Secrets {
    /// Control-plane base URL
    pub host: String,
    pub user: String,
    pub passwd: String,
    /// Comma-separated broker list
    pub kafka_addr: String,
    pub kafka_topic: String,
}

impl Secrets {
    pub const HOST_FILE: &'static str = "host";
    pub const USER_FILE: &'static str = "user";
    pub const PASSWD_FILE: &'static str = "passwd";
    pub const KAFKA_ADDR_FILE: &'static str = "kafkaAddr";
    pub const KAFKA_TOPIC_FILE: &'static str = "kafkaTopic";

    /// Read every secret file from `dir`
    ///
    /// Line breaks are removed from each value.
    ///
    /// # Errors
    ///
    /// Returns an error for the first file that is missing, unreadable or empty.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let secrets = Self {
            host: read_secret(dir, Self::HOST_FILE)?,
            user: read_secret(dir, Self::USER_FILE)?,
            passwd: read_secret(dir, Self::PASSWD_FILE)?,
            kafka_addr: read_secret(dir, Self::KAFKA_ADDR_FILE)?,
            kafka_topic: read_secret(dir, Self::KAFKA_TOPIC_FILE)?,
        };

        url::Url::parse(&secrets.host).map_err(|e| {
            ConfigError::Invalid(format!("Control-plane host {:?} is not a URL: {}", secrets.host, e))
        })?;

        tracing::info!(host = %secrets.host, user = %secrets.user, "loaded control-plane secrets");
        tracing::info!(kafka_addr = %secrets.kafka_addr, kafka_topic = %secrets.kafka_topic, "loaded bus secrets");
        Ok(secrets)
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("passwd", &"<redacted>")
            .field("kafka_addr", &self.kafka_addr)
            .field("kafka_topic", &self.kafka_topic)
            .finish()
    }
}

fn read_secret(dir: &Path, name: &str) -> Result<String, ConfigError> {
    let path = dir.join(name);
    let content = fs::read_to_string(&path).map_err(|source| ConfigError::SecretUnreadable {
        path: path.clone(),
        source,
    })?;

    let value = content.replace(['\n', '\r'], "");
    if value.trim().is_empty() {
        return Err(ConfigError::SecretEmpty(path));
    }
    Ok(value)
}
