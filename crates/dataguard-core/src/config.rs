use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::DataError;
use crate::retry::{RetryPolicy, RetryPreset};

/// Overrides `database.password` when set.
pub const ENV_DB_PASSWORD: &str = "DATAGUARD_DB_PASSWORD";
/// Overrides `cache.password` when set.
pub const ENV_CACHE_PASSWORD: &str = "DATAGUARD_CACHE_PASSWORD";

/// A credential that is redacted in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Secret(\"\")")
        } else {
            f.write_str("Secret(***)")
        }
    }
}

/// Retry parameters for one store (optional section in config.toml).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Base preset: "conservative" or "aggressive".
    #[serde(default)]
    pub preset: RetryPreset,
    /// Maximum number of attempts (including the first); overrides the preset.
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// First backoff delay in milliseconds; overrides the preset.
    #[serde(default)]
    pub initial_backoff_ms: Option<u64>,
    /// Backoff ceiling in milliseconds; overrides the preset.
    #[serde(default)]
    pub max_backoff_ms: Option<u64>,
}

impl RetryConfig {
    fn apply(&self, base: RetryPolicy<DataError>) -> RetryPolicy<DataError> {
        base.with_overrides(
            self.max_attempts,
            self.initial_backoff_ms.map(Duration::from_millis),
            self.max_backoff_ms.map(Duration::from_millis),
        )
    }
}

/// A read replica; credentials and database name come from the primary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaConfig {
    pub host: String,
    #[serde(default = "default_pg_port")]
    pub port: u16,
}

fn default_pg_port() -> u16 {
    5432
}

/// PostgreSQL connection and pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Secret,
    pub name: String,
    /// disable | allow | prefer | require | verify-ca | verify-full
    pub sslmode: String,
    /// Maximum connections per pool (primary and each replica).
    pub max_connections: u32,
    /// Connections kept open per pool when idle.
    pub min_connections: u32,
    /// Seconds to wait when establishing or acquiring a connection.
    pub connect_timeout_secs: u64,
    /// Server-side statement timeout in seconds; 0 uses the process default.
    pub query_timeout_secs: u64,
    pub replicas: Vec<ReplicaConfig>,
    /// Optional retry policy; if missing, the conservative preset is used.
    pub retry: Option<RetryConfig>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: default_pg_port(),
            user: "postgres".to_string(),
            password: Secret::default(),
            name: "postgres".to_string(),
            sslmode: "disable".to_string(),
            max_connections: 25,
            min_connections: 5,
            connect_timeout_secs: 5,
            query_timeout_secs: 30,
            replicas: Vec::new(),
            retry: None,
        }
    }
}

/// Quote a value for a libpq key/value connection string when needed.
fn dsn_value(v: &str) -> Cow<'_, str> {
    if !v.is_empty() && !v.contains([' ', '\'', '\\']) {
        return Cow::Borrowed(v);
    }
    let escaped = v.replace('\\', "\\\\").replace('\'', "\\'");
    Cow::Owned(format!("'{escaped}'"))
}

impl DatabaseConfig {
    /// Key/value connection string for the primary:
    /// `host=... port=... user=... password=... dbname=... sslmode=...`.
    pub fn dsn(&self) -> String {
        self.dsn_for(&self.host, self.port)
    }

    /// Connection string for `host:port` with the primary's credentials.
    pub fn dsn_for(&self, host: &str, port: u16) -> String {
        format!(
            "host={} port={} user={} password={} dbname={} sslmode={}",
            dsn_value(host),
            port,
            dsn_value(&self.user),
            dsn_value(self.password.expose()),
            dsn_value(&self.name),
            dsn_value(&self.sslmode),
        )
    }

    /// Connection string with the password masked, for logs.
    pub fn dsn_redacted(&self) -> String {
        let mut cfg = self.clone();
        if !cfg.password.is_empty() {
            cfg.password = Secret::new("***");
        }
        cfg.dsn()
    }

    pub fn connect_options(&self) -> Result<PgConnectOptions, DataError> {
        self.connect_options_for(&self.host, self.port)
    }

    pub fn replica_connect_options(
        &self,
        replica: &ReplicaConfig,
    ) -> Result<PgConnectOptions, DataError> {
        self.connect_options_for(&replica.host, replica.port)
    }

    fn connect_options_for(&self, host: &str, port: u16) -> Result<PgConnectOptions, DataError> {
        let ssl_mode: PgSslMode = self
            .sslmode
            .parse()
            .map_err(|_| DataError::Config(format!("invalid sslmode: {}", self.sslmode)))?;
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .username(&self.user)
            .database(&self.name)
            .ssl_mode(ssl_mode);
        if !self.password.is_empty() {
            opts = opts.password(self.password.expose());
        }
        Ok(opts)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy<DataError> {
        let retry = self.retry.clone().unwrap_or_default();
        retry.apply(RetryPolicy::postgres(retry.preset))
    }
}

/// Settings handed to the external circuit breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    pub enabled: bool,
    /// Consecutive failures that open the breaker.
    pub failure_threshold: u32,
    /// Consecutive half-open successes that close it again.
    pub success_threshold: u32,
    /// Seconds the breaker stays open before probing.
    pub timeout_secs: u64,
    /// Seconds between resets of the closed-state failure count.
    pub interval_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            success_threshold: 2,
            timeout_secs: 30,
            interval_secs: 60,
        }
    }
}

impl BreakerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Redis connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub host: String,
    pub port: u16,
    pub password: Secret,
    /// Logical database index.
    pub db: i64,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
    /// Upper bound for a whole `retryable_operation` call, retries included.
    pub operation_timeout_secs: u64,
    /// Optional retry policy; if missing, the conservative preset is used.
    pub retry: Option<RetryConfig>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: Secret::default(),
            db: 0,
            connect_timeout_secs: 5,
            read_timeout_secs: 3,
            write_timeout_secs: 3,
            operation_timeout_secs: 5,
            retry: None,
        }
    }
}

impl CacheConfig {
    /// `redis://[:password@]host:port/db`, with the password percent-encoded.
    pub fn url(&self) -> Result<url::Url, DataError> {
        let raw = format!("redis://{}:{}/{}", self.host, self.port, self.db);
        let mut url = url::Url::parse(&raw)
            .map_err(|e| DataError::Config(format!("invalid cache address {raw}: {e}")))?;
        if !self.password.is_empty() {
            url.set_password(Some(self.password.expose()))
                .map_err(|_| DataError::Config(format!("cannot set password on {raw}")))?;
        }
        Ok(url)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy<DataError> {
        let retry = self.retry.clone().unwrap_or_default();
        retry.apply(RetryPolicy::cache(retry.preset))
    }
}

/// Global configuration loaded from `~/.config/dataguard/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataguardConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl DataguardConfig {
    /// Replace passwords with values from the environment, when present.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(pw) = lookup(ENV_DB_PASSWORD) {
            self.database.password = Secret::new(pw);
        }
        if let Some(pw) = lookup(ENV_CACHE_PASSWORD) {
            self.cache.password = Secret::new(pw);
        }
    }

    /// Copy with every password masked, safe to print.
    pub fn redacted(&self) -> Self {
        let mut cfg = self.clone();
        for secret in [&mut cfg.database.password, &mut cfg.cache.password] {
            if !secret.is_empty() {
                *secret = Secret::new("***");
            }
        }
        cfg
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("dataguard")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<DataguardConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = DataguardConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        let mut cfg = default_cfg;
        cfg.apply_env_overrides();
        return Ok(cfg);
    }
    load_from_path(&path)
}

/// Load configuration from an explicit path.
pub fn load_from_path(path: &Path) -> Result<DataguardConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let mut cfg: DataguardConfig =
        toml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))?;
    cfg.apply_env_overrides();
    Ok(cfg)
}
