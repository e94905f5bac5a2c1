//! Configuration – reads/writes `~/.rangelight/config.toml`.
//!
//! Every field has a default, so a partial (or missing) file is valid.
//! `RANGELIGHT_*` environment variables override selected fields after the
//! file is parsed, see [`apply_env_overrides`].

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rangelight_actuation::ActuationSettings;
use rangelight_cockpit::{DEFAULT_PORT, ServerSettings};
use rangelight_middleware::MqttSettings;
use rangelight_types::Rgb;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write config at {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

/// Persisted configuration stored in `~/.rangelight/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub actuation: ActuationConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// WebSocket port.
    pub port: u16,
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            request_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file. Created (with its schema) when absent.
    pub path: String,
    /// SQL run once at startup, e.g. to load the sensor catalogue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed_file: Option<PathBuf>,
    /// Load the built-in demo catalogue when no seed file is given.
    pub demo_seed: bool,
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "rangelight.db".to_string(),
            seed_file: None,
            demo_seed: true,
            timeout_ms: 5_000,
        }
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// When `false`, publishes are only recorded and logged.
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Stored as plain text; the file is written owner-only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub keep_alive_secs: u64,
    pub publish_timeout_ms: u64,
}

impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("enabled", &self.enabled)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field(
                "password",
                if self.password.is_some() { &"<redacted>" } else { &"<not set>" },
            )
            .field("keep_alive_secs", &self.keep_alive_secs)
            .field("publish_timeout_ms", &self.publish_timeout_ms)
            .finish()
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".to_string(),
            port: 1883,
            client_id: "rangelight-bridge".to_string(),
            username: None,
            password: None,
            keep_alive_secs: 30,
            publish_timeout_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuationConfig {
    pub strip_length: u32,
    pub duration: u32,
    pub strip_prefix: String,
    pub all_on: Rgb,
}

impl Default for ActuationConfig {
    fn default() -> Self {
        let defaults = ActuationSettings::default();
        Self {
            strip_length: defaults.strip_length,
            duration: defaults.duration,
            strip_prefix: defaults.strip_prefix,
            all_on: defaults.all_on,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Readings pushed to every client after each logged reading.
    pub broadcast: usize,
    /// Readings returned by `getLogs`.
    pub logs: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            broadcast: 10,
            logs: 20,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversions into runtime settings
// ─────────────────────────────────────────────────────────────────────────────

impl Config {
    /// Reject values the bridge cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.actuation.strip_length == 0 {
            return Err(ConfigError::Invalid("actuation.strip_length must be at least 1".into()));
        }
        if self.actuation.strip_prefix.is_empty() {
            return Err(ConfigError::Invalid("actuation.strip_prefix must not be empty".into()));
        }
        if self.store.path.is_empty() {
            return Err(ConfigError::Invalid("store.path must not be empty".into()));
        }
        if self.broker.enabled && self.broker.host.is_empty() {
            return Err(ConfigError::Invalid("broker.host must be set when the broker is enabled".into()));
        }
        Ok(())
    }

    pub fn server_settings(&self) -> ServerSettings {
        ServerSettings {
            request_timeout: Duration::from_millis(self.server.request_timeout_ms),
            broadcast_history: self.history.broadcast,
            log_history: self.history.logs,
        }
    }

    pub fn actuation_settings(&self) -> ActuationSettings {
        ActuationSettings {
            strip_length: self.actuation.strip_length,
            duration: self.actuation.duration,
            strip_prefix: self.actuation.strip_prefix.clone(),
            all_on: self.actuation.all_on,
            publish_timeout: Duration::from_millis(self.broker.publish_timeout_ms),
        }
    }

    pub fn mqtt_settings(&self) -> MqttSettings {
        MqttSettings {
            host: self.broker.host.clone(),
            port: self.broker.port,
            client_id: self.broker.client_id.clone(),
            username: self.broker.username.clone(),
            password: self.broker.password.clone(),
            keep_alive: Duration::from_secs(self.broker.keep_alive_secs),
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store.timeout_ms)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Load / save
// ─────────────────────────────────────────────────────────────────────────────

/// Return the config path: `RANGELIGHT_CONFIG` if set, else
/// `~/.rangelight/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("RANGELIGHT_CONFIG") {
        return PathBuf::from(path);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".rangelight").join("config.toml")
}

/// Load the config from disk and apply environment overrides.
/// Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, ConfigError> {
    let Some(mut cfg) = load_from(&config_path())? else {
        return Ok(None);
    };
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Parse the file at `path` as-is.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(toml::from_str(&raw)?))
}

/// Apply `RANGELIGHT_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `RANGELIGHT_PORT` | `server.port` |
/// | `RANGELIGHT_DB` | `store.path` |
/// | `RANGELIGHT_MQTT_ENABLED` | `broker.enabled` (`true`/`false`/`1`/`0`) |
/// | `RANGELIGHT_MQTT_HOST` | `broker.host` |
/// | `RANGELIGHT_MQTT_PORT` | `broker.port` |
/// | `RANGELIGHT_MQTT_PASSWORD` | `broker.password` |
/// | `RANGELIGHT_STRIP_LENGTH` | `actuation.strip_length` |
///
/// Unparseable numbers and flags are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("RANGELIGHT_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.server.port = port;
    }
    if let Ok(v) = std::env::var("RANGELIGHT_DB") {
        cfg.store.path = v;
    }
    if let Ok(v) = std::env::var("RANGELIGHT_MQTT_ENABLED")
        && let Some(enabled) = parse_flag(&v)
    {
        cfg.broker.enabled = enabled;
    }
    if let Ok(v) = std::env::var("RANGELIGHT_MQTT_HOST") {
        cfg.broker.host = v;
    }
    if let Ok(v) = std::env::var("RANGELIGHT_MQTT_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.broker.port = port;
    }
    if let Ok(v) = std::env::var("RANGELIGHT_MQTT_PASSWORD") {
        cfg.broker.password = Some(v);
    }
    if let Ok(v) = std::env::var("RANGELIGHT_STRIP_LENGTH")
        && let Ok(length) = v.parse::<u32>()
    {
        cfg.actuation.strip_length = length;
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Save the config to disk, creating `~/.rangelight/` if necessary.
pub fn save(cfg: &Config) -> Result<(), ConfigError> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(write_err)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(write_err)?;
        }
    }
    let raw = toml::to_string_pretty(cfg)?;
    // Owner-only (rw-------) on Unix: the file may hold the broker password.
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(write_err)?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(write_err)?;
    Ok(())
}
