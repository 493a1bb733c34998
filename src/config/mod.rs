//! Configuration management.
//!
//! A [`ServiceConfig`] is built once in `main` from defaults, an optional TOML
//! file and environment-style keys (highest precedence), then passed down
//! explicitly. Nothing below `main` reads the process environment.

mod database;

pub use database::{
    ConnectionTarget, DEFAULT_HOST, DEFAULT_NAME, DEFAULT_PASSWORD, DEFAULT_POOL_MAX_SIZE,
    DEFAULT_PORT, DEFAULT_TABLE, DEFAULT_TIMEOUT, DEFAULT_USER, DatabaseSettings,
};

use crate::observability::LogFormat;
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Key/value configuration source (usually a copy of the process environment).
pub type Vars = HashMap<String, String>;

/// Default HTTP bind address.
pub const DEFAULT_BIND: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 5051);

/// Default Prometheus exporter port.
pub const DEFAULT_METRICS_PORT: u16 = 9090;

/// Full service configuration.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    /// Database connection and pool settings.
    pub database: DatabaseSettings,
    /// HTTP server settings.
    pub server: ServerSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
    /// Metrics settings.
    pub metrics: MetricsSettings,
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Address the HTTP listener binds to.
    pub bind: SocketAddr,
    /// Abort startup when schema initialization fails.
    ///
    /// Off by default: a failed initialization is logged and the server keeps
    /// starting, so every request fails until the table exists.
    pub require_schema: bool,
}

/// Logging settings.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// Output format.
    pub format: LogFormat,
    /// `EnvFilter` directive string.
    pub filter: String,
}

/// Metrics settings.
#[derive(Debug, Clone, Copy)]
pub struct MetricsSettings {
    /// Whether the Prometheus exporter is installed.
    pub enabled: bool,
    /// Port for the Prometheus scrape listener.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND,
            require_schema: false,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            filter: "info".to_string(),
        }
    }
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            port: DEFAULT_METRICS_PORT,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Database section.
    pub database: Option<ConfigFileDatabase>,
    /// Server section.
    pub server: Option<ConfigFileServer>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
    /// Metrics section.
    pub metrics: Option<ConfigFileMetrics>,
}

/// Database section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileDatabase {
    /// Combined connection URI.
    pub url: Option<String>,
    /// Host.
    pub host: Option<String>,
    /// Port.
    pub port: Option<u16>,
    /// Database name.
    pub name: Option<String>,
    /// User.
    pub user: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// Snapshot table.
    pub table: Option<String>,
    /// Pool size.
    pub pool_max_size: Option<usize>,
    /// Timeout in seconds.
    pub timeout_secs: Option<u64>,
}

/// Server section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileServer {
    /// Bind address.
    pub bind: Option<String>,
    /// Fail fast on schema initialization errors.
    pub require_schema: Option<bool>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileLogging {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Filter directives.
    pub filter: Option<String>,
}

/// Metrics section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileMetrics {
    /// Enable the exporter.
    pub enabled: Option<bool>,
    /// Scrape port.
    pub port: Option<u16>,
}

impl ServiceConfig {
    /// Loads configuration from the process environment and an optional file.
    ///
    /// The file path comes from `path`, falling back to `CALLSNAP_CONFIG`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or a value is
    /// invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let vars: Vars = std::env::vars().collect();
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| var(&vars, "CALLSNAP_CONFIG").map(PathBuf::from));
        let file = path.as_deref().map(ConfigFile::load).transpose()?;
        Self::from_sources(file, &vars)
    }

    /// Loads configuration from the process environment only.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is invalid.
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Builds configuration from defaults, a parsed file and a key/value source.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is invalid.
    pub fn from_sources(file: Option<ConfigFile>, vars: &Vars) -> Result<Self> {
        let mut config = Self::default();

        if let Some(file) = file {
            if let Some(database) = file.database {
                config.database.apply_file(database);
            }
            if let Some(server) = file.server {
                if let Some(bind) = server.bind {
                    config.server.bind = parse_bind(&bind)?;
                }
                if let Some(v) = server.require_schema {
                    config.server.require_schema = v;
                }
            }
            if let Some(logging) = file.logging {
                if let Some(format) = logging.format {
                    config.logging.format = LogFormat::parse(&format);
                }
                if let Some(filter) = logging.filter {
                    config.logging.filter = filter;
                }
            }
            if let Some(metrics) = file.metrics {
                if let Some(v) = metrics.enabled {
                    config.metrics.enabled = v;
                }
                if let Some(port) = metrics.port {
                    config.metrics.port = port;
                }
            }
        }

        config.database.apply_vars(vars);
        if let Some(bind) = var(vars, "CALLSNAP_BIND") {
            config.server.bind = parse_bind(bind)?;
        }
        if let Some(v) = parse_bool(vars, "CALLSNAP_REQUIRE_SCHEMA") {
            config.server.require_schema = v;
        }
        if let Some(format) = var(vars, "CALLSNAP_LOG_FORMAT") {
            config.logging.format = LogFormat::parse(format);
        }
        if let Some(filter) = var(vars, "RUST_LOG") {
            config.logging.filter = filter.to_string();
        }
        if let Some(v) = parse_bool(vars, "CALLSNAP_METRICS_ENABLED") {
            config.metrics.enabled = v;
        }
        if let Some(port) = parse_var(vars, "CALLSNAP_METRICS_PORT") {
            config.metrics.port = port;
        }

        config.database.validate()?;
        Ok(config)
    }
}

impl ConfigFile {
    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::parse(&contents)
    }

    /// Parses TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid config file.
    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))
    }
}

/// Returns a non-empty, trimmed value for `key`.
pub(crate) fn var<'a>(vars: &'a Vars, key: &str) -> Option<&'a str> {
    vars.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// Returns the value for `key` exactly as given, unless it is blank.
///
/// Used for credentials, where surrounding whitespace is significant.
pub(crate) fn raw_var<'a>(vars: &'a Vars, key: &str) -> Option<&'a str> {
    vars.get(key)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
}

/// Parses a value for `key`. Unparseable input is logged and ignored.
pub(crate) fn parse_var<T: FromStr>(vars: &Vars, key: &str) -> Option<T> {
    let value = var(vars, key)?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(key, value, "Ignoring unparseable configuration value");
            None
        },
    }
}

fn parse_bool(vars: &Vars, key: &str) -> Option<bool> {
    var(vars, key).map(|v| !matches!(v.to_lowercase().as_str(), "false" | "0" | "no" | "off"))
}

fn parse_bind(value: &str) -> Result<SocketAddr> {
    value
        .parse()
        .map_err(|e| Error::Config(format!("invalid bind address '{value}': {e}")))
}
