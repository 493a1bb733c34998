//! Database settings and connection target resolution.
//!
//! # Environment Variables
//!
//! | Variable | Type | Default | Description |
//! |----------|------|---------|-------------|
//! | `DATABASE_URL` | URI | unset | Combined connection URI, wins over every discrete field |
//! | `DB_HOST` | string | `localhost` | Server host or Unix socket directory |
//! | `DB_PORT` | u16 | `5432` | Server port |
//! | `DB_NAME` | string | `postgres` | Database name |
//! | `DB_USER` | string | `postgres` | User name |
//! | `DB_PASSWORD` | string | `postgres` | Password, used as given (not trimmed) |
//! | `CALLSNAP_TABLE` | identifier | `calls` | Snapshot table name |
//! | `CALLSNAP_POOL_MAX_SIZE` | usize | `16` | Maximum pooled connections |
//! | `CALLSNAP_DB_TIMEOUT_SECS` | u64 | `5` | Connect, checkout and statement timeout |

use super::{ConfigFileDatabase, Vars, parse_var, raw_var, var};
use crate::storage::schema::validate_identifier;
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::time::Duration;

/// Default database host.
pub const DEFAULT_HOST: &str = "localhost";
/// Default database port.
pub const DEFAULT_PORT: u16 = 5432;
/// Default database name.
pub const DEFAULT_NAME: &str = "postgres";
/// Default database user.
pub const DEFAULT_USER: &str = "postgres";
/// Default database password.
pub const DEFAULT_PASSWORD: &str = "postgres";
/// Default snapshot table.
pub const DEFAULT_TABLE: &str = "calls";
/// Default maximum pooled connections.
pub const DEFAULT_POOL_MAX_SIZE: usize = 16;
/// Default connect/checkout/statement timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Database configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    /// Combined connection URI. Takes precedence over the discrete fields.
    pub url: Option<SecretString>,
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Database name.
    pub name: String,
    /// User name.
    pub user: String,
    /// Password.
    pub password: SecretString,
    /// Snapshot table name.
    pub table: String,
    /// Maximum pooled connections.
    pub pool_max_size: usize,
    /// Bounded wait for connect, pool checkout and each statement.
    pub timeout: Duration,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            name: DEFAULT_NAME.to_string(),
            user: DEFAULT_USER.to_string(),
            password: SecretString::from(DEFAULT_PASSWORD),
            table: DEFAULT_TABLE.to_string(),
            pool_max_size: DEFAULT_POOL_MAX_SIZE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl DatabaseSettings {
    /// Builds settings from a key/value source over the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the table name is not a plain SQL identifier.
    pub fn from_vars(vars: &Vars) -> Result<Self> {
        let mut settings = Self::default();
        settings.apply_vars(vars);
        settings.validate()?;
        Ok(settings)
    }

    /// Overlays values from the `[database]` section of a config file.
    pub(super) fn apply_file(&mut self, file: ConfigFileDatabase) {
        if let Some(url) = file.url.filter(|u| !u.trim().is_empty()) {
            self.url = Some(SecretString::from(url));
        }
        if let Some(host) = file.host {
            self.host = host;
        }
        if let Some(port) = file.port {
            self.port = port;
        }
        if let Some(name) = file.name {
            self.name = name;
        }
        if let Some(user) = file.user {
            self.user = user;
        }
        if let Some(password) = file.password {
            self.password = SecretString::from(password);
        }
        if let Some(table) = file.table {
            self.table = table;
        }
        if let Some(size) = file.pool_max_size {
            self.pool_max_size = size;
        }
        if let Some(secs) = file.timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }
    }

    /// Overlays values from environment-style keys. Empty values are ignored.
    pub(super) fn apply_vars(&mut self, vars: &Vars) {
        if let Some(url) = raw_var(vars, "DATABASE_URL") {
            self.url = Some(SecretString::from(url));
        }
        if let Some(host) = var(vars, "DB_HOST") {
            self.host = host.to_string();
        }
        if let Some(port) = parse_var(vars, "DB_PORT") {
            self.port = port;
        }
        if let Some(name) = var(vars, "DB_NAME") {
            self.name = name.to_string();
        }
        if let Some(user) = var(vars, "DB_USER") {
            self.user = user.to_string();
        }
        if let Some(password) = raw_var(vars, "DB_PASSWORD") {
            self.password = SecretString::from(password);
        }
        if let Some(table) = var(vars, "CALLSNAP_TABLE") {
            self.table = table.to_string();
        }
        if let Some(size) = parse_var(vars, "CALLSNAP_POOL_MAX_SIZE") {
            self.pool_max_size = size;
        }
        if let Some(secs) = parse_var(vars, "CALLSNAP_DB_TIMEOUT_SECS") {
            self.timeout = Duration::from_secs(secs);
        }
    }

    /// Checks values that would otherwise fail late or unsafely.
    pub(super) fn validate(&self) -> Result<()> {
        validate_identifier(&self.table)?;
        if self.pool_max_size == 0 {
            return Err(Error::Config("pool_max_size must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Resolves the connection target.
    ///
    /// A combined URI is returned verbatim. Otherwise one is assembled from the
    /// discrete fields with user, password and database name percent-encoded
    /// (and the host too when it is a Unix socket directory),
    /// so reserved characters such as `@`, `:` or `/` in a password cannot
    /// change the authority section. Never fails; an unusable target surfaces
    /// as a connectivity error when the store first connects.
    #[must_use]
    pub fn resolve(&self) -> ConnectionTarget {
        if let Some(url) = &self.url {
            return ConnectionTarget { uri: url.clone() };
        }

        // Socket directories are encoded so their slashes stay out of the path.
        let host = if self.host.starts_with('/') {
            urlencoding::encode(&self.host).into_owned()
        } else if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        let uri = format!(
            "postgres://{}:{}@{}:{}/{}",
            urlencoding::encode(&self.user),
            urlencoding::encode(self.password.expose_secret()),
            host,
            self.port,
            urlencoding::encode(&self.name),
        );

        ConnectionTarget {
            uri: SecretString::from(uri),
        }
    }

    /// Returns whether the combined URI is in effect.
    #[must_use]
    pub const fn uses_url(&self) -> bool {
        self.url.is_some()
    }
}

/// Resolved descriptor used to open database connections.
///
/// Immutable once built. `Debug` and `Display` never show the password.
#[derive(Clone)]
pub struct ConnectionTarget {
    uri: SecretString,
}

impl ConnectionTarget {
    /// Returns the connection URI, credentials included.
    #[must_use]
    pub fn uri(&self) -> &str {
        self.uri.expose_secret()
    }

    /// Returns the URI with any password replaced by `***`.
    #[must_use]
    pub fn redacted(&self) -> String {
        redact_uri(self.uri.expose_secret())
    }
}

impl fmt::Debug for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionTarget")
            .field("uri", &self.redacted())
            .finish()
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

/// Masks the password in the authority section of a URI.
///
/// Key/value style targets (`host=... password=...`) are masked by key.
fn redact_uri(uri: &str) -> String {
    if let Some((scheme, rest)) = uri.split_once("://") {
        let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());
        let (authority, tail) = rest.split_at(authority_end);
        // Userinfo ends at the last '@'; encoded passwords never contain a raw one.
        if let Some(at) = authority.rfind('@') {
            let (userinfo, host) = authority.split_at(at);
            if let Some((user, _)) = userinfo.split_once(':') {
                return format!("{scheme}://{user}:***{host}{tail}");
            }
        }
        return uri.to_string();
    }

    uri.split_whitespace()
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if key.eq_ignore_ascii_case("password") => format!("{key}=***"),
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
