//! Centralized server configuration.
//!
//! Loaded via the `config` crate from environment variables, with `__`
//! separating nested keys (e.g. `OIDC__CLIENT_ID`, `SESSION__SECURE_COOKIES`).
//!
//! See [`OidcConfig`](passit_platform_access::OidcConfig) for the identity
//! provider settings.

use passit_platform_access::OidcConfig;
use serde::Deserialize;
use std::time::Duration;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Socket address to listen on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Browser frontend origin; the target of post-login and post-logout
    /// redirects and the only allowed CORS origin.
    pub frontend_url: String,

    #[serde(default)]
    pub session: SessionConfig,

    /// OIDC authentication configuration.
    pub oidc: OidcConfig,

    /// Credentials for the identity provider's admin API.
    pub keycloak_admin: KeycloakAdminConfig,

    #[serde(default)]
    pub bootstrap: BootstrapConfig,

    #[serde(default)]
    pub server: HttpConfig,
}

/// Session-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Session duration in minutes.
    #[serde(default = "default_session_duration_minutes")]
    pub duration_minutes: i64,

    /// Interval between session cleanup runs, in seconds.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    #[serde(default)]
    pub secure_cookies: bool,
}

/// Identity provider admin API credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct KeycloakAdminConfig {
    pub username: String,
    pub password: String,
    /// Realm the admin user lives in. Defaults to the application realm.
    #[serde(default)]
    pub admin_realm: Option<String>,
}

/// Credentials for the first admin account.
///
/// Provisioning is skipped unless all three are set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl BootstrapConfig {
    /// Returns true if every credential is non-empty.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.email.is_empty() && !self.password.is_empty()
    }
}

/// Per-request and shutdown limits.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Time allowed to read a request body, in seconds.
    #[serde(default = "default_read_timeout_seconds")]
    pub read_timeout_seconds: u64,

    /// Total time allowed to process a request, in seconds.
    #[serde(default = "default_write_timeout_seconds")]
    pub write_timeout_seconds: u64,

    /// Time allowed for in-flight requests after a shutdown signal, in seconds.
    #[serde(default = "default_shutdown_grace_seconds")]
    pub shutdown_grace_seconds: u64,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_session_duration_minutes() -> i64 {
    passit_platform_access::session::SESSION_TTL_MINUTES
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

fn default_read_timeout_seconds() -> u64 {
    10
}

fn default_write_timeout_seconds() -> u64 {
    120
}

fn default_shutdown_grace_seconds() -> u64 {
    5
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_minutes: default_session_duration_minutes(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
            secure_cookies: false,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            read_timeout_seconds: default_read_timeout_seconds(),
            write_timeout_seconds: default_write_timeout_seconds(),
            shutdown_grace_seconds: default_shutdown_grace_seconds(),
        }
    }
}

impl HttpConfig {
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_seconds)
    }

    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_seconds)
    }

    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
