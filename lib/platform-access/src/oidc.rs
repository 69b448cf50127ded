//! OIDC (OpenID Connect) configuration.
//!
//! The identity provider is addressed by a base URL and a realm; the issuer
//! used for discovery is `{base_url}/realms/{realm}`.

use serde::{Deserialize, Serialize};

/// Configuration for the OIDC identity provider.
///
/// Fields with defaults can be omitted when loading from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcConfig {
    /// Provider base URL (e.g., "https://auth.example.com").
    base_url: String,
    /// Realm holding the application's users.
    realm: String,
    /// The OAuth2 client ID registered with the provider.
    client_id: String,
    /// The OAuth2 client secret.
    client_secret: String,
    /// The redirect URI for the OAuth2 callback (e.g., "https://api.example.com/auth/callback").
    redirect_uri: String,
    /// OAuth2 scopes to request as a comma-separated string.
    /// Default: "openid,profile,email"
    #[serde(default = "default_scopes")]
    scopes: String,
    /// Timeout for calls to the provider, in seconds.
    #[serde(default = "default_http_timeout_seconds")]
    http_timeout_seconds: u64,
    /// Accept self-signed provider certificates. Development only.
    #[serde(default)]
    accept_invalid_certs: bool,
}

fn default_scopes() -> String {
    "openid,profile,email".to_string()
}

fn default_http_timeout_seconds() -> u64 {
    10
}

impl OidcConfig {
    /// Creates a new OIDC configuration with defaults for optional fields.
    #[must_use]
    pub fn new(
        base_url: String,
        realm: String,
        client_id: String,
        client_secret: String,
        redirect_uri: String,
    ) -> Self {
        Self {
            base_url,
            realm,
            client_id,
            client_secret,
            redirect_uri,
            scopes: default_scopes(),
            http_timeout_seconds: default_http_timeout_seconds(),
            accept_invalid_certs: false,
        }
    }

    /// Returns the provider base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    #[must_use]
    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Returns the issuer URL used for discovery.
    #[must_use]
    pub fn issuer_url(&self) -> String {
        format!("{}/realms/{}", self.base_url(), self.realm)
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Returns the OAuth2 scopes to request, parsed from comma-separated string.
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        self.scopes
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    #[must_use]
    pub fn http_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.http_timeout_seconds)
    }

    #[must_use]
    pub fn accept_invalid_certs(&self) -> bool {
        self.accept_invalid_certs
    }
}
