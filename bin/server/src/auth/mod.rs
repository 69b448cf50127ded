//! Authentication module for the passit server.
//!
//! This module provides:
//! - The OIDC login flow (`/auth/login`, `/auth/callback`, `/auth/logout`)
//!   and self-service signup
//! - Database-backed session and user repositories
//! - The Keycloak admin client that mirrors user records
//! - The auth gate: `require_auth` / `require_admin` middleware
//!
//! # Authorization Model
//!
//! There is a single boolean admin flag. Session requests use the flag
//! cached at login; bearer requests re-read it from the user directory.

pub mod db;
pub mod keycloak;
pub mod middleware;
pub mod oidc;
pub mod routes;

use axum::extract::FromRef;
use axum_extra::extract::cookie::{Cookie, Key, SameSite};
use passit_platform_access::{
    AuthorizationServer, IdentityDirectory, SessionStore, TokenVerifier, UserDirectory,
    UserService,
};
use std::sync::Arc;
use time::Duration as TimeDuration;

pub use keycloak::KeycloakAdmin;
pub use middleware::{AuthRejection, CurrentUser, require_admin, require_auth};
pub use oidc::OidcClient;
pub use routes::{callback, login, logout, signup};

/// Session cookie name.
pub const SESSION_COOKIE: &str = "session_id";

/// OAuth state cookie name (CSRF protection during the OIDC flow).
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

/// Lifetime of the OAuth state cookie.
pub const OAUTH_STATE_MAX_AGE: TimeDuration = TimeDuration::minutes(5);

/// Cookie and redirect settings for the auth flow.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Browser frontend URL, the target of login and logout redirects.
    pub frontend_url: String,
    /// Lifetime of sessions and of the session cookie.
    pub session_duration: chrono::Duration,
    /// Whether to set the Secure flag on cookies.
    pub secure_cookies: bool,
}

impl AuthSettings {
    /// Builds the session cookie.
    pub fn session_cookie(&self, value: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, value))
            .path("/")
            .http_only(true)
            .secure(self.secure_cookies)
            .same_site(SameSite::Lax)
            .max_age(TimeDuration::seconds(self.session_duration.num_seconds()))
            .build()
    }

    /// Builds the OAuth state cookie.
    pub fn oauth_state_cookie(&self, value: String) -> Cookie<'static> {
        Cookie::build((OAUTH_STATE_COOKIE, value))
            .path("/")
            .http_only(true)
            .secure(self.secure_cookies)
            .same_site(SameSite::Lax)
            .max_age(OAUTH_STATE_MAX_AGE)
            .build()
    }
}

/// A cookie that clears `name` when passed to a jar's `remove`.
pub fn removal_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, "")).path("/").build()
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub directory: Arc<dyn UserDirectory>,
    pub sessions: Arc<dyn SessionStore>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub provider: Arc<dyn AuthorizationServer>,
    pub settings: Arc<AuthSettings>,
    cookie_key: Key,
}

impl AppState {
    /// Creates a new application state.
    ///
    /// `cookie_key` signs the OAuth state cookie; it is generated once per
    /// process and never persisted.
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        identity: Arc<dyn IdentityDirectory>,
        sessions: Arc<dyn SessionStore>,
        verifier: Arc<dyn TokenVerifier>,
        provider: Arc<dyn AuthorizationServer>,
        settings: AuthSettings,
        cookie_key: Key,
    ) -> Self {
        Self {
            users: UserService::new(directory.clone(), identity),
            directory,
            sessions,
            verifier,
            provider,
            settings: Arc::new(settings),
            cookie_key,
        }
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> AuthSettings {
        AuthSettings {
            frontend_url: "http://localhost:3000".to_string(),
            session_duration: chrono::Duration::minutes(30),
            secure_cookies: false,
        }
    }

    #[test]
    fn session_cookie_attributes() {
        let cookie = settings().session_cookie("abc".to_string());

        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(TimeDuration::seconds(1800)));
        assert_eq!(cookie.path(), Some("/"));
    }

    #[test]
    fn oauth_state_cookie_lasts_five_minutes() {
        let cookie = settings().oauth_state_cookie("state".to_string());

        assert_eq!(cookie.name(), OAUTH_STATE_COOKIE);
        assert_eq!(cookie.max_age(), Some(TimeDuration::seconds(300)));
        assert_eq!(cookie.secure(), Some(false));
    }
}
