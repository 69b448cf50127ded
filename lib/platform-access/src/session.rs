//! Server-side sessions for browser clients.
//!
//! A session is created when the OAuth callback completes and is referenced
//! by an opaque cookie value. It is never updated in place: it either
//! expires or is deleted at logout.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use rootcause::Report;
use serde::{Deserialize, Serialize};

use crate::error::{AuthenticationError, SessionStoreError};

/// Number of random bytes behind session IDs and OAuth state values.
pub const TOKEN_BYTES: usize = 32;

/// Fixed session lifetime.
pub const SESSION_TTL_MINUTES: i64 = 30;

/// Draws `TOKEN_BYTES` from the operating system RNG and encodes them
/// as unpadded base64url.
///
/// # Errors
///
/// Returns `RandomUnavailable` if the OS random source fails.
pub fn random_token() -> Result<String, Report<AuthenticationError>> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| AuthenticationError::RandomUnavailable {
            reason: e.to_string(),
        })?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Opaque session identifier carried in the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a session ID from an existing string (e.g. a cookie value).
    #[must_use]
    pub fn new(id: String) -> Self {
        Self(id)
    }

    /// Generates a fresh random session ID.
    ///
    /// # Errors
    ///
    /// Returns `RandomUnavailable` if the OS random source fails.
    pub fn generate() -> Result<Self, Report<AuthenticationError>> {
        random_token().map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// User-info snapshot cached in a session.
///
/// `is_admin` is taken at login and not re-read for the session's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub username: String,
    pub email: String,
    pub is_admin: bool,
}

/// An established browser session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    /// Provider-issued access token, re-verified on every request.
    access_token: String,
    /// Raw provider-issued ID token, kept as the logout hint.
    id_token: String,
    user: SessionUser,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Session {
    /// Creates a session that expires after the fixed session lifetime.
    #[must_use]
    pub fn new(id: SessionId, access_token: String, id_token: String, user: SessionUser) -> Self {
        Self::with_duration(
            id,
            access_token,
            id_token,
            user,
            Duration::minutes(SESSION_TTL_MINUTES),
        )
    }

    /// Creates a session with an explicit lifetime.
    #[must_use]
    pub fn with_duration(
        id: SessionId,
        access_token: String,
        id_token: String,
        user: SessionUser,
        duration: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            access_token,
            id_token,
            user,
            created_at: now,
            expires_at: now + duration,
        }
    }

    /// Reconstitutes a session from storage.
    #[must_use]
    pub fn from_parts(
        id: SessionId,
        access_token: String,
        id_token: String,
        user: SessionUser,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            access_token,
            id_token,
            user,
            created_at,
            expires_at,
        }
    }

    /// Returns the session ID.
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Returns the access token captured at login.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns the raw ID token, used as the logout hint.
    #[must_use]
    pub fn id_token(&self) -> &str {
        &self.id_token
    }

    /// Returns the user snapshot taken at login.
    #[must_use]
    pub fn user(&self) -> &SessionUser {
        &self.user
    }

    /// Returns when the session was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the session expires.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns true if the session has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Returns true if the session has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Returns the admin flag from the login-time snapshot.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.is_admin
    }
}

/// Opaque session id to session data.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: &Session) -> Result<(), Report<SessionStoreError>>;

    /// Returns the session, or `None` if it is unknown or expired.
    async fn get(&self, id: &SessionId) -> Result<Option<Session>, Report<SessionStoreError>>;

    /// Removes a session. Deleting an unknown id is not an error.
    async fn delete(&self, id: &SessionId) -> Result<(), Report<SessionStoreError>>;
}
