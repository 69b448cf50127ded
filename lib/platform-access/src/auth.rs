//! Authentication context types.
//!
//! - `TokenClaims`: untyped claim map of a verified token
//! - `AuthenticatedUser`: identity attached to a request by the auth gate
//! - `LoginInitiation` / `TokenSet`: data exchanged with the provider during login

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AuthenticationError;
use crate::session::{Session, SessionUser};

/// Claims of a verified token, kept as an untyped JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenClaims(Map<String, Value>);

impl TokenClaims {
    #[must_use]
    pub fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    /// Decodes the payload segment of a compact JWT.
    ///
    /// This does not check the signature; call it only on tokens that have
    /// already been verified.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` if the token is not a three-part JWT or its
    /// payload is not a base64url-encoded JSON object.
    pub fn from_jwt_payload(raw: &str) -> Result<Self, Report<AuthenticationError>> {
        let parts: Vec<&str> = raw.split('.').collect();
        if parts.len() != 3 {
            return Err(AuthenticationError::InvalidToken {
                reason: "invalid JWT format".to_string(),
            }
            .into());
        }

        let payload_bytes =
            URL_SAFE_NO_PAD
                .decode(parts[1])
                .map_err(|e| AuthenticationError::InvalidToken {
                    reason: format!("failed to decode JWT payload: {e}"),
                })?;

        let claims: Map<String, Value> = serde_json::from_slice(&payload_bytes).map_err(|e| {
            AuthenticationError::InvalidToken {
                reason: format!("failed to parse JWT payload: {e}"),
            }
        })?;

        Ok(Self(claims))
    }

    /// Returns a string claim.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Returns the `sub` claim.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.get_str("sub")
    }

    /// Returns the `email` claim; an empty string counts as absent.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.get_str("email").filter(|e| !e.is_empty())
    }

    /// Returns the `email` claim or fails when it is absent.
    ///
    /// # Errors
    ///
    /// Returns `MissingClaim` if the token carries no usable email.
    pub fn require_email(&self) -> Result<&str, Report<AuthenticationError>> {
        self.email().ok_or_else(|| {
            AuthenticationError::MissingClaim {
                claim: "email".to_string(),
            }
            .into()
        })
    }

    /// Returns the `preferred_username` claim.
    #[must_use]
    pub fn preferred_username(&self) -> Option<&str> {
        self.get_str("preferred_username")
    }
}

/// How a request proved its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthKind {
    /// `Authorization: Bearer` access token; admin flag read live.
    Bearer,
    /// Session cookie; admin flag from the login-time snapshot.
    Session,
}

/// Identity attached to a request after the auth gate accepted it.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    kind: AuthKind,
    user: SessionUser,
    claims: TokenClaims,
}

impl AuthenticatedUser {
    /// Identity for a browser session, using the session's cached snapshot.
    #[must_use]
    pub fn from_session(session: &Session, claims: TokenClaims) -> Self {
        Self {
            kind: AuthKind::Session,
            user: session.user().clone(),
            claims,
        }
    }

    /// Identity for a bearer token, with the admin flag freshly resolved.
    #[must_use]
    pub fn from_bearer(user: SessionUser, claims: TokenClaims) -> Self {
        Self {
            kind: AuthKind::Bearer,
            user,
            claims,
        }
    }

    /// Returns how the caller authenticated.
    #[must_use]
    pub fn kind(&self) -> AuthKind {
        self.kind
    }

    /// Returns the cached user snapshot.
    #[must_use]
    pub fn user(&self) -> &SessionUser {
        &self.user
    }

    /// Returns the caller's canonical email.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.user.email
    }

    /// Returns the claims of the verified access token.
    #[must_use]
    pub fn claims(&self) -> &TokenClaims {
        &self.claims
    }

    /// Returns whether the caller holds the admin flag.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.is_admin
    }
}

/// Login initiation data for redirecting to the OIDC provider.
#[derive(Debug, Clone)]
pub struct LoginInitiation {
    /// The URL to redirect the user to for authentication.
    pub authorization_url: String,
    /// PKCE code verifier (store securely for the callback).
    pub pkce_verifier: String,
    /// Nonce for ID token validation (store for the callback).
    pub nonce: String,
}

/// Raw tokens returned by the provider's token endpoint.
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access_token: String,
    /// Raw ID token, if the provider returned one.
    pub id_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionId;
    use serde_json::json;

    fn jwt_with_payload(payload: &Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.signature")
    }

    #[test]
    fn decodes_jwt_payload() {
        let raw = jwt_with_payload(&json!({
            "sub": "kc-1",
            "email": "alice@x.com",
            "preferred_username": "alice"
        }));

        let claims = TokenClaims::from_jwt_payload(&raw).expect("decode");

        assert_eq!(claims.subject(), Some("kc-1"));
        assert_eq!(claims.email(), Some("alice@x.com"));
        assert_eq!(claims.preferred_username(), Some("alice"));
    }

    #[test]
    fn rejects_non_jwt() {
        assert!(TokenClaims::from_jwt_payload("opaque-token").is_err());
    }

    #[test]
    fn rejects_non_json_payload() {
        let raw = format!("a.{}.c", URL_SAFE_NO_PAD.encode("not json"));
        assert!(TokenClaims::from_jwt_payload(&raw).is_err());
    }

    #[test]
    fn empty_email_claim_is_absent() {
        let mut map = Map::new();
        map.insert("email".to_string(), json!(""));
        assert!(TokenClaims::new(map).email().is_none());
    }

    #[test]
    fn missing_email_is_reported_as_missing_claim() {
        let err = TokenClaims::default().require_email().unwrap_err();

        assert_eq!(
            err.current_context(),
            &AuthenticationError::MissingClaim {
                claim: "email".to_string()
            }
        );
    }

    #[test]
    fn bearer_identity_carries_live_admin_flag() {
        let identity = AuthenticatedUser::from_bearer(
            SessionUser {
                username: "root".to_string(),
                email: "root@x.com".to_string(),
                is_admin: true,
            },
            TokenClaims::default(),
        );

        assert_eq!(identity.kind(), AuthKind::Bearer);
        assert!(identity.is_admin());
    }

    #[test]
    fn session_identity_uses_snapshot() {
        let session = Session::new(
            SessionId::new("sess".to_string()),
            "a".to_string(),
            "i".to_string(),
            SessionUser {
                username: "alice".to_string(),
                email: "alice@x.com".to_string(),
                is_admin: false,
            },
        );

        let identity = AuthenticatedUser::from_session(&session, TokenClaims::default());

        assert_eq!(identity.kind(), AuthKind::Session);
        assert_eq!(identity.email(), "alice@x.com");
        assert!(!identity.is_admin());
    }
}
