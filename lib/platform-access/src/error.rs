//! Error types for the platform-access crate.
//!
//! Every fallible operation returns one of these enums wrapped in a
//! rootcause `Report`:
//! - `AuthenticationError`: token verification, code exchange, randomness
//! - `UserError`: User Service operations
//! - `DirectoryError`: relational user store failures
//! - `IdentityError`: identity-provider admin API failures
//! - `SessionStoreError`: session store failures

use passit_core::UserId;
use std::fmt;

/// Errors from authentication operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationError {
    /// Token signature or claims validation failed.
    InvalidToken { reason: String },
    /// The token response carried no ID token.
    MissingIdToken,
    /// Authorization code exchange with the provider failed.
    ExchangeFailed { reason: String },
    /// OIDC provider error (discovery, configuration).
    ProviderError { provider: String, reason: String },
    /// Missing required claim in token.
    MissingClaim { claim: String },
    /// The operating system random source failed.
    RandomUnavailable { reason: String },
}

impl fmt::Display for AuthenticationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidToken { reason } => {
                write!(f, "invalid token: {reason}")
            }
            Self::MissingIdToken => {
                write!(f, "no ID token in token response")
            }
            Self::ExchangeFailed { reason } => {
                write!(f, "authorization code exchange failed: {reason}")
            }
            Self::ProviderError { provider, reason } => {
                write!(f, "OIDC provider '{provider}' error: {reason}")
            }
            Self::MissingClaim { claim } => {
                write!(f, "missing required claim: {claim}")
            }
            Self::RandomUnavailable { reason } => {
                write!(f, "random source unavailable: {reason}")
            }
        }
    }
}

impl std::error::Error for AuthenticationError {}

/// Errors from the relational user store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// No row matched the key of a write.
    NotFound { id: UserId },
    /// A unique column (username, email, provider id) already holds the value.
    Duplicate { details: String },
    /// The query failed.
    Query { details: String },
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { id } => write!(f, "user '{id}' not found in directory"),
            Self::Duplicate { details } => write!(f, "duplicate user: {details}"),
            Self::Query { details } => write!(f, "user directory query failed: {details}"),
        }
    }
}

impl std::error::Error for DirectoryError {}

/// Errors from the identity provider's admin API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// Obtaining the admin token failed.
    AdminLogin { details: String },
    /// An admin API request failed or returned an error status.
    Request { operation: &'static str, details: String },
    /// The provider created a user but did not report its identifier.
    MissingUserId,
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdminLogin { details } => {
                write!(f, "identity provider admin login failed: {details}")
            }
            Self::Request { operation, details } => {
                write!(f, "identity provider {operation} failed: {details}")
            }
            Self::MissingUserId => {
                write!(f, "identity provider did not return the new user id")
            }
        }
    }
}

impl std::error::Error for IdentityError {}

/// Errors from the session store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStoreError {
    /// The backing store failed.
    Backend { details: String },
}

impl fmt::Display for SessionStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend { details } => write!(f, "session store error: {details}"),
        }
    }
}

impl std::error::Error for SessionStoreError {}

/// Errors from User Service operations.
///
/// These are the errors the HTTP layer maps onto status codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserError {
    /// No user matched the lookup.
    NotFound { key: String },
    /// Username or email is already registered.
    AlreadyExists { field: &'static str },
    /// The user is already deactivated.
    AlreadyInactive { id: UserId },
    /// The relational store failed.
    Storage { details: String },
    /// The identity provider failed.
    Upstream { details: String },
}

impl fmt::Display for UserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { key } => write!(f, "user '{key}' not found"),
            Self::AlreadyExists { field } => write!(f, "{field} is already registered"),
            Self::AlreadyInactive { id } => write!(f, "user '{id}' is already inactive"),
            Self::Storage { details } => write!(f, "user storage error: {details}"),
            Self::Upstream { details } => write!(f, "identity provider error: {details}"),
        }
    }
}

impl std::error::Error for UserError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_error_invalid_token_display() {
        let err = AuthenticationError::InvalidToken {
            reason: "signature mismatch".to_string(),
        };
        assert!(err.to_string().contains("invalid token"));
        assert!(err.to_string().contains("signature mismatch"));
    }

    #[test]
    fn authentication_error_provider_error_display() {
        let err = AuthenticationError::ProviderError {
            provider: "keycloak".to_string(),
            reason: "connection timeout".to_string(),
        };
        assert!(err.to_string().contains("keycloak"));
        assert!(err.to_string().contains("connection timeout"));
    }

    #[test]
    fn identity_error_names_operation() {
        let err = IdentityError::Request {
            operation: "set-password",
            details: "status 400".to_string(),
        };
        assert!(err.to_string().contains("set-password"));
        assert!(err.to_string().contains("status 400"));
    }

    #[test]
    fn user_error_already_exists_display() {
        let err = UserError::AlreadyExists { field: "email" };
        assert_eq!(err.to_string(), "email is already registered");
    }

    #[test]
    fn directory_error_not_found_display() {
        let id = UserId::new();
        let err = DirectoryError::NotFound { id };
        assert!(err.to_string().contains(&id.to_string()));
    }
}
