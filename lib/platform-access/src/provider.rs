//! OIDC provider capabilities used by the login flow and the auth gate.

use async_trait::async_trait;
use rootcause::Report;

use crate::auth::{LoginInitiation, TokenClaims, TokenSet};
use crate::error::AuthenticationError;

/// Verifies tokens against the provider's signing keys.
pub trait TokenVerifier: Send + Sync {
    /// Verifies an ID token: signature, issuer, audience (the client id),
    /// expiry and the nonce issued at login.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` if any check fails.
    fn verify_id_token(
        &self,
        raw: &str,
        nonce: &str,
    ) -> Result<TokenClaims, Report<AuthenticationError>>;

    /// Verifies an access token: signature, issuer and expiry.
    /// The audience is not checked.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` if any check fails.
    fn verify_access_token(&self, raw: &str) -> Result<TokenClaims, Report<AuthenticationError>>;
}

/// The authorization-code side of the provider.
#[async_trait]
pub trait AuthorizationServer: Send + Sync {
    /// Builds the authorization URL for `state`, with a fresh PKCE
    /// challenge and nonce.
    fn begin_login(&self, state: &str) -> Result<LoginInitiation, Report<AuthenticationError>>;

    /// Exchanges an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns `ExchangeFailed` if the token endpoint rejects the code or
    /// cannot be reached.
    async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: &str,
    ) -> Result<TokenSet, Report<AuthenticationError>>;

    /// Builds the provider logout URL for a session's ID token.
    fn end_session_url(
        &self,
        id_token_hint: &str,
        post_logout_redirect_uri: &str,
    ) -> Result<String, Report<AuthenticationError>>;
}
