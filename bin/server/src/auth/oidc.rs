//! OIDC client implementation using the openidconnect crate.
//!
//! Provider metadata and signing keys are fetched once by discovery; a
//! `CoreClient` is rebuilt from them per call.

use async_trait::async_trait;
use openidconnect::core::{
    CoreAuthenticationFlow, CoreClient, CoreIdToken, CoreProviderMetadata,
};
use openidconnect::url::Url;
use openidconnect::{
    AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointMaybeSet, EndpointNotSet,
    EndpointSet, IssuerUrl, Nonce, OAuth2TokenResponse, PkceCodeChallenge, PkceCodeVerifier,
    RedirectUrl, Scope,
};
use passit_platform_access::{
    AuthenticationError, AuthorizationServer, LoginInitiation, OidcConfig, TokenClaims,
    TokenSet, TokenVerifier,
};
use rootcause::Report;
use std::str::FromStr;
use tracing::{debug, instrument};

const PROVIDER: &str = "keycloak";

type ConfiguredClient = CoreClient<
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointMaybeSet,
    EndpointMaybeSet,
>;

/// OIDC client for authenticating users.
pub struct OidcClient {
    provider_metadata: CoreProviderMetadata,
    client_id: ClientId,
    client_secret: ClientSecret,
    redirect_url: RedirectUrl,
    http_client: reqwest::Client,
    config: OidcConfig,
}

impl OidcClient {
    /// Creates a new OIDC client by discovering the provider metadata.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` if the configuration is invalid or discovery fails.
    pub async fn discover(config: OidcConfig) -> Result<Self, Report<AuthenticationError>> {
        let issuer_url = IssuerUrl::new(config.issuer_url())
            .map_err(|e| provider_error(format!("invalid issuer URL: {e}")))?;

        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.http_timeout())
            .danger_accept_invalid_certs(config.accept_invalid_certs())
            .build()
            .map_err(|e| provider_error(format!("failed to create HTTP client: {e}")))?;

        let provider_metadata = CoreProviderMetadata::discover_async(issuer_url, &http_client)
            .await
            .map_err(|e| provider_error(format!("failed to discover provider: {e}")))?;

        let redirect_url = RedirectUrl::new(config.redirect_uri().to_string())
            .map_err(|e| provider_error(format!("invalid redirect URI: {e}")))?;

        let client_id = ClientId::new(config.client_id().to_string());
        let client_secret = ClientSecret::new(config.client_secret().to_string());

        debug!(issuer = %config.issuer_url(), "discovered OIDC provider");

        Ok(Self {
            provider_metadata,
            client_id,
            client_secret,
            redirect_url,
            http_client,
            config,
        })
    }

    fn client(&self) -> ConfiguredClient {
        CoreClient::from_provider_metadata(
            self.provider_metadata.clone(),
            self.client_id.clone(),
            Some(self.client_secret.clone()),
        )
        .set_redirect_uri(self.redirect_url.clone())
    }
}

impl TokenVerifier for OidcClient {
    fn verify_id_token(
        &self,
        raw: &str,
        nonce: &str,
    ) -> Result<TokenClaims, Report<AuthenticationError>> {
        let id_token = CoreIdToken::from_str(raw).map_err(|e| invalid_token(format!("{e}")))?;

        let client = self.client();
        let nonce = Nonce::new(nonce.to_string());
        id_token
            .claims(&client.id_token_verifier(), &nonce)
            .map_err(|e| invalid_token(format!("ID token validation failed: {e}")))?;

        TokenClaims::from_jwt_payload(raw)
    }

    fn verify_access_token(&self, raw: &str) -> Result<TokenClaims, Report<AuthenticationError>> {
        let token = CoreIdToken::from_str(raw).map_err(|e| invalid_token(format!("{e}")))?;

        let client = self.client();
        let verifier = client.id_token_verifier().require_audience_match(false);
        token
            .claims(&verifier, |_: Option<&Nonce>| -> Result<(), String> { Ok(()) })
            .map_err(|e| invalid_token(format!("access token validation failed: {e}")))?;

        TokenClaims::from_jwt_payload(raw)
    }
}

#[async_trait]
impl AuthorizationServer for OidcClient {
    fn begin_login(&self, state: &str) -> Result<LoginInitiation, Report<AuthenticationError>> {
        let client = self.client();
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let state = state.to_string();
        let mut auth_request = client
            .authorize_url(
                CoreAuthenticationFlow::AuthorizationCode,
                move || CsrfToken::new(state),
                Nonce::new_random,
            )
            .set_pkce_challenge(pkce_challenge);

        // "openid" is always requested
        for scope in self.config.scopes() {
            if scope != "openid" {
                auth_request = auth_request.add_scope(Scope::new(scope.to_string()));
            }
        }

        let (auth_url, _state, nonce) = auth_request.url();

        Ok(LoginInitiation {
            authorization_url: auth_url.to_string(),
            pkce_verifier: pkce_verifier.secret().clone(),
            nonce: nonce.secret().clone(),
        })
    }

    #[instrument(skip_all)]
    async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: &str,
    ) -> Result<TokenSet, Report<AuthenticationError>> {
        let client = self.client();

        let token_request = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .map_err(|e| exchange_failed(format!("token endpoint error: {e}")))?;

        let token_response = token_request
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| exchange_failed(format!("token exchange failed: {e}")))?;

        // The raw ID token is kept verbatim for verification and as the logout hint
        let response_json = serde_json::to_value(&token_response)
            .map_err(|e| exchange_failed(format!("failed to serialize token response: {e}")))?;
        let id_token = response_json
            .get("id_token")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(TokenSet {
            access_token: token_response.access_token().secret().clone(),
            id_token,
        })
    }

    fn end_session_url(
        &self,
        id_token_hint: &str,
        post_logout_redirect_uri: &str,
    ) -> Result<String, Report<AuthenticationError>> {
        let authorization = self.provider_metadata.authorization_endpoint().url().as_str();
        end_session_url_from(authorization, id_token_hint, post_logout_redirect_uri)
    }
}

/// Derives the end-session URL from the authorization endpoint by
/// replacing its trailing `/auth` segment with `/logout`.
fn end_session_url_from(
    authorization_endpoint: &str,
    id_token_hint: &str,
    post_logout_redirect_uri: &str,
) -> Result<String, Report<AuthenticationError>> {
    let trimmed = authorization_endpoint.trim_end_matches('/');
    let base = trimmed.strip_suffix("/auth").unwrap_or(trimmed);
    let url = Url::parse_with_params(
        &format!("{base}/logout"),
        &[
            ("id_token_hint", id_token_hint),
            ("post_logout_redirect_uri", post_logout_redirect_uri),
        ],
    )
    .map_err(|e| provider_error(format!("invalid end-session URL: {e}")))?;
    Ok(url.to_string())
}

fn provider_error(reason: String) -> AuthenticationError {
    AuthenticationError::ProviderError {
        provider: PROVIDER.to_string(),
        reason,
    }
}

fn invalid_token(reason: String) -> AuthenticationError {
    AuthenticationError::InvalidToken { reason }
}

fn exchange_failed(reason: String) -> AuthenticationError {
    AuthenticationError::ExchangeFailed { reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_session_url_replaces_auth_segment() {
        let url = end_session_url_from(
            "https://kc.example.com/realms/passit/protocol/openid-connect/auth",
            "raw.id.token",
            "http://localhost:3000",
        )
        .unwrap();

        let parsed = Url::parse(&url).unwrap();
        assert_eq!(
            parsed.path(),
            "/realms/passit/protocol/openid-connect/logout"
        );
        let params: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(params.contains(&("id_token_hint".to_string(), "raw.id.token".to_string())));
        assert!(params.contains(&(
            "post_logout_redirect_uri".to_string(),
            "http://localhost:3000".to_string()
        )));
    }

    #[test]
    fn end_session_url_without_auth_suffix_appends_logout() {
        let url = end_session_url_from("https://idp.example.com/authorize", "t", "http://f").unwrap();
        assert!(url.starts_with("https://idp.example.com/authorize/logout?"));
    }
}
