//! Keycloak admin REST client.
//!
//! Implements [`IdentityDirectory`] against `/admin/realms/{realm}/users`.
//! Every call obtains a fresh admin token with a password grant against the
//! `admin-cli` client.

use async_trait::async_trait;
use passit_platform_access::{IdentityDirectory, IdentityError, OidcConfig, User};
use rootcause::Report;
use serde::{Deserialize, Serialize};
use tracing::{error, instrument};

use crate::config::KeycloakAdminConfig;

const ADMIN_CLIENT_ID: &str = "admin-cli";

/// User representation accepted by the admin API.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserRepresentation<'a> {
    username: &'a str,
    email: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    enabled: bool,
}

impl<'a> UserRepresentation<'a> {
    fn from_user(user: &'a User, enabled: bool) -> Self {
        Self {
            username: user.username(),
            email: user.email(),
            first_name: user.first_name(),
            last_name: user.last_name(),
            enabled,
        }
    }
}

#[derive(Debug, Serialize)]
struct CredentialRepresentation<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'a str,
    temporary: bool,
}

#[derive(Debug, Deserialize)]
struct AdminToken {
    access_token: String,
}

/// Admin API client for a single realm.
pub struct KeycloakAdmin {
    http: reqwest::Client,
    base_url: String,
    realm: String,
    admin_realm: String,
    username: String,
    password: String,
}

impl KeycloakAdmin {
    /// Creates a client for the realm named in `oidc`.
    ///
    /// # Errors
    ///
    /// Returns `AdminLogin` if the HTTP client cannot be built.
    pub fn new(
        oidc: &OidcConfig,
        admin: &KeycloakAdminConfig,
    ) -> Result<Self, Report<IdentityError>> {
        let http = reqwest::Client::builder()
            .timeout(oidc.http_timeout())
            .danger_accept_invalid_certs(oidc.accept_invalid_certs())
            .build()
            .map_err(|e| IdentityError::AdminLogin {
                details: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url: oidc.base_url().to_string(),
            realm: oidc.realm().to_string(),
            admin_realm: admin
                .admin_realm
                .clone()
                .unwrap_or_else(|| oidc.realm().to_string()),
            username: admin.username.clone(),
            password: admin.password.clone(),
        })
    }

    fn users_url(&self) -> String {
        format!("{}/admin/realms/{}/users", self.base_url, self.realm)
    }

    fn user_url(&self, provider_id: &str) -> String {
        format!("{}/{provider_id}", self.users_url())
    }

    async fn admin_token(&self) -> Result<String, Report<IdentityError>> {
        let url = format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.base_url, self.admin_realm
        );
        let params = [
            ("grant_type", "password"),
            ("client_id", ADMIN_CLIENT_ID),
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
        ];

        let response = self
            .http
            .post(url)
            .form(&params)
            .send()
            .await
            .map_err(|e| IdentityError::AdminLogin {
                details: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(IdentityError::AdminLogin {
                details: format!("status {}", response.status()),
            }
            .into());
        }

        let token: AdminToken = response.json().await.map_err(|e| IdentityError::AdminLogin {
            details: format!("invalid token response: {e}"),
        })?;
        Ok(token.access_token)
    }

    async fn reset_password(
        &self,
        token: &str,
        provider_id: &str,
        password: &str,
    ) -> Result<(), Report<IdentityError>> {
        let response = self
            .http
            .put(format!("{}/reset-password", self.user_url(provider_id)))
            .bearer_auth(token)
            .json(&CredentialRepresentation {
                kind: "password",
                value: password,
                temporary: false,
            })
            .send()
            .await
            .map_err(|e| request_failed("set-password", &e))?;

        ensure_success(response, "set-password").await?;
        Ok(())
    }

    async fn remove(&self, token: &str, provider_id: &str) -> Result<(), Report<IdentityError>> {
        let response = self
            .http
            .delete(self.user_url(provider_id))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| request_failed("delete-user", &e))?;

        ensure_success(response, "delete-user").await?;
        Ok(())
    }
}

#[async_trait]
impl IdentityDirectory for KeycloakAdmin {
    #[instrument(skip(self, user, password), fields(username = %user.username()))]
    async fn create_user(
        &self,
        user: &User,
        password: &str,
    ) -> Result<String, Report<IdentityError>> {
        let token = self.admin_token().await?;

        let response = self
            .http
            .post(self.users_url())
            .bearer_auth(&token)
            .json(&UserRepresentation::from_user(user, true))
            .send()
            .await
            .map_err(|e| request_failed("create-user", &e))?;

        let response = ensure_success(response, "create-user").await?;
        let provider_id = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(provider_id_from_location)
            .ok_or(IdentityError::MissingUserId)?;

        // A record without a usable password must not outlive this call
        if let Err(report) = self.reset_password(&token, &provider_id, password).await {
            if let Err(cleanup) = self.remove(&token, &provider_id).await {
                error!(
                    provider_id = %provider_id,
                    error = %cleanup,
                    "failed to remove identity provider user after password failure"
                );
            }
            return Err(report);
        }

        Ok(provider_id)
    }

    #[instrument(skip(self, user))]
    async fn update_user(
        &self,
        provider_id: &str,
        user: &User,
    ) -> Result<(), Report<IdentityError>> {
        let token = self.admin_token().await?;

        let response = self
            .http
            .put(self.user_url(provider_id))
            .bearer_auth(&token)
            .json(&UserRepresentation::from_user(user, user.is_active()))
            .send()
            .await
            .map_err(|e| request_failed("update-user", &e))?;

        ensure_success(response, "update-user").await?;
        Ok(())
    }

    #[instrument(skip(self, password))]
    async fn set_password(
        &self,
        provider_id: &str,
        password: &str,
    ) -> Result<(), Report<IdentityError>> {
        let token = self.admin_token().await?;
        self.reset_password(&token, provider_id, password).await
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, provider_id: &str) -> Result<(), Report<IdentityError>> {
        let token = self.admin_token().await?;
        self.remove(&token, provider_id).await
    }
}

/// Extracts the new user's id from the `Location` header of a create response.
fn provider_id_from_location(location: &str) -> Option<String> {
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

fn request_failed(operation: &'static str, err: &reqwest::Error) -> IdentityError {
    IdentityError::Request {
        operation,
        details: err.to_string(),
    }
}

/// Checks HTTP response status; returns the response on success or an error with details.
async fn ensure_success(
    response: reqwest::Response,
    operation: &'static str,
) -> Result<reqwest::Response, Report<IdentityError>> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(IdentityError::Request {
        operation,
        details: format!("status {status}: {body}"),
    }
    .into())
}
