//! Authentication routes for login, callback, logout and signup.

use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use axum_extra::extract::{CookieJar, SignedCookieJar, cookie::Cookie};
use openidconnect::url::Url;
use passit_platform_access::{
    Session, SessionId, SessionUser, User, UserError, random_token,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, instrument, warn};

use super::{AppState, OAUTH_STATE_COOKIE, SESSION_COOKIE, removal_cookie};
use crate::error::ApiError;
use crate::validation::{check_email, check_password, check_username};

/// Query parameters for the OIDC callback.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Contents of the signed `oauth_state` cookie.
#[derive(Debug, Serialize, Deserialize)]
struct OAuthStateData {
    state: String,
    pkce_verifier: String,
    nonce: String,
}

/// Builds a 302 redirect.
pub(crate) fn found(location: String) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// Initiates the OIDC login flow by redirecting to the identity provider.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> Result<(SignedCookieJar, Response), AuthError> {
    let state_token = random_token().map_err(|e| AuthError::Internal(e.to_string()))?;
    let initiation = state
        .provider
        .begin_login(&state_token)
        .map_err(|e| AuthError::Internal(e.to_string()))?;

    let cookie_value = serde_json::to_string(&OAuthStateData {
        state: state_token,
        pkce_verifier: initiation.pkce_verifier,
        nonce: initiation.nonce,
    })
    .map_err(|e| AuthError::Internal(e.to_string()))?;

    let jar = jar.add(state.settings.oauth_state_cookie(cookie_value));
    Ok((jar, found(initiation.authorization_url)))
}

/// Handles the OIDC callback after the user authenticates with the identity provider.
///
/// The state cookie is cleared on every path.
#[instrument(skip_all)]
pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    oauth_jar: SignedCookieJar,
    jar: CookieJar,
) -> Response {
    let stored = oauth_jar.get(OAUTH_STATE_COOKIE);
    let oauth_jar = oauth_jar.remove(removal_cookie(OAUTH_STATE_COOKIE));

    if let Some(code) = query.error.as_deref() {
        warn!(
            error = code,
            description = query.error_description.as_deref().unwrap_or(""),
            "identity provider returned an error"
        );
        let target = login_error_url(&state.settings.frontend_url, code);
        return (oauth_jar, found(target)).into_response();
    }

    match complete_login(&state, query, stored).await {
        Ok(session) => {
            let jar = jar.add(
                state
                    .settings
                    .session_cookie(session.id().as_str().to_string()),
            );
            (oauth_jar, jar, found(state.settings.frontend_url.clone())).into_response()
        }
        Err(err) => (oauth_jar, err).into_response(),
    }
}

async fn complete_login(
    state: &AppState,
    query: CallbackQuery,
    stored: Option<Cookie<'static>>,
) -> Result<Session, AuthError> {
    let stored: OAuthStateData = stored
        .and_then(|cookie| serde_json::from_str(cookie.value()).ok())
        .ok_or(AuthError::InvalidState)?;
    let returned = query.state.ok_or(AuthError::InvalidState)?;
    if returned != stored.state {
        return Err(AuthError::InvalidState);
    }

    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AuthError::ExchangeFailed("missing authorization code".to_string()))?;

    let tokens = state
        .provider
        .exchange_code(&code, &stored.pkce_verifier)
        .await
        .map_err(|e| AuthError::ExchangeFailed(e.to_string()))?;

    let raw_id_token = tokens.id_token.ok_or(AuthError::MissingIdToken)?;
    let claims = state
        .verifier
        .verify_id_token(&raw_id_token, &stored.nonce)
        .map_err(|e| AuthError::InvalidIdToken(e.to_string()))?;

    let email = claims
        .require_email()
        .map_err(|e| AuthError::InvalidIdToken(e.to_string()))?
        .to_string();

    let user = state
        .users
        .get_user_by_email(&email)
        .await
        .map_err(|report| match report.current_context() {
            UserError::NotFound { .. } => {
                AuthError::UserLookupFailed(format!("no local user for {email}"))
            }
            _ => AuthError::UserLookupFailed(report.to_string()),
        })?;
    if !user.is_active() {
        return Err(AuthError::UserLookupFailed(format!(
            "user {} is inactive",
            user.id()
        )));
    }

    let username = claims
        .preferred_username()
        .map_or_else(|| user.username().to_string(), str::to_string);

    let session_id = SessionId::generate().map_err(|e| AuthError::Internal(e.to_string()))?;
    let session = Session::with_duration(
        session_id,
        tokens.access_token,
        raw_id_token,
        SessionUser {
            username,
            email: user.email().to_string(),
            is_admin: user.is_admin(),
        },
        state.settings.session_duration,
    );

    state
        .sessions
        .insert(&session)
        .await
        .map_err(|e| AuthError::Internal(e.to_string()))?;

    info!(user_id = %user.id(), "session established");
    Ok(session)
}

fn login_error_url(frontend_url: &str, code: &str) -> String {
    let base = format!("{}/login", frontend_url.trim_end_matches('/'));
    Url::parse_with_params(&base, &[("error", code)])
        .map_or_else(|_| format!("{base}?error=login_failed"), String::from)
}

/// Logs out the user by deleting their session.
///
/// With a live session the browser is sent through the provider's
/// end-session endpoint; otherwise straight back to the frontend.
#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    let frontend = state.settings.frontend_url.clone();
    let mut target = frontend.clone();

    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let session_id = SessionId::new(cookie.value().to_string());

        match state.sessions.get(&session_id).await {
            Ok(Some(session)) => {
                match state
                    .provider
                    .end_session_url(session.id_token(), &frontend)
                {
                    Ok(url) => target = url,
                    Err(e) => warn!(error = %e, "could not build end-session URL"),
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "session lookup failed during logout"),
        }

        if let Err(e) = state.sessions.delete(&session_id).await {
            warn!(error = %e, "failed to delete session during logout");
        }
    }

    (jar.remove(removal_cookie(SESSION_COOKIE)), found(target)).into_response()
}

/// Self-service signup body.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    username: String,
    email: String,
    password: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
}

/// Registers a regular user.
///
/// The admin flag is always off; an existing account is never promoted here.
#[instrument(skip_all)]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::validation(e.body_text()))?;

    check_username(&request.username)?;
    check_email(&request.email)?;
    check_password(&request.password)?;

    let user = User::new(request.username, request.email)
        .with_names(request.first_name, request.last_name)
        .with_admin(false);

    let created = state.users.create_user(user, &request.password).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Authentication flow errors.
#[derive(Debug)]
pub enum AuthError {
    /// The callback state is missing or does not match the cookie.
    InvalidState,
    ExchangeFailed(String),
    MissingIdToken,
    InvalidIdToken(String),
    /// No usable local user for the authenticated identity.
    UserLookupFailed(String),
    Internal(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::InvalidState => (StatusCode::BAD_REQUEST, "Invalid state parameter"),
            Self::ExchangeFailed(msg) => {
                error!(error = %msg, "token exchange failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to exchange token")
            }
            Self::MissingIdToken => {
                error!("token response carried no ID token");
                (StatusCode::INTERNAL_SERVER_ERROR, "No ID token in response")
            }
            Self::InvalidIdToken(msg) => {
                error!(error = %msg, "ID token verification failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to verify ID token")
            }
            Self::UserLookupFailed(msg) => {
                error!(error = %msg, "local user lookup failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to get user info")
            }
            Self::Internal(msg) => {
                error!(error = %msg, "login failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
