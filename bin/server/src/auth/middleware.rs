//! Authentication middleware and extractors for Axum.
//!
//! `require_auth` accepts either an `Authorization: Bearer` access token or
//! the `session_id` cookie and attaches an [`AuthenticatedUser`] to the
//! request. `require_admin` must run after it.

use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use passit_platform_access::{
    AuthenticatedUser, SessionId, SessionUser, User, normalize_identifier,
};
use serde_json::json;
use tracing::{debug, error, warn};

use super::{AppState, SESSION_COOKIE, removal_cookie};

/// Requires an authenticated caller.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&state, &jar, request.headers()).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(rejection) if rejection.clears_session() => {
            (jar.remove(removal_cookie(SESSION_COOKIE)), rejection).into_response()
        }
        Err(rejection) => rejection.into_response(),
    }
}

/// Requires an authenticated admin. Layer it inside `require_auth`.
pub async fn require_admin(request: Request, next: Next) -> Response {
    match request.extensions().get::<AuthenticatedUser>() {
        Some(identity) if identity.is_admin() => next.run(request).await,
        _ => AuthRejection::AdminRequired.into_response(),
    }
}

async fn authenticate(
    state: &AppState,
    jar: &CookieJar,
    headers: &HeaderMap,
) -> Result<AuthenticatedUser, AuthRejection> {
    if let Some(token) = bearer_token(headers) {
        let claims = state.verifier.verify_access_token(token).map_err(|e| {
            debug!(error = %e, "bearer token rejected");
            AuthRejection::InvalidToken
        })?;

        let email = normalize_identifier(claims.email().ok_or(AuthRejection::MissingEmail)?);

        // The admin flag is read live for bearer callers
        let user = state
            .directory
            .find_by_email(&email)
            .await
            .map_err(|e| {
                warn!(error = %e, "user lookup failed for bearer token");
                AuthRejection::UnknownUser
            })?
            .filter(User::is_active)
            .ok_or(AuthRejection::UnknownUser)?;

        return Ok(AuthenticatedUser::from_bearer(
            SessionUser {
                username: user.username().to_string(),
                email: user.email().to_string(),
                is_admin: user.is_admin(),
            },
            claims,
        ));
    }

    let cookie = jar
        .get(SESSION_COOKIE)
        .ok_or(AuthRejection::NotAuthenticated)?;
    let session_id = SessionId::new(cookie.value().to_string());

    let session = match state.sessions.get(&session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => return Err(AuthRejection::InvalidSession),
        Err(e) => {
            error!(error = %e, "session lookup failed");
            return Err(AuthRejection::InvalidSession);
        }
    };

    match state.verifier.verify_access_token(session.access_token()) {
        Ok(claims) => Ok(AuthenticatedUser::from_session(&session, claims)),
        Err(e) => {
            debug!(error = %e, "session access token rejected");
            if let Err(e) = state.sessions.delete(&session_id).await {
                warn!(error = %e, "failed to delete session with invalid token");
            }
            Err(AuthRejection::InvalidSessionToken)
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
}

/// Extractor for the identity attached by `require_auth`.
pub struct CurrentUser(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or(AuthRejection::NotAuthenticated)
    }
}

/// Rejection type for the auth gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    NotAuthenticated,
    /// The session cookie names no live session.
    InvalidSession,
    /// The session's access token no longer verifies.
    InvalidSessionToken,
    InvalidToken,
    MissingEmail,
    UnknownUser,
    AdminRequired,
}

impl AuthRejection {
    /// Returns true if the session cookie should be cleared.
    #[must_use]
    pub fn clears_session(self) -> bool {
        matches!(self, Self::InvalidSession | Self::InvalidSessionToken)
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotAuthenticated => (
                StatusCode::UNAUTHORIZED,
                "Unauthorized - no valid session or token",
            ),
            Self::InvalidSession => (StatusCode::UNAUTHORIZED, "Unauthorized - invalid session"),
            Self::InvalidSessionToken | Self::InvalidToken => {
                (StatusCode::UNAUTHORIZED, "Unauthorized - invalid token")
            }
            Self::MissingEmail => (
                StatusCode::UNAUTHORIZED,
                "Unauthorized - email not found in token",
            ),
            Self::UnknownUser => (StatusCode::UNAUTHORIZED, "Unauthorized - user not found"),
            Self::AdminRequired => (StatusCode::FORBIDDEN, "Forbidden - admin access required"),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
