//! In-memory stand-ins for Postgres, Keycloak and the OIDC provider, plus a
//! harness that drives the full router with `oneshot`.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, header},
};
use axum_extra::extract::cookie::Key;
use passit_core::UserId;
use passit_platform_access::{
    AuthenticationError, AuthorizationServer, DirectoryError, IdentityDirectory, IdentityError,
    LoginInitiation, Session, SessionId, SessionStore, SessionStoreError, SessionUser,
    TokenClaims, TokenSet, TokenVerifier, User, UserDirectory, UserService,
};
use passit_server::{
    app,
    auth::{AppState, AuthSettings},
    config::HttpConfig,
};
use rootcause::Report;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tower::ServiceExt;

pub const FRONTEND: &str = "http://localhost:3000";
pub const IDP: &str = "http://idp.test/realms/passit/protocol/openid-connect";

#[derive(Default)]
pub struct MemoryDirectory {
    users: Mutex<HashMap<UserId, User>>,
    pub down: AtomicBool,
    /// Listing never completes while set.
    pub stalled: AtomicBool,
}

impl MemoryDirectory {
    pub fn get(&self, id: UserId) -> Option<User> {
        self.users.lock().unwrap().get(&id).cloned()
    }

    fn check(&self) -> Result<(), Report<DirectoryError>> {
        if self.down.load(Ordering::SeqCst) {
            return Err(DirectoryError::Query {
                details: "connection refused".to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn find(&self, pred: impl Fn(&User) -> bool) -> Option<User> {
        self.users.lock().unwrap().values().find(|u| pred(u)).cloned()
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn create(&self, user: &User) -> Result<(), Report<DirectoryError>> {
        self.check()?;
        let mut users = self.users.lock().unwrap();
        if users
            .values()
            .any(|u| {
                u.email().eq_ignore_ascii_case(user.email())
                    || u.username().eq_ignore_ascii_case(user.username())
            })
        {
            return Err(DirectoryError::Duplicate {
                details: "users_email_key".to_string(),
            }
            .into());
        }
        users.insert(user.id(), user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, Report<DirectoryError>> {
        self.check()?;
        Ok(self.get(id))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Report<DirectoryError>> {
        self.check()?;
        Ok(self.find(|u| u.email().eq_ignore_ascii_case(email.trim())))
    }

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, Report<DirectoryError>> {
        self.check()?;
        Ok(self.find(|u| u.username().eq_ignore_ascii_case(username.trim())))
    }

    async fn list(&self) -> Result<Vec<User>, Report<DirectoryError>> {
        self.check()?;
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let users = self.users.lock().unwrap();
        Ok(users.values().filter(|u| u.is_active()).cloned().collect())
    }

    async fn list_inactive(&self) -> Result<Vec<User>, Report<DirectoryError>> {
        self.check()?;
        let users = self.users.lock().unwrap();
        Ok(users.values().filter(|u| !u.is_active()).cloned().collect())
    }

    async fn update(&self, user: &User) -> Result<(), Report<DirectoryError>> {
        self.check()?;
        let mut users = self.users.lock().unwrap();
        match users.get_mut(&user.id()) {
            Some(stored) => {
                let provider_id = stored.provider_id().map(str::to_string);
                *stored = user.clone();
                if let (None, Some(id)) = (stored.provider_id(), provider_id) {
                    stored.set_provider_id(id);
                }
                Ok(())
            }
            None => Err(DirectoryError::NotFound { id: user.id() }.into()),
        }
    }

    async fn provider_id_of(&self, id: UserId) -> Result<Option<String>, Report<DirectoryError>> {
        self.check()?;
        Ok(self.get(id).and_then(|u| u.provider_id().map(str::to_string)))
    }

    async fn any_admin(&self) -> Result<bool, Report<DirectoryError>> {
        self.check()?;
        Ok(self.users.lock().unwrap().values().any(User::is_admin))
    }

    async fn ping(&self) -> Result<(), Report<DirectoryError>> {
        self.check()
    }
}

/// Keycloak admin API stand-in; records provider ids and passwords.
#[derive(Default)]
pub struct MemoryIdentity {
    records: Mutex<HashMap<String, (bool, String)>>,
    pub fail_create: AtomicBool,
}

impl MemoryIdentity {
    /// Returns `(enabled, password)` for a provider record.
    pub fn record(&self, provider_id: &str) -> Option<(bool, String)> {
        self.records.lock().unwrap().get(provider_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl IdentityDirectory for MemoryIdentity {
    async fn create_user(&self, user: &User, password: &str) -> Result<String, Report<IdentityError>> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(IdentityError::Request {
                operation: "create user",
                details: "status 409".to_string(),
            }
            .into());
        }
        let id = format!("kc-{}", user.username());
        self.records
            .lock()
            .unwrap()
            .insert(id.clone(), (true, password.to_string()));
        Ok(id)
    }

    async fn update_user(&self, provider_id: &str, user: &User) -> Result<(), Report<IdentityError>> {
        if let Some(record) = self.records.lock().unwrap().get_mut(provider_id) {
            record.0 = user.is_active();
        }
        Ok(())
    }

    async fn set_password(&self, provider_id: &str, password: &str) -> Result<(), Report<IdentityError>> {
        if let Some(record) = self.records.lock().unwrap().get_mut(provider_id) {
            record.1 = password.to_string();
        }
        Ok(())
    }

    async fn delete_user(&self, provider_id: &str) -> Result<(), Report<IdentityError>> {
        self.records.lock().unwrap().remove(provider_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySessions {
    sessions: Mutex<HashMap<SessionId, Session>>,
}

impl MemorySessions {
    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.lock().unwrap().contains_key(id)
    }

    pub fn only(&self) -> Option<Session> {
        let sessions = self.sessions.lock().unwrap();
        if sessions.len() == 1 {
            sessions.values().next().cloned()
        } else {
            None
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessions {
    async fn insert(&self, session: &Session) -> Result<(), Report<SessionStoreError>> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id().clone(), session.clone());
        Ok(())
    }

    async fn get(&self, id: &SessionId) -> Result<Option<Session>, Report<SessionStoreError>> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .get(id)
            .filter(|s| !s.is_expired())
            .cloned())
    }

    async fn delete(&self, id: &SessionId) -> Result<(), Report<SessionStoreError>> {
        self.sessions.lock().unwrap().remove(id);
        Ok(())
    }
}

/// Accepts exactly the tokens registered with it.
#[derive(Default)]
pub struct FakeVerifier {
    tokens: Mutex<HashMap<String, TokenClaims>>,
}

impl FakeVerifier {
    pub fn register(&self, raw: &str, claims: Value) {
        let claims = match claims {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.tokens
            .lock()
            .unwrap()
            .insert(raw.to_string(), TokenClaims::new(claims));
    }

    pub fn revoke(&self, raw: &str) {
        self.tokens.lock().unwrap().remove(raw);
    }

    fn lookup(&self, raw: &str) -> Result<TokenClaims, Report<AuthenticationError>> {
        self.tokens.lock().unwrap().get(raw).cloned().ok_or_else(|| {
            AuthenticationError::InvalidToken {
                reason: "unknown token".to_string(),
            }
            .into()
        })
    }
}

impl TokenVerifier for FakeVerifier {
    fn verify_id_token(
        &self,
        raw: &str,
        nonce: &str,
    ) -> Result<TokenClaims, Report<AuthenticationError>> {
        let claims = self.lookup(raw)?;
        match claims.get_str("nonce") {
            Some(expected) if expected != nonce => Err(AuthenticationError::InvalidToken {
                reason: "nonce mismatch".to_string(),
            }
            .into()),
            _ => Ok(claims),
        }
    }

    fn verify_access_token(&self, raw: &str) -> Result<TokenClaims, Report<AuthenticationError>> {
        self.lookup(raw)
    }
}

/// Authorization server whose codes are registered by the test.
#[derive(Default)]
pub struct FakeProvider {
    codes: Mutex<HashMap<String, TokenSet>>,
    exchanges: Mutex<Vec<(String, String)>>,
}

impl FakeProvider {
    pub fn register_code(&self, code: &str, access_token: &str, id_token: Option<&str>) {
        self.codes.lock().unwrap().insert(
            code.to_string(),
            TokenSet {
                access_token: access_token.to_string(),
                id_token: id_token.map(str::to_string),
            },
        );
    }

    /// `(code, pkce_verifier)` pairs seen by the token endpoint.
    pub fn exchanges(&self) -> Vec<(String, String)> {
        self.exchanges.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthorizationServer for FakeProvider {
    fn begin_login(&self, state: &str) -> Result<LoginInitiation, Report<AuthenticationError>> {
        Ok(LoginInitiation {
            authorization_url: format!("{IDP}/auth?state={state}"),
            pkce_verifier: format!("pkce-{state}"),
            nonce: format!("nonce-{state}"),
        })
    }

    async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: &str,
    ) -> Result<TokenSet, Report<AuthenticationError>> {
        self.exchanges
            .lock()
            .unwrap()
            .push((code.to_string(), pkce_verifier.to_string()));
        self.codes.lock().unwrap().get(code).cloned().ok_or_else(|| {
            AuthenticationError::ExchangeFailed {
                reason: "invalid_grant".to_string(),
            }
            .into()
        })
    }

    fn end_session_url(
        &self,
        id_token_hint: &str,
        post_logout_redirect_uri: &str,
    ) -> Result<String, Report<AuthenticationError>> {
        Ok(format!(
            "{IDP}/logout?id_token_hint={id_token_hint}&post_logout_redirect_uri={post_logout_redirect_uri}"
        ))
    }
}

pub struct TestApp {
    pub router: Router,
    pub users: UserService,
    pub directory: Arc<MemoryDirectory>,
    pub identity: Arc<MemoryIdentity>,
    pub sessions: Arc<MemorySessions>,
    pub verifier: Arc<FakeVerifier>,
    pub provider: Arc<FakeProvider>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_http(HttpConfig::default())
    }

    pub fn with_http(http: HttpConfig) -> Self {
        let directory = Arc::new(MemoryDirectory::default());
        let identity = Arc::new(MemoryIdentity::default());
        let sessions = Arc::new(MemorySessions::default());
        let verifier = Arc::new(FakeVerifier::default());
        let provider = Arc::new(FakeProvider::default());

        let state = AppState::new(
            directory.clone(),
            identity.clone(),
            sessions.clone(),
            verifier.clone(),
            provider.clone(),
            AuthSettings {
                frontend_url: FRONTEND.to_string(),
                session_duration: chrono::Duration::minutes(30),
                secure_cookies: false,
            },
            Key::generate(),
        );
        let users = state.users.clone();

        Self {
            router: app::router(state, &http),
            users,
            directory,
            identity,
            sessions,
            verifier,
            provider,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    /// Creates a user through the User Service.
    pub async fn seed_user(&self, username: &str, admin: bool) -> User {
        let user = User::new(username.to_string(), format!("{username}@x.com"))
            .with_names(username.to_string(), "Test".to_string())
            .with_admin(admin);
        self.users.create_user(user, "password123").await.unwrap()
    }

    /// Registers `token` as a valid access token for `user`.
    pub fn access_token_for(&self, user: &User, token: &str) {
        self.verifier.register(
            token,
            json!({
                "sub": user.provider_id(),
                "email": user.email(),
                "preferred_username": user.username(),
            }),
        );
    }

    /// Stores a live session for `user` and returns the cookie header value.
    pub async fn login_as(&self, user: &User) -> String {
        let token = format!("at-{}", user.username());
        self.access_token_for(user, &token);

        let session = Session::new(
            SessionId::generate().unwrap(),
            token,
            format!("id-{}", user.username()),
            SessionUser {
                username: user.username().to_string(),
                email: user.email().to_string(),
                is_admin: user.is_admin(),
            },
        );
        self.sessions.insert(&session).await.unwrap();
        format!("session_id={}", session.id())
    }
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Returns the `name=value` pair of the `Set-Cookie` header for `name`.
pub fn set_cookie(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{name}=")))
        .map(str::to_string)
}

/// Returns true if the response clears the named cookie.
pub fn clears_cookie(response: &Response<Body>, name: &str) -> bool {
    set_cookie(response, name).is_some_and(|c| c.contains("Max-Age=0"))
}

pub fn cookie_pair(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap_or_default().to_string()
}
