//! User endpoints under `/api/users`.
//!
//! Reads are open to any authenticated caller; writes and listings are
//! admin-only (the router applies the gates).

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use chrono::NaiveDate;
use passit_core::UserId;
use passit_platform_access::User;
use serde::Deserialize;
use std::str::FromStr;
use tracing::{debug, info, instrument};

use crate::auth::{AppState, CurrentUser};
use crate::error::ApiError;
use crate::validation::{check_email, check_password, check_username};

/// Query for `GET /api/users/find`.
#[derive(Debug, Deserialize)]
pub struct FindQuery {
    id: Option<String>,
}

/// Query for `GET /api/users/by-email`.
#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    email: Option<String>,
}

/// Body for `POST /api/users`.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    username: String,
    email: String,
    password: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    phone_number: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    is_admin: bool,
}

/// Body for `PUT /api/users/{id}`. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    username: Option<String>,
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    date_of_birth: Option<NaiveDate>,
    phone_number: Option<String>,
    address: Option<String>,
    is_admin: Option<bool>,
    password: Option<String>,
}

fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    UserId::from_str(raw.trim()).map_err(|_| ApiError::validation("invalid user id"))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| ApiError::validation(e.body_text()))
}

/// Returns the caller's own profile.
pub async fn me(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<User>, ApiError> {
    debug!(
        subject = identity.claims().subject().unwrap_or("-"),
        kind = ?identity.kind(),
        "resolving own profile"
    );
    let user = state.users.get_user_by_email(identity.email()).await?;
    Ok(Json(user))
}

/// Looks a user up by internal id.
pub async fn find_by_id(
    State(state): State<AppState>,
    Query(query): Query<FindQuery>,
) -> Result<Json<User>, ApiError> {
    let raw = query
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::validation("id is required"))?;
    let id = parse_user_id(&raw)?;
    let user = state.users.get_user_by_id(id).await?;
    Ok(Json(user))
}

/// Looks a user up by email.
pub async fn find_by_email(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<User>, ApiError> {
    let email = query
        .email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::validation("email is required"))?;
    let user = state.users.get_user_by_email(&email).await?;
    Ok(Json(user))
}

/// Lists active users.
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.users.get_all_users().await?))
}

/// Lists deactivated users.
pub async fn list_inactive(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.users.get_inactive_users().await?))
}

/// Creates a user; unlike signup, the admin flag may be set.
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let request = body(payload)?;

    check_username(&request.username)?;
    check_email(&request.email)?;
    check_password(&request.password)?;

    let mut user = User::new(request.username, request.email)
        .with_names(request.first_name, request.last_name)
        .with_admin(request.is_admin);
    user.set_date_of_birth(request.date_of_birth);
    user.set_phone_number(request.phone_number);
    user.set_address(request.address);

    let created = state.users.create_user(user, &request.password).await?;
    info!(by = admin.email(), user_id = %created.id(), "admin created user");
    Ok((StatusCode::CREATED, Json(created)))
}

/// Applies a partial update and, if given, a new password.
#[instrument(skip_all)]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<User>, ApiError> {
    let id = parse_user_id(&id)?;
    let request = body(payload)?;

    if let Some(password) = request.password.as_deref() {
        check_password(password)?;
    }

    let mut user = state.users.get_user_by_id(id).await?;
    apply_update(&mut user, &request)?;

    state.users.update_user(&user).await?;

    if let Some(password) = request.password.as_deref() {
        state.users.change_password(id, password).await?;
    }

    Ok(Json(user))
}

fn apply_update(user: &mut User, request: &UpdateUserRequest) -> Result<(), ApiError> {
    if let Some(username) = &request.username {
        check_username(username)?;
        user.set_username(username.trim().to_string());
    }
    if let Some(email) = &request.email {
        check_email(email)?;
        user.set_email(email.trim().to_string());
    }
    if let Some(first_name) = &request.first_name {
        user.set_first_name(first_name.clone());
    }
    if let Some(last_name) = &request.last_name {
        user.set_last_name(last_name.clone());
    }
    if request.date_of_birth.is_some() {
        user.set_date_of_birth(request.date_of_birth);
    }
    if let Some(phone_number) = &request.phone_number {
        user.set_phone_number(Some(phone_number.clone()));
    }
    if let Some(address) = &request.address {
        user.set_address(Some(address.clone()));
    }
    if let Some(is_admin) = request.is_admin {
        user.set_admin(is_admin);
    }
    Ok(())
}

/// Soft-deletes a user.
#[instrument(skip_all)]
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_user_id(&id)?;
    let user = state.users.delete_user(id).await?;
    Ok(Json(serde_json::json!({
        "message": "user deactivated",
        "user": user,
    })))
}
