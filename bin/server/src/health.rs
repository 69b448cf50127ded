//! Liveness endpoint backed by a database ping.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use tracing::error;

use crate::auth::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    status: &'static str,
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Health>) {
    match state.directory.ping().await {
        Ok(()) => (StatusCode::OK, Json(Health { status: "up" })),
        Err(e) => {
            error!(error = %e, "database ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(Health { status: "down" }),
            )
        }
    }
}
