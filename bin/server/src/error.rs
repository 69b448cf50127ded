//! HTTP error type for the JSON API.
//!
//! Handlers return `ApiError`; every variant renders as
//! `{"error": "<short message>"}`. Internal detail is logged here and never
//! sent to the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use passit_platform_access::UserError;
use rootcause::Report;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum ApiError {
    /// The request was malformed or failed validation.
    Validation { message: String },
    NotFound { what: &'static str },
    /// The identity provider failed.
    Upstream { details: String },
    /// The relational store failed.
    Storage { details: String },
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Upstream { .. } | Self::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation { message } => write!(f, "{message}"),
            Self::NotFound { what } => write!(f, "{what} not found"),
            Self::Upstream { details } => write!(f, "identity provider error: {details}"),
            Self::Storage { details } => write!(f, "storage error: {details}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<Report<UserError>> for ApiError {
    fn from(report: Report<UserError>) -> Self {
        match report.current_context() {
            UserError::NotFound { .. } => Self::NotFound { what: "user" },
            UserError::AlreadyExists { field } => Self::validation(format!("{field} already exists")),
            UserError::AlreadyInactive { .. } => Self::validation("user is already inactive"),
            UserError::Storage { .. } => Self::Storage {
                details: report.to_string(),
            },
            UserError::Upstream { .. } => Self::Upstream {
                details: report.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Validation { message } => message.clone(),
            Self::NotFound { what } => format!("{} not found", capitalize(what)),
            Self::Upstream { details } => {
                tracing::error!(error = %details, "identity provider failure");
                "Identity provider error".to_string()
            }
            Self::Storage { details } => {
                tracing::error!(error = %details, "storage failure");
                "Database error".to_string()
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use passit_core::UserId;

    #[test]
    fn user_errors_map_to_statuses() {
        let cases = [
            (
                UserError::NotFound {
                    key: "x".to_string(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                UserError::AlreadyExists { field: "email" },
                StatusCode::BAD_REQUEST,
            ),
            (
                UserError::AlreadyInactive { id: UserId::new() },
                StatusCode::BAD_REQUEST,
            ),
            (
                UserError::Storage {
                    details: "down".to_string(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                UserError::Upstream {
                    details: "503".to_string(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            let report: Report<UserError> = error.into();
            let api = ApiError::from(report);
            assert_eq!(api.status(), status);
        }
    }

    #[tokio::test]
    async fn storage_detail_is_not_leaked() {
        let api = ApiError::Storage {
            details: "connection refused to 10.0.0.5".to_string(),
        };

        let response = api.into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["error"], "Database error");
    }

    #[test]
    fn capitalize_first_letter() {
        assert_eq!(capitalize("user"), "User");
        assert_eq!(capitalize(""), "");
    }
}
