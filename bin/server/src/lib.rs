//! passit user-management API.
//!
//! OIDC login against Keycloak, server-side sessions, and a user service that
//! keeps Keycloak and PostgreSQL in step.

pub mod app;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod health;
pub mod users;
pub mod validation;
