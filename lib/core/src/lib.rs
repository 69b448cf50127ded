//! Core domain types and utilities for the passit user API.
//!
//! This crate provides the identifier types and the error handling
//! foundation shared by the platform-access library and the server.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ParseIdError, UserId};
