//! Users, sessions and authentication for passit.
//!
//! This crate provides:
//! - The `User` profile and the `UserService` that keeps it consistent
//!   between the identity provider and the relational store
//! - Browser sessions (`Session`, `SessionId`) and the `SessionStore` capability
//! - Verified-token context (`TokenClaims`, `AuthenticatedUser`)
//! - Capability traits for every external collaborator, so that the
//!   service and the HTTP layer can run against in-memory fakes
//!
//! # Example
//!
//! ```
//! use passit_platform_access::{Session, SessionId, SessionUser, User};
//!
//! let user = User::new("alice".to_string(), "alice@example.com".to_string())
//!     .with_names("Alice".to_string(), "Liddell".to_string());
//! assert!(user.is_active());
//! assert!(!user.is_admin());
//!
//! let session = Session::new(
//!     SessionId::new("sess_abc123".to_string()),
//!     "access-token".to_string(),
//!     "id-token".to_string(),
//!     SessionUser {
//!         username: user.username().to_string(),
//!         email: user.email().to_string(),
//!         is_admin: user.is_admin(),
//!     },
//! );
//! assert!(!session.is_expired());
//! ```

pub mod auth;
pub mod directory;
pub mod error;
pub mod oidc;
pub mod provider;
pub mod service;
pub mod session;
pub mod user;

// Re-export main types at crate root
pub use auth::{AuthKind, AuthenticatedUser, LoginInitiation, TokenClaims, TokenSet};
pub use directory::{IdentityDirectory, UserDirectory};
pub use error::{AuthenticationError, DirectoryError, IdentityError, SessionStoreError, UserError};
pub use oidc::OidcConfig;
pub use provider::{AuthorizationServer, TokenVerifier};
pub use service::UserService;
pub use session::{Session, SessionId, SessionStore, SessionUser, random_token};
pub use user::{User, UserRecord, normalize_identifier};
