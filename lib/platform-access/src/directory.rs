//! Storage capabilities behind the User Service.
//!
//! `UserDirectory` is the relational store and owns every profile field.
//! `IdentityDirectory` is the identity provider's admin API; it holds the
//! password and mirrors username, email, names and the enabled state.

use async_trait::async_trait;
use passit_core::UserId;
use rootcause::Report;

use crate::error::{DirectoryError, IdentityError};
use crate::user::User;

/// Keyed CRUD over user profiles.
///
/// Lookups return inactive users too; callers decide whether that matters.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Inserts a new profile.
    ///
    /// # Errors
    ///
    /// Returns `Duplicate` if a unique column collides, `Query` otherwise.
    async fn create(&self, user: &User) -> Result<(), Report<DirectoryError>>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, Report<DirectoryError>>;

    /// Email and username lookups ignore case.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Report<DirectoryError>>;

    async fn find_by_username(&self, username: &str)
    -> Result<Option<User>, Report<DirectoryError>>;

    /// Lists active users.
    async fn list(&self) -> Result<Vec<User>, Report<DirectoryError>>;

    /// Lists deactivated users.
    async fn list_inactive(&self) -> Result<Vec<User>, Report<DirectoryError>>;

    /// Overwrites every mutable column of an existing profile.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no row has the user's id.
    async fn update(&self, user: &User) -> Result<(), Report<DirectoryError>>;

    /// Reads the stored identity-provider id of a user.
    async fn provider_id_of(&self, id: UserId) -> Result<Option<String>, Report<DirectoryError>>;

    /// Returns true if any user carries the admin flag.
    async fn any_admin(&self) -> Result<bool, Report<DirectoryError>>;

    /// Checks that the store is reachable.
    async fn ping(&self) -> Result<(), Report<DirectoryError>>;
}

/// Admin operations on the identity provider's user records.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Creates an enabled provider record with a permanent password and
    /// returns the provider-assigned id.
    async fn create_user(&self, user: &User, password: &str)
    -> Result<String, Report<IdentityError>>;

    /// Mirrors username, email, names and the enabled state.
    async fn update_user(&self, provider_id: &str, user: &User)
    -> Result<(), Report<IdentityError>>;

    async fn set_password(&self, provider_id: &str, password: &str)
    -> Result<(), Report<IdentityError>>;

    async fn delete_user(&self, provider_id: &str) -> Result<(), Report<IdentityError>>;
}
