//! The User Service: dual-write orchestration between the identity
//! provider and the relational store.
//!
//! Writes are ordered, never two-phase:
//! - create: provider first, then the relational row; a failed row insert
//!   deletes the provider record again
//! - update: relational row first, then a best-effort provider mirror
//! - delete: best-effort provider disable, then a relational soft delete
//!
//! A failed compensation is logged and never replaces the original error.

use std::sync::Arc;

use passit_core::UserId;
use rootcause::Report;
use tracing::{error, info, instrument, warn};

use crate::directory::{IdentityDirectory, UserDirectory};
use crate::error::{DirectoryError, IdentityError, UserError};
use crate::user::{User, normalize_identifier};

/// Orchestrates user reads and writes across both stores.
#[derive(Clone)]
pub struct UserService {
    directory: Arc<dyn UserDirectory>,
    identity: Arc<dyn IdentityDirectory>,
}

impl UserService {
    #[must_use]
    pub fn new(directory: Arc<dyn UserDirectory>, identity: Arc<dyn IdentityDirectory>) -> Self {
        Self {
            directory,
            identity,
        }
    }

    /// Creates a user in the identity provider and then in the relational store.
    ///
    /// Success means both stores hold the user. If the relational insert
    /// fails, the provider record is deleted before the error is returned.
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` if the email or username is taken
    /// - `Upstream` if the provider rejects the new record
    /// - `Storage` if the relational insert fails
    #[instrument(skip(self, user, password), fields(username = %user.username()))]
    pub async fn create_user(
        &self,
        mut user: User,
        password: &str,
    ) -> Result<User, Report<UserError>> {
        if self
            .directory
            .find_by_email(user.email())
            .await
            .map_err(|e| storage_error(&e))?
            .is_some()
        {
            return Err(UserError::AlreadyExists { field: "email" }.into());
        }
        if self
            .directory
            .find_by_username(user.username())
            .await
            .map_err(|e| storage_error(&e))?
            .is_some()
        {
            return Err(UserError::AlreadyExists { field: "username" }.into());
        }

        let provider_id = self
            .identity
            .create_user(&user, password)
            .await
            .map_err(|e| upstream_error(&e))?;
        user.set_provider_id(provider_id.clone());

        if let Err(report) = self.directory.create(&user).await {
            error!(error = %report, "relational insert failed, removing identity provider record");
            if let Err(cleanup) = self.identity.delete_user(&provider_id).await {
                error!(
                    provider_id = %provider_id,
                    error = %cleanup,
                    "failed to remove identity provider record after insert failure"
                );
            }
            return Err(storage_error(&report).into());
        }

        info!(user_id = %user.id(), "user created");
        Ok(user)
    }

    /// Persists a user and mirrors the change to the identity provider.
    ///
    /// A failed mirror is logged and does not fail the call; the relational
    /// store stays authoritative.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no stored user has this id
    /// - `Storage` if the relational write fails, in which case the
    ///   provider is not contacted
    #[instrument(skip(self, user), fields(user_id = %user.id()))]
    pub async fn update_user(&self, user: &User) -> Result<(), Report<UserError>> {
        self.directory
            .update(user)
            .await
            .map_err(|e| storage_error(&e))?;

        let provider_id = match user.provider_id() {
            Some(id) => Some(id.to_string()),
            None => match self.directory.provider_id_of(user.id()).await {
                Ok(id) => id,
                Err(report) => {
                    warn!(error = %report, "could not resolve identity provider id, skipping mirror");
                    None
                }
            },
        };

        match provider_id {
            Some(provider_id) => {
                if let Err(report) = self.identity.update_user(&provider_id, user).await {
                    warn!(
                        provider_id = %provider_id,
                        error = %report,
                        "identity provider mirror failed, relational store keeps the update"
                    );
                }
            }
            None => warn!("user has no identity provider id, skipping mirror"),
        }

        Ok(())
    }

    /// Deactivates a user.
    ///
    /// The provider record is disabled on a best-effort basis, then the
    /// relational row is soft deleted.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no user has this id
    /// - `AlreadyInactive` if the user was already deactivated
    /// - `Storage` if the relational write fails
    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: UserId) -> Result<User, Report<UserError>> {
        let mut user = self.get_user_by_id(id).await?;
        if !user.is_active() {
            return Err(UserError::AlreadyInactive { id }.into());
        }

        user.deactivate();

        match user.provider_id() {
            Some(provider_id) => {
                if let Err(report) = self.identity.update_user(provider_id, &user).await {
                    warn!(
                        provider_id = %provider_id,
                        error = %report,
                        "failed to disable identity provider record"
                    );
                }
            }
            None => warn!("user has no identity provider id, skipping disable"),
        }

        self.directory
            .update(&user)
            .await
            .map_err(|e| storage_error(&e))?;

        info!("user deactivated");
        Ok(user)
    }

    /// Sets a new password on the user's identity-provider record.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no user has this id
    /// - `Upstream` if the user has no provider record or the provider fails
    #[instrument(skip(self, password))]
    pub async fn change_password(&self, id: UserId, password: &str) -> Result<(), Report<UserError>> {
        let user = self.get_user_by_id(id).await?;
        let provider_id = match user.provider_id() {
            Some(provider_id) => provider_id.to_string(),
            None => {
                return Err(UserError::Upstream {
                    details: "user has no identity provider record".to_string(),
                }
                .into());
            }
        };

        self.identity
            .set_password(&provider_id, password)
            .await
            .map_err(|e| upstream_error(&e))?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `NotFound` if no user has this id.
    pub async fn get_user_by_id(&self, id: UserId) -> Result<User, Report<UserError>> {
        self.directory
            .find_by_id(id)
            .await
            .map_err(|e| storage_error(&e))?
            .ok_or_else(|| UserError::NotFound { key: id.to_string() }.into())
    }

    /// # Errors
    ///
    /// Returns `NotFound` if no user has this email.
    pub async fn get_user_by_email(&self, email: &str) -> Result<User, Report<UserError>> {
        let email = normalize_identifier(email);
        self.directory
            .find_by_email(&email)
            .await
            .map_err(|e| storage_error(&e))?
            .ok_or_else(|| UserError::NotFound { key: email }.into())
    }

    pub async fn get_all_users(&self) -> Result<Vec<User>, Report<UserError>> {
        self.directory.list().await.map_err(|e| storage_error(&e).into())
    }

    pub async fn get_inactive_users(&self) -> Result<Vec<User>, Report<UserError>> {
        self.directory
            .list_inactive()
            .await
            .map_err(|e| storage_error(&e).into())
    }

    /// Returns true if any user carries the admin flag.
    pub async fn has_admin(&self) -> Result<bool, Report<UserError>> {
        self.directory
            .any_admin()
            .await
            .map_err(|e| storage_error(&e).into())
    }
}

fn storage_error(report: &Report<DirectoryError>) -> UserError {
    match report.current_context() {
        DirectoryError::NotFound { id } => UserError::NotFound { key: id.to_string() },
        DirectoryError::Duplicate { .. } => UserError::AlreadyExists {
            field: "username or email",
        },
        DirectoryError::Query { details } => UserError::Storage {
            details: details.clone(),
        },
    }
}

fn upstream_error(report: &Report<IdentityError>) -> UserError {
    UserError::Upstream {
        details: report.current_context().to_string(),
    }
}
