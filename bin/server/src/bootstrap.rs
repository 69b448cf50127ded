//! First-admin provisioning at start-up.

use passit_platform_access::{User, UserService};
use tracing::{info, instrument, warn};

use crate::config::BootstrapConfig;

/// What start-up provisioning did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// An admin already existed.
    AdminPresent,
    /// No admin exists and the bootstrap credentials are incomplete.
    MissingCredentials,
    Created { username: String },
    /// Provisioning failed; start-up continues.
    Failed { reason: String },
}

/// Creates the first admin account if none exists.
///
/// Never fails start-up: every problem is logged and reported in the outcome.
#[instrument(skip_all)]
pub async fn ensure_admin(users: &UserService, credentials: &BootstrapConfig) -> BootstrapOutcome {
    match users.has_admin().await {
        Ok(true) => {
            info!("admin user present, skipping bootstrap");
            return BootstrapOutcome::AdminPresent;
        }
        Ok(false) => {}
        Err(e) => {
            warn!(error = %e, "could not check for an existing admin");
            return BootstrapOutcome::Failed {
                reason: e.to_string(),
            };
        }
    }

    if !credentials.is_complete() {
        warn!("no admin user exists and bootstrap credentials are not configured");
        return BootstrapOutcome::MissingCredentials;
    }

    let admin = User::new(credentials.username.clone(), credentials.email.clone())
        .with_names("Admin".to_string(), "User".to_string())
        .with_admin(true);

    match users.create_user(admin, &credentials.password).await {
        Ok(user) => {
            info!(user_id = %user.id(), username = user.username(), "bootstrap admin created");
            BootstrapOutcome::Created {
                username: user.username().to_string(),
            }
        }
        Err(e) => {
            warn!(error = %e, "failed to create bootstrap admin");
            BootstrapOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}
