//! User profile record.
//!
//! The relational store owns the authoritative copy of every field here.
//! The identity provider only mirrors username, email, names and the
//! enabled state, and is the sole holder of the password.

use chrono::{DateTime, NaiveDate, Utc};
use passit_core::UserId;
use serde::{Deserialize, Serialize};

/// A user profile.
///
/// Created only through the User Service so that the identity-provider
/// record exists before the profile references it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Internal platform user ID.
    id: UserId,
    /// Identifier of the mirrored identity-provider record.
    ///
    /// `None` only before the provider record exists, or when the caller
    /// built the value without it.
    provider_id: Option<String>,
    username: String,
    email: String,
    first_name: String,
    last_name: String,
    date_of_birth: Option<NaiveDate>,
    phone_number: Option<String>,
    address: Option<String>,
    is_active: bool,
    is_admin: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    #[serde(skip_serializing_if = "Option::is_none")]
    deleted_at: Option<DateTime<Utc>>,
}

/// Every stored field of a user, used to reconstitute a [`User`] from storage.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: UserId,
    pub provider_id: Option<String>,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Canonical form of a username or email: trimmed and lowercased.
///
/// The identity provider stores both in this form and emits it in token
/// claims, so every stored value and every lookup key goes through here.
#[must_use]
pub fn normalize_identifier(value: &str) -> String {
    value.trim().to_lowercase()
}

impl User {
    /// Creates a new active, non-admin user with a generated ID.
    ///
    /// Username and email are stored in canonical form.
    #[must_use]
    pub fn new(username: String, email: String) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            provider_id: None,
            username: normalize_identifier(&username),
            email: normalize_identifier(&email),
            first_name: String::new(),
            last_name: String::new(),
            date_of_birth: None,
            phone_number: None,
            address: None,
            is_active: true,
            is_admin: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Sets first and last name.
    #[must_use]
    pub fn with_names(mut self, first_name: String, last_name: String) -> Self {
        self.first_name = first_name;
        self.last_name = last_name;
        self
    }

    /// Sets the admin flag.
    #[must_use]
    pub fn with_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }

    /// Reconstitutes a user from storage.
    #[must_use]
    pub fn from_record(record: UserRecord) -> Self {
        Self {
            id: record.id,
            provider_id: record.provider_id,
            username: record.username,
            email: record.email,
            first_name: record.first_name,
            last_name: record.last_name,
            date_of_birth: record.date_of_birth,
            phone_number: record.phone_number,
            address: record.address,
            is_active: record.is_active,
            is_admin: record.is_admin,
            created_at: record.created_at,
            updated_at: record.updated_at,
            deleted_at: record.deleted_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    /// Returns the identity-provider ID, if known.
    #[must_use]
    pub fn provider_id(&self) -> Option<&str> {
        self.provider_id.as_deref()
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    #[must_use]
    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    #[must_use]
    pub fn date_of_birth(&self) -> Option<NaiveDate> {
        self.date_of_birth
    }

    #[must_use]
    pub fn phone_number(&self) -> Option<&str> {
        self.phone_number.as_deref()
    }

    #[must_use]
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    #[must_use]
    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    /// Records the identity-provider ID once the provider record exists.
    pub fn set_provider_id(&mut self, provider_id: String) {
        self.provider_id = Some(provider_id);
    }

    pub fn set_username(&mut self, username: String) {
        self.username = normalize_identifier(&username);
        self.touch();
    }

    pub fn set_email(&mut self, email: String) {
        self.email = normalize_identifier(&email);
        self.touch();
    }

    pub fn set_first_name(&mut self, first_name: String) {
        self.first_name = first_name;
        self.touch();
    }

    pub fn set_last_name(&mut self, last_name: String) {
        self.last_name = last_name;
        self.touch();
    }

    pub fn set_date_of_birth(&mut self, date_of_birth: Option<NaiveDate>) {
        self.date_of_birth = date_of_birth;
        self.touch();
    }

    pub fn set_phone_number(&mut self, phone_number: Option<String>) {
        self.phone_number = phone_number;
        self.touch();
    }

    pub fn set_address(&mut self, address: Option<String>) {
        self.address = address;
        self.touch();
    }

    pub fn set_admin(&mut self, is_admin: bool) {
        self.is_admin = is_admin;
        self.touch();
    }

    /// Marks the user inactive and stamps the soft-delete marker.
    pub fn deactivate(&mut self) {
        let now = Utc::now();
        self.is_active = false;
        self.deleted_at = Some(now);
        self.updated_at = now;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
