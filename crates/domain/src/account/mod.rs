//! User accounts: registration, profile, login stamps and password reset.

pub mod password;
mod service;

pub use service::AccountService;

use chrono::{DateTime, Utc};
use common::{Role, UserId};
use serde::{Deserialize, Serialize};
use store::UserRecord;
use thiserror::Error;

/// Reasons an account operation is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("Email must not be empty")]
    EmptyEmail,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Invalid reset token")]
    InvalidResetToken,

    #[error("Reset token has expired")]
    ResetTokenExpired,

    #[error("Password must be at least {min} characters")]
    WeakPassword { min: usize },
}

/// Input for provisioning an account.
#[derive(Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub names: String,
    pub email: String,
    pub phone_number: String,
    pub country: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub password: Option<String>,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("names", &self.names)
            .field("email", &self.email)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Claims the authentication layer forwards about the calling user.
///
/// Only consulted when the caller has no account yet.
#[derive(Debug, Clone, Default)]
pub struct SignIn {
    pub email: Option<String>,
    pub names: Option<String>,
}

/// Profile fields a user may change. Missing fields are kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Completes a password reset.
#[derive(Clone, Serialize, Deserialize)]
pub struct PasswordReset {
    pub token: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl std::fmt::Debug for PasswordReset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordReset").finish_non_exhaustive()
    }
}

/// An account as returned to callers; secrets are never included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    pub id: UserId,
    pub names: String,
    pub email: String,
    pub phone_number: String,
    pub country: String,
    pub role: Role,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<UserRecord> for UserView {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            names: record.names,
            email: record.email,
            phone_number: record.phone_number,
            country: record.country,
            role: record.role,
            last_login_at: record.last_login_at,
            created_at: record.created_at,
        }
    }
}
