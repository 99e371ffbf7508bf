//! Account service.

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{Identity, UserId};
use notifications::{Notification, Notifier};
use store::{RecordStore, UserRecord};

use crate::error::DomainError;

use super::password::{self, MIN_PASSWORD_LEN};
use super::{AccountError, NewUser, PasswordReset, ProfileUpdate, SignIn, UserView};

/// How long a password reset token stays valid.
const RESET_TOKEN_TTL_HOURS: i64 = 24;

/// Service for user accounts.
pub struct AccountService<S: RecordStore> {
    store: Arc<S>,
    notifier: Notifier,
}

impl<S: RecordStore> AccountService<S> {
    pub fn new(store: Arc<S>, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    /// Provisions an account. Emails are stored trimmed and lowercased;
    /// a duplicate fails with `ConstraintViolation`.
    #[tracing::instrument(skip(self))]
    pub async fn register_user(&self, input: NewUser) -> Result<UserView, DomainError> {
        let email = normalize_email(&input.email)?;
        let mut user = UserRecord::new(
            input.names.trim(),
            email,
            input.phone_number.trim(),
            input.country.trim(),
            input.role,
        );
        user.password_hash = input.password.as_deref().map(password::hash_password);

        self.store.insert_user(&user).await?;
        tracing::info!(user_id = %user.id, role = %user.role, "User registered");
        Ok(user.into())
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_user(&self, id: UserId) -> Result<UserView, DomainError> {
        Ok(self.load(id).await?.into())
    }

    #[tracing::instrument(skip(self))]
    pub async fn find_user_by_email(&self, email: &str) -> Result<UserView, DomainError> {
        let email = normalize_email(email)?;
        self.store
            .find_user_by_email(&email)
            .await?
            .map(UserView::from)
            .ok_or_else(|| DomainError::not_found("user", email))
    }

    /// Updates the caller's own phone number and country.
    #[tracing::instrument(skip(self))]
    pub async fn update_profile(
        &self,
        identity: &Identity,
        update: ProfileUpdate,
    ) -> Result<UserView, DomainError> {
        let mut user = self.load(identity.subject()).await?;
        if let Some(phone) = update.phone_number {
            user.phone_number = phone.trim().to_string();
        }
        if let Some(country) = update.country {
            user.country = country.trim().to_string();
        }
        self.store.save_user(&user).await?;
        Ok(user.into())
    }

    /// Stamps the user's last login time.
    #[tracing::instrument(skip(self))]
    pub async fn record_login(&self, id: UserId) -> Result<UserView, DomainError> {
        let user = self.load(id).await?;
        self.stamp_login(user).await
    }

    /// Resolves the caller's account, creating it on first sight, and
    /// records the login. A new account takes its role from `identity` and
    /// needs an email in `claims`.
    #[tracing::instrument(skip(self))]
    pub async fn sign_in(&self, identity: &Identity, claims: SignIn) -> Result<UserView, DomainError> {
        if let Some(user) = self.store.get_user(identity.subject()).await? {
            return self.stamp_login(user).await;
        }

        let email = normalize_email(claims.email.as_deref().unwrap_or_default())?;
        let names = claims.names.as_deref().unwrap_or_default().trim();
        let mut user = UserRecord::new(names, email, "", "", identity.role());
        user.id = identity.subject();
        user.last_login_at = Some(Utc::now());

        match self.store.insert_user(&user).await {
            Ok(()) => {
                tracing::info!(user_id = %user.id, role = %user.role, "User provisioned on first sign-in");
                metrics::counter!("users_provisioned_total").increment(1);
                Ok(user.into())
            }
            // A concurrent first request for the same subject won the insert.
            Err(e) if e.is_constraint_violation() => match self.store.get_user(user.id).await? {
                Some(existing) => self.stamp_login(existing).await,
                None => Err(e.into()),
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Issues a reset token valid for 24 hours and queues the reset email.
    #[tracing::instrument(skip(self))]
    pub async fn request_password_reset(&self, email: &str) -> Result<(), DomainError> {
        let email = normalize_email(email)?;
        let mut user = self
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| DomainError::not_found("user", &email))?;

        let token = password::reset_token();
        user.reset_token = Some(token.clone());
        user.reset_token_expires_at = Some(Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS));
        self.store.save_user(&user).await?;

        tracing::info!(user_id = %user.id, "Password reset requested");
        self.notifier.notify(Notification::PasswordReset {
            email: user.email,
            token,
        });
        Ok(())
    }

    /// Sets a new password using a token from [`request_password_reset`].
    ///
    /// [`request_password_reset`]: AccountService::request_password_reset
    #[tracing::instrument(skip(self))]
    pub async fn reset_password(&self, reset: PasswordReset) -> Result<(), DomainError> {
        if reset.new_password != reset.confirm_password {
            return Err(AccountError::PasswordMismatch.into());
        }

        let mut user = self
            .store
            .find_user_by_reset_token(&reset.token)
            .await?
            .ok_or(AccountError::InvalidResetToken)?;

        match user.reset_token_expires_at {
            Some(expires_at) if expires_at > Utc::now() => {}
            _ => return Err(AccountError::ResetTokenExpired.into()),
        }

        if reset.new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AccountError::WeakPassword {
                min: MIN_PASSWORD_LEN,
            }
            .into());
        }

        user.password_hash = Some(password::hash_password(&reset.new_password));
        user.reset_token = None;
        user.reset_token_expires_at = None;
        self.store.save_user(&user).await?;

        tracing::info!(user_id = %user.id, "Password reset");
        Ok(())
    }

    async fn stamp_login(&self, mut user: UserRecord) -> Result<UserView, DomainError> {
        user.last_login_at = Some(Utc::now());
        self.store.save_user(&user).await?;
        Ok(user.into())
    }

    async fn load(&self, id: UserId) -> Result<UserRecord, DomainError> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| DomainError::not_found("user", id))
    }
}

fn normalize_email(email: &str) -> Result<String, AccountError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(AccountError::EmptyEmail);
    }
    Ok(email)
}
