//! Notification dispatcher trait and implementations.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::NotificationError;
use crate::message::{OrderNotice, password_reset_body};

/// Delivery channel for storefront notifications.
///
/// Each call is a single delivery attempt. Callers treat failures as
/// non-fatal.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Confirms a placed order to the customer (SMS).
    async fn send_order_confirmation(&self, order: &OrderNotice) -> Result<(), NotificationError>;

    /// Alerts the shop administrator about a placed order (email).
    async fn send_order_admin_alert(&self, order: &OrderNotice) -> Result<(), NotificationError>;

    /// Sends a password reset link (email).
    async fn send_password_reset(&self, email: &str, token: &str)
    -> Result<(), NotificationError>;
}

/// Dispatcher that renders every message and writes it to the log.
///
/// Stands in for the SMS gateway and SMTP relay, which live outside this
/// workspace.
#[derive(Debug, Clone)]
pub struct LogDispatcher {
    admin_email: String,
    client_url: String,
}

impl LogDispatcher {
    pub fn new(admin_email: impl Into<String>, client_url: impl Into<String>) -> Self {
        Self {
            admin_email: admin_email.into(),
            client_url: client_url.into(),
        }
    }
}

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn send_order_confirmation(&self, order: &OrderNotice) -> Result<(), NotificationError> {
        if order.customer_phone.trim().is_empty() {
            return Err(NotificationError::MissingRecipient { channel: "sms" });
        }
        tracing::info!(
            channel = "sms",
            to = %order.customer_phone,
            message = %order.confirmation_sms(),
            "notification sent"
        );
        Ok(())
    }

    async fn send_order_admin_alert(&self, order: &OrderNotice) -> Result<(), NotificationError> {
        if self.admin_email.trim().is_empty() {
            return Err(NotificationError::MissingRecipient { channel: "email" });
        }
        tracing::info!(
            channel = "email",
            to = %self.admin_email,
            subject = %order.admin_subject(),
            body = %order.admin_body(),
            "notification sent"
        );
        Ok(())
    }

    async fn send_password_reset(
        &self,
        email: &str,
        token: &str,
    ) -> Result<(), NotificationError> {
        if email.trim().is_empty() {
            return Err(NotificationError::MissingRecipient { channel: "email" });
        }
        tracing::info!(
            channel = "email",
            to = %email,
            subject = "Password Reset Request",
            body = %password_reset_body(&self.client_url, token),
            "notification sent"
        );
        Ok(())
    }
}

/// A message captured by [`RecordingDispatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentMessage {
    OrderConfirmation(OrderNotice),
    OrderAdminAlert(OrderNotice),
    PasswordReset { email: String, token: String },
}

#[derive(Debug, Default)]
struct RecordingState {
    sent: Vec<SentMessage>,
    attempts: usize,
    fail_all: bool,
}

/// In-memory dispatcher for testing.
#[derive(Debug, Clone, Default)]
pub struct RecordingDispatcher {
    state: Arc<RwLock<RecordingState>>,
}

impl RecordingDispatcher {
    /// Creates a new recording dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures every subsequent delivery to fail.
    pub fn set_fail_all(&self, fail: bool) {
        self.write().fail_all = fail;
    }

    /// Messages delivered successfully, in delivery order.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.read().sent.clone()
    }

    /// Delivery attempts, successful or not.
    pub fn attempts(&self) -> usize {
        self.read().attempts
    }

    /// Polls until `count` attempts were made or `timeout` elapses.
    pub async fn wait_for_attempts(&self, count: usize, timeout: std::time::Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.attempts() >= count {
                return true;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        self.attempts() >= count
    }

    // A panicking test thread must not hide what was recorded before it.
    fn read(&self) -> RwLockReadGuard<'_, RecordingState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RecordingState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, message: SentMessage) -> Result<(), NotificationError> {
        let mut state = self.write();
        state.attempts += 1;
        if state.fail_all {
            return Err(NotificationError::Delivery {
                channel: "test",
                reason: "configured to fail".to_string(),
            });
        }
        state.sent.push(message);
        Ok(())
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn send_order_confirmation(&self, order: &OrderNotice) -> Result<(), NotificationError> {
        self.record(SentMessage::OrderConfirmation(order.clone()))
    }

    async fn send_order_admin_alert(&self, order: &OrderNotice) -> Result<(), NotificationError> {
        self.record(SentMessage::OrderAdminAlert(order.clone()))
    }

    async fn send_password_reset(
        &self,
        email: &str,
        token: &str,
    ) -> Result<(), NotificationError> {
        self.record(SentMessage::PasswordReset {
            email: email.to_string(),
            token: token.to_string(),
        })
    }
}
