//! Notification error types.

use thiserror::Error;

/// Errors a dispatcher can report for a single delivery attempt.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The message has nowhere to go.
    #[error("No {channel} recipient configured")]
    MissingRecipient { channel: &'static str },

    /// The delivery channel rejected or failed the message.
    #[error("Delivery over {channel} failed: {reason}")]
    Delivery {
        channel: &'static str,
        reason: String,
    },
}
