//! Post-commit notifications.
//!
//! Order confirmations, admin alerts and password-reset links are handed to a
//! [`Notifier`], which queues them on a bounded channel drained by a fixed
//! pool of workers. Delivery is attempted once; failures are logged and
//! counted and never reach the code that enqueued the message.

pub mod dispatcher;
pub mod error;
pub mod message;
pub mod worker;

pub use dispatcher::{LogDispatcher, NotificationDispatcher, RecordingDispatcher, SentMessage};
pub use error::NotificationError;
pub use message::{Notification, NoticeLine, OrderNotice};
pub use worker::{Notifier, NotifierConfig, NotifierHandle};
