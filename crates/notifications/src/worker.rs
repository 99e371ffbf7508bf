//! Bounded notification queue and its worker pool.

use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::dispatcher::NotificationDispatcher;
use crate::error::NotificationError;
use crate::message::{Notification, OrderNotice};

/// Worker pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifierConfig {
    /// Maximum concurrent deliveries.
    pub workers: usize,
    /// Messages buffered before new ones are dropped.
    pub queue_capacity: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 1024,
        }
    }
}

/// Cheap, cloneable sender side of the notification queue.
///
/// [`Notifier::notify`] never blocks and never fails from the caller's
/// point of view.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::Sender<Notification>,
}

/// Owns the background loop. Call [`NotifierHandle::drain`] on shutdown;
/// dropping the handle also stops the loop once queued messages are out.
#[derive(Debug)]
pub struct NotifierHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Notifier {
    /// Starts the worker pool on the current runtime.
    pub fn spawn<D>(dispatcher: Arc<D>, config: NotifierConfig) -> (Self, NotifierHandle)
    where
        D: NotificationDispatcher + 'static,
    {
        let workers = config.workers.max(1);
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(run(dispatcher, rx, shutdown_rx, workers));

        tracing::info!(
            workers,
            queue_capacity = config.queue_capacity,
            "Notification workers started"
        );

        (
            Self { tx },
            NotifierHandle {
                shutdown: shutdown_tx,
                task,
            },
        )
    }

    /// Enqueues a notification. Drops it with a warning when the queue is
    /// full or the workers are gone.
    pub fn notify(&self, notification: Notification) {
        let kind = notification.kind();
        match self.tx.try_send(notification) {
            Ok(()) => {
                tracing::debug!(kind, "Notification queued");
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(kind, "Notification queue full, dropping message");
                metrics::counter!("notifications_dropped_total", "reason" => "full").increment(1);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(kind, "Notification workers stopped, dropping message");
                metrics::counter!("notifications_dropped_total", "reason" => "closed")
                    .increment(1);
            }
        }
    }
}

impl NotifierHandle {
    /// Stops accepting messages, delivers what is already queued and waits
    /// for in-flight deliveries.
    pub async fn drain(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Notification loop panicked");
        }
        tracing::info!("Notification workers drained");
    }
}

async fn run<D>(
    dispatcher: Arc<D>,
    mut rx: mpsc::Receiver<Notification>,
    mut shutdown: oneshot::Receiver<()>,
    workers: usize,
) where
    D: NotificationDispatcher + 'static,
{
    let permits = Arc::new(Semaphore::new(workers));

    loop {
        let next = tokio::select! {
            message = rx.recv() => message,
            _ = &mut shutdown => {
                rx.close();
                break;
            }
        };
        match next {
            Some(notification) => dispatch(&dispatcher, &permits, notification).await,
            None => break,
        }
    }

    // After close(), recv() yields whatever is still buffered.
    while let Some(notification) = rx.recv().await {
        dispatch(&dispatcher, &permits, notification).await;
    }

    if permits.acquire_many(workers as u32).await.is_err() {
        tracing::warn!("Notification permits closed before drain");
    }
}

async fn dispatch<D>(dispatcher: &Arc<D>, permits: &Arc<Semaphore>, notification: Notification)
where
    D: NotificationDispatcher + 'static,
{
    let Ok(permit) = permits.clone().acquire_owned().await else {
        return;
    };
    let dispatcher = Arc::clone(dispatcher);
    tokio::spawn(async move {
        deliver(dispatcher.as_ref(), notification).await;
        drop(permit);
    });
}

async fn deliver<D>(dispatcher: &D, notification: Notification)
where
    D: NotificationDispatcher + ?Sized,
{
    match notification {
        Notification::OrderPlaced(order) => {
            // Independent attempts: a failed SMS does not suppress the admin email.
            record("order_confirmation", &order, dispatcher.send_order_confirmation(&order).await);
            record("order_admin_alert", &order, dispatcher.send_order_admin_alert(&order).await);
        }
        Notification::PasswordReset { email, token } => {
            match dispatcher.send_password_reset(&email, &token).await {
                Ok(()) => {
                    metrics::counter!("notifications_sent_total", "kind" => "password_reset")
                        .increment(1);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Password reset email failed");
                    metrics::counter!("notifications_failed_total", "kind" => "password_reset")
                        .increment(1);
                }
            }
        }
    }
}

fn record(kind: &'static str, order: &OrderNotice, result: Result<(), NotificationError>) {
    match result {
        Ok(()) => {
            metrics::counter!("notifications_sent_total", "kind" => kind).increment(1);
        }
        Err(e) => {
            tracing::warn!(order_id = %order.order_id, kind, error = %e, "Notification failed");
            metrics::counter!("notifications_failed_total", "kind" => kind).increment(1);
        }
    }
}
