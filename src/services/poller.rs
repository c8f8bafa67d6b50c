//! Background queue poller.
//!
//! One tokio task dequeues small batches, deletes every message it receives,
//! and sleeps between polls. The first failure is reported on an error
//! channel and ends the task; dropping or shutting down the [`QueuePoller`]
//! stops it between polls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// A message handed out by a queue, hidden until deleted or until its
/// visibility timeout lapses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DequeuedMessage {
    pub message_id: String,
    pub pop_receipt: String,
    pub text: String,
    pub dequeue_count: u64,
}

/// The queue operations the poller needs.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Dequeues up to `max_messages`, hiding them for `visibility_timeout`.
    async fn dequeue(
        &self,
        max_messages: u8,
        visibility_timeout: Duration,
    ) -> Result<Vec<DequeuedMessage>>;

    /// Deletes a dequeued message.
    async fn delete(&self, message: &DequeuedMessage) -> Result<()>;
}

/// Poll loop tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerSettings {
    /// Messages requested per dequeue.
    pub batch_size: u8,
    /// How long dequeued messages stay hidden.
    pub visibility_timeout: Duration,
    /// Pause between polls.
    pub interval: Duration,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            batch_size: 2,
            visibility_timeout: Duration::from_secs(60),
            interval: Duration::from_secs(1),
        }
    }
}

/// Handle to a running poll loop.
pub struct QueuePoller {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
    errors: mpsc::Receiver<Error>,
    processed: Arc<AtomicUsize>,
}

impl QueuePoller {
    /// Spawns the poll loop on the current runtime.
    pub fn spawn<S>(source: Arc<S>, settings: PollerSettings) -> Self
    where
        S: MessageSource + 'static,
    {
        let (error_tx, errors) = mpsc::channel(1);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let processed = Arc::new(AtomicUsize::new(0));

        let handle = tokio::spawn(poll_loop(
            source,
            settings,
            error_tx,
            shutdown_rx,
            processed.clone(),
        ));

        Self {
            handle,
            shutdown,
            errors,
            processed,
        }
    }

    /// Number of messages dequeued and deleted so far.
    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    /// Waits until `window` elapses or the loop reports an error, whichever
    /// comes first.
    pub async fn wait(&mut self, window: Duration) -> Result<()> {
        tokio::select! {
            received = self.errors.recv() => match received {
                Some(err) => Err(err),
                // Loop ended without an error; nothing left to wait for.
                None => Ok(()),
            },
            _ = tokio::time::sleep(window) => Ok(()),
        }
    }

    /// Stops the loop and returns the number of processed messages.
    pub async fn shutdown(self) -> usize {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "queue poller task failed");
        }
        self.processed.load(Ordering::SeqCst)
    }
}

async fn poll_loop<S>(
    source: Arc<S>,
    settings: PollerSettings,
    errors: mpsc::Sender<Error>,
    mut shutdown: watch::Receiver<bool>,
    processed: Arc<AtomicUsize>,
) where
    S: MessageSource + 'static,
{
    loop {
        if *shutdown.borrow() {
            break;
        }

        if let Err(e) = poll_once(source.as_ref(), &settings, &processed).await {
            let _ = errors.send(e).await;
            return;
        }

        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::time::sleep(settings.interval) => {}
        }
    }

    debug!("queue poller stopped");
}

async fn poll_once<S>(source: &S, settings: &PollerSettings, processed: &AtomicUsize) -> Result<()>
where
    S: MessageSource + ?Sized,
{
    let messages = source
        .dequeue(settings.batch_size, settings.visibility_timeout)
        .await
        .map_err(|e| Error::Poller(format!("failed to dequeue messages: {}", e)))?;
    info!(count = messages.len(), "dequeued messages");

    for message in &messages {
        info!(id = %message.message_id, text = %message.text, "dequeued message");
        source
            .delete(message)
            .await
            .map_err(|e| Error::Poller(format!("failed to delete message: {}", e)))?;
        processed.fetch_add(1, Ordering::SeqCst);
    }

    Ok(())
}
