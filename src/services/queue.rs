//! Queue Storage scenario.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use azure_storage_queues::prelude::*;
use azure_storage_queues::{QueueClient, QueueServiceClient};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, info};

use super::poller::{DequeuedMessage, MessageSource, PollerSettings, QueuePoller};
use crate::config::Config;
use crate::error::{Error, ErrorCode, Result};

#[async_trait]
impl MessageSource for QueueClient {
    async fn dequeue(
        &self,
        max_messages: u8,
        visibility_timeout: Duration,
    ) -> Result<Vec<DequeuedMessage>> {
        let response = self
            .get_messages()
            .number_of_messages(NumberOfMessages::new(max_messages))
            .visibility_timeout(VisibilityTimeout::new(visibility_timeout))
            .await?;

        Ok(response
            .messages
            .into_iter()
            .map(|m| DequeuedMessage {
                message_id: m.message_id,
                pop_receipt: m.pop_receipt,
                text: m.message_text,
                dequeue_count: u64::from(m.dequeue_count),
            })
            .collect())
    }

    async fn delete(&self, message: &DequeuedMessage) -> Result<()> {
        let receipt = PopReceipt::new(message.message_id.clone(), message.pop_receipt.clone());
        self.pop_receipt_client(receipt).delete().await?;
        Ok(())
    }
}

/// Creates the queue, treating `QueueAlreadyExists` as success.
pub async fn create_queue(service: &QueueServiceClient, name: &str) -> Result<QueueClient> {
    let queue = service.queue_client(name);

    match queue.create().await {
        Ok(_) => info!(queue = name, "created queue"),
        Err(e) => {
            let err = Error::from(e);
            if !err.has_code(ErrorCode::QueueAlreadyExists) {
                return Err(err);
            }
            debug!(queue = name, "queue already exists");
        }
    }

    Ok(queue)
}

/// Text of the `i`-th enqueued message.
pub fn message_text(i: usize, at: DateTime<Utc>) -> String {
    format!(
        "Hello, World  {}: {}",
        i,
        at.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

/// Enqueues `count` messages and returns their ids.
pub async fn enqueue_messages(queue: &QueueClient, count: usize) -> Result<Vec<String>> {
    let mut ids = Vec::with_capacity(count);

    for i in 0..count {
        let response = queue.put_message(message_text(i, Utc::now())).await?;
        let id = response.queue_message.message_id;
        info!(message_id = %id, "enqueued message");
        ids.push(id);
    }

    Ok(ids)
}

/// Deletes the queue.
pub async fn delete_queue(queue: &QueueClient) -> Result<()> {
    queue.delete().await?;
    info!("deleted queue");
    Ok(())
}

/// Creates the queue, starts the poller, enqueues messages, and lets the
/// poller run for the configured window. A poller error fails the scenario.
pub async fn run(config: &Config) -> Result<()> {
    let service = crate::clients::queue_service_client(config)?;
    let queue = Arc::new(create_queue(&service, &config.names.queue).await?);

    let mut poller = QueuePoller::spawn(queue.clone(), PollerSettings::default());

    if let Err(e) = enqueue_messages(&queue, config.message_count).await {
        poller.shutdown().await;
        return Err(e);
    }

    let outcome = poller.wait(config.poll_window).await;
    let processed = poller.shutdown().await;
    info!(processed, window_secs = config.poll_window.as_secs(), "queue poller stopped");

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_message_text() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 8, 7, 6).unwrap();
        assert_eq!(message_text(3, at), "Hello, World  3: 2024-03-09T08:07:06Z");
    }
}
