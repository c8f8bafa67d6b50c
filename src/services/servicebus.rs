//! Service Bus scenario over AMQP.

use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use azservicebus::{
    ServiceBusClient, ServiceBusClientOptions, ServiceBusReceivedMessage, ServiceBusReceiver,
    ServiceBusReceiverOptions, ServiceBusSender, ServiceBusSenderOptions,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Error, Result};

/// How long one receive call waits for a message before giving up.
pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(5);

fn bus_error<E: Display>(what: &'static str) -> impl FnOnce(E) -> Error {
    move |e| Error::ServiceBus(format!("{}: {}", what, e))
}

/// Sends text messages to one queue.
#[async_trait]
pub trait MessageSender: Send {
    async fn send(&mut self, body: &str) -> Result<()>;
}

/// Receives messages in peek-lock mode and settles them.
#[async_trait]
pub trait LockedReceiver: Send {
    type Message: Send + Sync;

    /// Waits up to `max_wait` for one message. `None` means the queue is empty.
    async fn receive(&mut self, max_wait: Duration) -> Result<Option<Self::Message>>;

    /// Decodes the message body as text.
    fn body(&self, message: &Self::Message) -> Result<String>;

    /// Completes the message, removing it from the queue.
    async fn complete(&mut self, message: &Self::Message) -> Result<()>;
}

#[async_trait]
impl MessageSender for ServiceBusSender {
    async fn send(&mut self, body: &str) -> Result<()> {
        self.send_message(body)
            .await
            .map_err(bus_error("failed to send message"))
    }
}

#[async_trait]
impl LockedReceiver for ServiceBusReceiver {
    type Message = ServiceBusReceivedMessage;

    async fn receive(&mut self, max_wait: Duration) -> Result<Option<Self::Message>> {
        let messages = self
            .receive_messages_with_max_wait_time(1, Some(max_wait))
            .await
            .map_err(bus_error("failed to receive message"))?;
        Ok(messages.into_iter().next())
    }

    fn body(&self, message: &Self::Message) -> Result<String> {
        let bytes = message
            .body()
            .map_err(bus_error("failed to read message body"))?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    async fn complete(&mut self, message: &Self::Message) -> Result<()> {
        self.complete_message(message)
            .await
            .map_err(bus_error("failed to complete message"))
    }
}

/// Body of the `i`-th sent message.
pub fn message_body(i: usize, at: DateTime<Utc>) -> String {
    format!("Hello, World! {}: {}", i, at.format("%Y-%m-%d %H:%M:%S"))
}

/// Sends `count` text messages.
pub async fn send_messages<S>(sender: &mut S, count: usize) -> Result<()>
where
    S: MessageSender,
{
    for i in 0..count {
        let body = message_body(i, Utc::now());
        sender.send(&body).await?;
        debug!(%body, "sent message");
    }

    info!(count, "sent messages");
    Ok(())
}

/// Receives up to `max` messages in peek-lock mode and completes each one.
/// Stops early once a receive comes back empty. Returns the bodies.
pub async fn receive_and_complete<R>(receiver: &mut R, max: usize) -> Result<Vec<String>>
where
    R: LockedReceiver,
{
    let mut bodies = Vec::new();

    while bodies.len() < max {
        let Some(message) = receiver.receive(RECEIVE_TIMEOUT).await? else {
            debug!("queue drained");
            break;
        };

        let body = receiver.body(&message)?;
        info!(%body, "received message");
        receiver.complete(&message).await?;
        bodies.push(body);
    }

    info!(count = bodies.len(), "completed messages");
    Ok(bodies)
}

/// Sends messages, then receives and completes them.
pub async fn run(config: &Config) -> Result<()> {
    let connection = crate::clients::service_bus_connection(config)?;
    let queue = config.names.service_bus_queue.clone();

    let mut client = ServiceBusClient::new_from_connection_string(
        connection,
        ServiceBusClientOptions::default(),
    )
    .await
    .map_err(bus_error("failed to connect"))?;

    let mut sender = client
        .create_sender(queue.clone(), ServiceBusSenderOptions::default())
        .await
        .map_err(bus_error("failed to create sender"))?;
    let sent = send_messages(&mut sender, config.message_count).await;
    sender
        .dispose()
        .await
        .map_err(bus_error("failed to close sender"))?;
    sent?;

    let mut receiver = client
        .create_receiver_for_queue(queue, ServiceBusReceiverOptions::default())
        .await
        .map_err(bus_error("failed to create receiver"))?;
    let received = receive_and_complete(&mut receiver, config.receive_max).await;
    receiver
        .dispose()
        .await
        .map_err(bus_error("failed to close receiver"))?;

    client
        .dispose()
        .await
        .map_err(bus_error("failed to close connection"))?;

    received.map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct FakeSender {
        sent: Vec<String>,
    }

    #[async_trait]
    impl MessageSender for FakeSender {
        async fn send(&mut self, body: &str) -> Result<()> {
            self.sent.push(body.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeReceiver {
        pending: VecDeque<String>,
        completed: Vec<String>,
        receives: usize,
        fail_complete: bool,
    }

    impl FakeReceiver {
        fn with_messages(count: usize) -> Self {
            Self {
                pending: (0..count).map(|i| format!("message {}", i)).collect(),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl LockedReceiver for FakeReceiver {
        type Message = String;

        async fn receive(&mut self, _max_wait: Duration) -> Result<Option<String>> {
            self.receives += 1;
            Ok(self.pending.pop_front())
        }

        fn body(&self, message: &String) -> Result<String> {
            Ok(message.clone())
        }

        async fn complete(&mut self, message: &String) -> Result<()> {
            if self.fail_complete {
                return Err(Error::ServiceBus("lock lost".into()));
            }
            self.completed.push(message.clone());
            Ok(())
        }
    }

    #[test]
    fn test_message_body() {
        let at = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 58).unwrap();
        assert_eq!(message_body(7, at), "Hello, World! 7: 2024-12-31 23:59:58");
    }

    #[tokio::test]
    async fn test_send_messages_numbers_bodies() {
        let mut sender = FakeSender::default();
        send_messages(&mut sender, 3).await.unwrap();

        assert_eq!(sender.sent.len(), 3);
        for (i, body) in sender.sent.iter().enumerate() {
            assert!(body.starts_with(&format!("Hello, World! {}: ", i)));
        }
    }

    #[tokio::test]
    async fn test_receive_stops_when_queue_is_empty() {
        let mut receiver = FakeReceiver::with_messages(3);
        let bodies = receive_and_complete(&mut receiver, 20).await.unwrap();

        assert_eq!(bodies, ["message 0", "message 1", "message 2"]);
        assert_eq!(receiver.completed, bodies);
        // Three messages plus the empty receive that ended the loop
        assert_eq!(receiver.receives, 4);
    }

    #[tokio::test]
    async fn test_receive_respects_max() {
        let mut receiver = FakeReceiver::with_messages(5);
        let bodies = receive_and_complete(&mut receiver, 2).await.unwrap();

        assert_eq!(bodies.len(), 2);
        assert_eq!(receiver.completed.len(), 2);
        assert_eq!(receiver.pending.len(), 3);
    }

    #[tokio::test]
    async fn test_receive_on_empty_queue() {
        let mut receiver = FakeReceiver::default();
        assert!(receive_and_complete(&mut receiver, 20).await.unwrap().is_empty());
        assert_eq!(receiver.receives, 1);
    }

    #[tokio::test]
    async fn test_complete_failure_ends_receive() {
        let mut receiver = FakeReceiver {
            fail_complete: true,
            ..FakeReceiver::with_messages(2)
        };
        let err = receive_and_complete(&mut receiver, 20).await.unwrap_err();

        assert!(matches!(err, Error::ServiceBus(_)));
        assert_eq!(receiver.pending.len(), 1);
    }
}
