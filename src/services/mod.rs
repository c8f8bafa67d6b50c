//! One module per Azure service, each exposing its operations and a `run`
//! entry point.

pub mod blob;
pub mod cosmos;
pub mod poller;
pub mod queue;
pub mod servicebus;
pub mod table;

pub use poller::{DequeuedMessage, MessageSource, PollerSettings, QueuePoller};
