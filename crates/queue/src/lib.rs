//! Durable work queue for update processing, backed by NATS JetStream.

pub mod connection;
pub mod error;
pub mod messages;

pub use connection::{
    Connection, Delivery, Disposition, DLQ_ADVISORY_SUBJECT, PROCESS_UPDATE_SUBJECT, STREAM_NAME,
};
pub use error::{QueueError, QueueResult};
pub use messages::ProcessUpdateMessage;
