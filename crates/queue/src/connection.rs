//! JetStream connection, stream/consumer bootstrap and delivery.

use crate::error::{QueueError, QueueResult};
use crate::messages::ProcessUpdateMessage;
use async_nats::jetstream;
use async_nats::jetstream::consumer::pull::Config as PullConfig;
use async_nats::jetstream::consumer::{AckPolicy, PullConsumer};
use async_nats::jetstream::stream::{RetentionPolicy, Stream};
use futures::StreamExt;
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

/// Work queue stream holding update subjects.
pub const STREAM_NAME: &str = "UPDATES";

/// Subject wildcard the stream captures.
pub const UPDATE_SUBJECTS_WILDCARD: &str = "UPDATE.>";

/// Subject carrying process-update messages.
pub const PROCESS_UPDATE_SUBJECT: &str = "UPDATE.PROCESS";

/// Durable consumer processing updates.
pub const PROCESS_UPDATE_CONSUMER: &str = "process-update";

/// Advisory subject NATS publishes when a delivery exhausts its attempts.
pub const DLQ_ADVISORY_SUBJECT: &str = "$JS.EVENT.ADVISORY.CONSUMER.MAX_DELIVERIES.UPDATES.>";

/// Delivery attempts before a message is dead-lettered.
const MAX_DELIVER: i64 = 5;

/// Per-attempt redelivery backoff.
const BACKOFF: [Duration; 4] = [
    Duration::from_secs(5),
    Duration::from_secs(12),
    Duration::from_secs(19),
    Duration::from_secs(30),
];

/// Stream and consumer creation time out after this long.
const SETUP_TIMEOUT: Duration = Duration::from_secs(10);

/// How a delivery attempt is settled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Processing succeeded; remove the message.
    Ack,
    /// Processing failed transiently; redeliver after the delay.
    Retry(Duration),
    /// The message is not actionable; never redeliver.
    Term,
}

/// One delivery from the process-update consumer.
pub struct Delivery {
    msg: jetstream::Message,
}

impl Delivery {
    pub fn payload(&self) -> &[u8] {
        &self.msg.payload
    }

    /// Settle the delivery with the queue.
    pub async fn settle(&self, disposition: Disposition) -> QueueResult<()> {
        use async_nats::jetstream::AckKind;
        let kind = match disposition {
            Disposition::Ack => AckKind::Ack,
            Disposition::Retry(delay) => AckKind::Nak(Some(delay)),
            Disposition::Term => AckKind::Term,
        };
        self.msg
            .ack_with(kind)
            .await
            .map_err(|e| QueueError::Consume(e.to_string()))
    }
}

/// Max-deliveries advisory payload; only the stream sequence matters.
#[derive(Debug, Deserialize)]
struct MaxDeliveriesAdvisory {
    stream_seq: Option<u64>,
}

/// Shared connection to the work queue.
#[derive(Clone)]
pub struct Connection {
    client: async_nats::Client,
    jetstream: jetstream::Context,
    stream: Stream,
}

impl Connection {
    /// Connect and ensure the work queue stream exists.
    pub async fn connect(url: &str) -> QueueResult<Self> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| QueueError::Connect(e.to_string()))?;
        let jetstream = jetstream::new(client.clone());

        let stream = tokio::time::timeout(
            SETUP_TIMEOUT,
            jetstream.get_or_create_stream(jetstream::stream::Config {
                name: STREAM_NAME.to_string(),
                retention: RetentionPolicy::WorkQueue,
                subjects: vec![UPDATE_SUBJECTS_WILDCARD.to_string()],
                ..Default::default()
            }),
        )
        .await
        .map_err(|_| QueueError::Setup("timed out creating stream".to_string()))?
        .map_err(|e| QueueError::Setup(e.to_string()))?;

        tracing::info!(stream = STREAM_NAME, "connected to queue");
        Ok(Self {
            client,
            jetstream,
            stream,
        })
    }

    /// Publish a process-update message for the worker.
    pub async fn publish_process_update(&self, update_id: Uuid) -> QueueResult<()> {
        let payload = ProcessUpdateMessage { update_id }.encode()?;
        self.jetstream
            .publish(PROCESS_UPDATE_SUBJECT, payload.into())
            .await
            .map_err(|e| QueueError::Publish(e.to_string()))?
            .await
            .map_err(|e| QueueError::Publish(e.to_string()))?;
        Ok(())
    }

    /// Create (or look up) the durable process-update consumer and return
    /// its delivery stream. One message is processed at a time; the
    /// configured backoff schedule governs redelivery.
    pub async fn process_update_deliveries(
        &self,
    ) -> QueueResult<impl futures::Stream<Item = QueueResult<Delivery>>> {
        let consumer: PullConsumer = tokio::time::timeout(
            SETUP_TIMEOUT,
            self.stream.get_or_create_consumer(
                PROCESS_UPDATE_CONSUMER,
                PullConfig {
                    durable_name: Some(PROCESS_UPDATE_CONSUMER.to_string()),
                    name: Some(PROCESS_UPDATE_CONSUMER.to_string()),
                    filter_subject: PROCESS_UPDATE_SUBJECT.to_string(),
                    ack_policy: AckPolicy::Explicit,
                    max_deliver: MAX_DELIVER,
                    backoff: BACKOFF.to_vec(),
                    ..Default::default()
                },
            ),
        )
        .await
        .map_err(|_| QueueError::Setup("timed out creating consumer".to_string()))?
        .map_err(|e| QueueError::Setup(e.to_string()))?;
        tracing::info!(consumer = PROCESS_UPDATE_CONSUMER, "consumer created");

        let messages = consumer
            .stream()
            .max_messages_per_batch(1)
            .messages()
            .await
            .map_err(|e| QueueError::Consume(e.to_string()))?;

        Ok(messages.map(|item| {
            item.map(|msg| Delivery { msg })
                .map_err(|e| QueueError::Consume(e.to_string()))
        }))
    }

    /// Subscribe to max-deliveries advisories. For each advisory the
    /// original message is fetched from the stream, handed to `handler`,
    /// then deleted so the work queue drains.
    pub async fn run_dlq_subscriber<F, Fut>(&self, handler: F) -> QueueResult<()>
    where
        F: Fn(Vec<u8>) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        let mut sub = self
            .client
            .subscribe(DLQ_ADVISORY_SUBJECT)
            .await
            .map_err(|e| QueueError::Consume(e.to_string()))?;
        tracing::info!("subscribed to max deliveries advisories");

        while let Some(advisory) = sub.next().await {
            let parsed: MaxDeliveriesAdvisory = match serde_json::from_slice(&advisory.payload) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::error!(error = %e, "failed to parse dlq advisory");
                    continue;
                }
            };
            let Some(stream_seq) = parsed.stream_seq else {
                tracing::error!("dlq advisory is missing stream_seq");
                continue;
            };

            let raw = match self.stream.get_raw_message(stream_seq).await {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::error!(stream_seq, error = %e, "failed to fetch dead-lettered message");
                    continue;
                }
            };

            handler(raw.payload.to_vec()).await;

            match self.stream.delete_message(stream_seq).await {
                Ok(_) => tracing::info!(stream_seq, "deleted dead-lettered message"),
                Err(e) => {
                    tracing::error!(stream_seq, error = %e, "failed to delete dead-lettered message")
                }
            }
        }
        Ok(())
    }

    /// Check the connection is alive.
    pub async fn health_check(&self) -> QueueResult<()> {
        match self.client.connection_state() {
            async_nats::connection::State::Connected => Ok(()),
            state => Err(QueueError::Unhealthy(format!(
                "connection state: {state:?}"
            ))),
        }
    }
}
