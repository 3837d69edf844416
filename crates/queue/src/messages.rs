//! Queue message payloads.

use crate::error::{QueueError, QueueResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payload of a process-update message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessUpdateMessage {
    pub update_id: Uuid,
}

impl ProcessUpdateMessage {
    pub fn encode(&self) -> QueueResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| QueueError::MalformedPayload(e.to_string()))
    }

    pub fn parse(data: &[u8]) -> QueueResult<Self> {
        serde_json::from_slice(data).map_err(|e| QueueError::MalformedPayload(e.to_string()))
    }
}
