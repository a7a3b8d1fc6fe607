/**
 * SINK - State store receiving the sensors
 *
 * ROLE :
 * Common interface of whatever stores the sensors (Home Assistant in
 * production, a recording stub in tests). Entity ids never carry the
 * `sensor.` domain; that is a detail of the Home Assistant implementation.
 *
 * CONTRACT :
 * - list_entities(prefix) : ids currently stored that start with prefix
 * - upsert_entity         : idempotent overwrite of state + attributes
 * - delete_entity         : idempotent, deleting a missing id is Ok
 */

pub mod home_assistant;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

pub use home_assistant::{resolve_delete_base_url, HomeAssistantSink};

/// Flat string -> scalar mapping.
pub type Attributes = BTreeMap<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink unreachable: {0}")]
    Transport(String),
    #[error("sink answered {status} for {target}")]
    Status { target: String, status: u16 },
    #[error("unexpected sink response: {0}")]
    Decode(String),
}

/// One sensor write as it is sent to the sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityPayload {
    pub id: String,
    pub state: Value,
    pub attributes: Attributes,
}

#[async_trait]
pub trait Sink: Send + Sync {
    async fn list_entities(&self, id_prefix: &str) -> Result<Vec<String>, SinkError>;

    async fn upsert_entity(&self, id: &str, state: &Value, attributes: &Attributes) -> Result<(), SinkError>;

    async fn delete_entity(&self, id: &str) -> Result<(), SinkError>;

    async fn upsert(&self, payload: &EntityPayload) -> Result<(), SinkError> {
        self.upsert_entity(&payload.id, &payload.state, &payload.attributes).await
    }
}
