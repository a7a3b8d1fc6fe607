/*!
Mock Sink pour développement sans Home Assistant

Keeps the sensors in memory, records every write and delete, and can be told
to fail specific ids to exercise the failure paths of a cycle.
*/

use async_trait::async_trait;
use fwsync_kernel::sink::{Attributes, Sink, SinkError};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntity {
    pub state: Value,
    pub attributes: Attributes,
}

#[derive(Debug, Default)]
struct SinkState {
    entities: BTreeMap<String, StoredEntity>,
    upserts: Vec<String>,
    deletes: Vec<String>,
    fail_upsert: HashSet<String>,
    fail_delete: HashSet<String>,
    fail_list: bool,
}

/// In-memory sink, cloneable so a test keeps a handle while the scheduler owns another.
#[derive(Debug, Clone, Default)]
pub struct MockSink {
    state: Arc<Mutex<SinkState>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-existing sensor, as if left over from an earlier run.
    pub fn seed(&self, id: &str, state: Value) {
        self.state.lock().entities.insert(
            id.to_string(),
            StoredEntity { state, attributes: Attributes::new() },
        );
    }

    pub fn fail_upsert(&self, id: &str, fail: bool) {
        let mut state = self.state.lock();
        if fail {
            state.fail_upsert.insert(id.to_string());
        } else {
            state.fail_upsert.remove(id);
        }
    }

    pub fn fail_delete(&self, id: &str, fail: bool) {
        let mut state = self.state.lock();
        if fail {
            state.fail_delete.insert(id.to_string());
        } else {
            state.fail_delete.remove(id);
        }
    }

    pub fn fail_list(&self, fail: bool) {
        self.state.lock().fail_list = fail;
    }

    pub fn entity(&self, id: &str) -> Option<StoredEntity> {
        self.state.lock().entities.get(id).cloned()
    }

    pub fn entity_ids(&self) -> Vec<String> {
        self.state.lock().entities.keys().cloned().collect()
    }

    /// Successful upserts, in call order.
    pub fn upserts(&self) -> Vec<String> {
        self.state.lock().upserts.clone()
    }

    /// Successful deletes, in call order.
    pub fn deletes(&self) -> Vec<String> {
        self.state.lock().deletes.clone()
    }

    pub fn upsert_count(&self, id: &str) -> usize {
        self.state.lock().upserts.iter().filter(|u| u.as_str() == id).count()
    }

    pub fn delete_count(&self, id: &str) -> usize {
        self.state.lock().deletes.iter().filter(|d| d.as_str() == id).count()
    }

    /// Forgets the call logs, keeps the stored sensors.
    pub fn clear_log(&self) {
        let mut state = self.state.lock();
        state.upserts.clear();
        state.deletes.clear();
    }
}

#[async_trait]
impl Sink for MockSink {
    async fn list_entities(&self, id_prefix: &str) -> Result<Vec<String>, SinkError> {
        let state = self.state.lock();
        if state.fail_list {
            return Err(SinkError::Transport("mock list failure".into()));
        }
        Ok(state.entities.keys().filter(|id| id.starts_with(id_prefix)).cloned().collect())
    }

    async fn upsert_entity(&self, id: &str, value: &Value, attributes: &Attributes) -> Result<(), SinkError> {
        let mut state = self.state.lock();
        if state.fail_upsert.contains(id) {
            return Err(SinkError::Status { target: id.to_string(), status: 500 });
        }
        state.entities.insert(
            id.to_string(),
            StoredEntity { state: value.clone(), attributes: attributes.clone() },
        );
        state.upserts.push(id.to_string());
        tracing::debug!("[MOCK] upsert {id}");
        Ok(())
    }

    async fn delete_entity(&self, id: &str) -> Result<(), SinkError> {
        let mut state = self.state.lock();
        if state.fail_delete.contains(id) {
            return Err(SinkError::Status { target: id.to_string(), status: 500 });
        }
        state.entities.remove(id);
        state.deletes.push(id.to_string());
        tracing::debug!("[MOCK] delete {id}");
        Ok(())
    }
}
