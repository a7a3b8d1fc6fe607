use super::{decode_hosts, DiscoveryError, DiscoverySource};
use crate::models::{HostRecord, Measurement, SpeedtestResults};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Reads `{"hosts": [...], "speedtest": {"results": [...]}}` from disk on every call.
#[derive(Debug, Clone)]
pub struct SnapshotDiscovery {
    path: PathBuf,
}

impl SnapshotDiscovery {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    async fn read(&self) -> Result<Value, DiscoveryError> {
        let txt = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| DiscoveryError::Transient(format!("{}: {e}", self.path.display())))?;
        serde_json::from_str(&txt).map_err(|e| DiscoveryError::Transient(format!("{}: {e}", self.path.display())))
    }
}

#[async_trait]
impl DiscoverySource for SnapshotDiscovery {
    async fn list_hosts(&self) -> Result<Vec<HostRecord>, DiscoveryError> {
        decode_hosts(self.read().await?)
    }

    async fn latest_speedtest(&self) -> Result<Option<Measurement>, DiscoveryError> {
        let mut snapshot = self.read().await?;
        let results = snapshot
            .get_mut("speedtest")
            .map(Value::take)
            .and_then(|v| serde_json::from_value::<SpeedtestResults>(v).ok())
            .unwrap_or_default();
        Ok(results.latest())
    }
}
