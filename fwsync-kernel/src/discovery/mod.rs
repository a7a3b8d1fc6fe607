//! Discovery sources: where host snapshots and speed tests come from.
//!
//! - [`HttpDiscovery`]: JSON bridge in front of the Firewalla box
//! - [`SnapshotDiscovery`]: the same JSON read from a file, for offline runs

pub mod http;
pub mod snapshot;

use crate::models::{HostRecord, Measurement};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

pub use http::HttpDiscovery;
pub use snapshot::SnapshotDiscovery;

#[derive(Debug, Clone, thiserror::Error)]
pub enum DiscoveryError {
    #[error("discovery unavailable: {0}")]
    Transient(String),
    #[error("discovery rejected credentials: {0}")]
    Authentication(String),
}

#[async_trait]
pub trait DiscoverySource: Send + Sync {
    async fn list_hosts(&self) -> Result<Vec<HostRecord>, DiscoveryError>;

    /// `Ok(None)` when the box has no measurement to report.
    async fn latest_speedtest(&self) -> Result<Option<Measurement>, DiscoveryError>;
}

/// Decodes a host list host by host; entries that are not host shaped are skipped.
///
/// Accepts either `{"hosts": [...]}` or a bare array.
pub fn decode_hosts(body: Value) -> Result<Vec<HostRecord>, DiscoveryError> {
    let entries = match body {
        Value::Array(entries) => entries,
        Value::Object(mut map) => match map.remove("hosts") {
            Some(Value::Array(entries)) => entries,
            _ => return Err(DiscoveryError::Transient("host list missing from response".into())),
        },
        _ => return Err(DiscoveryError::Transient("unexpected host list shape".into())),
    };

    let total = entries.len();
    let hosts: Vec<HostRecord> = entries.into_iter().filter_map(HostRecord::from_value).collect();
    if hosts.len() < total {
        debug!(skipped = total - hosts.len(), "malformed host entries skipped");
    }
    Ok(hosts)
}
