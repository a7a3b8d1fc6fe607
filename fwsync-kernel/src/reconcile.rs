/**
 * RECONCILER - Mirrors the current device set into the sink
 *
 * ROLE :
 * Diffs the normalised snapshot against the registry, upserts live devices,
 * deletes the ones that disappeared and keeps the registry in step with
 * what the sink confirmed.
 *
 * FONCTIONNEMENT :
 * - plan      : pure classification (new / seen / stale) of one snapshot
 * - reconcile : upserts then deletes, each batch issued concurrently and
 *               joined before the registry is touched
 * - cleanup   : every sink entity under the device prefix that is not in the
 *               keep-set is deleted too, tracked or not, so sensors left by a
 *               previous process do not linger
 *
 * A failing sink call is logged and only affects its own id.
 */

use crate::models::DeviceRecord;
use crate::payload::EntityFormat;
use crate::registry::{DeviceRegistry, Remembered};
use crate::sink::{EntityPayload, Sink};
use futures::future::join_all;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceChange {
    New,
    Seen,
}

#[derive(Debug, Clone)]
pub struct PlannedUpsert {
    pub change: DeviceChange,
    pub display_name: Option<String>,
    pub payload: EntityPayload,
}

/// Classification of one snapshot against the registry.
#[derive(Debug, Clone, Default)]
pub struct ReconcilePlan {
    pub upserts: Vec<PlannedUpsert>,
    /// Tracked ids absent from the snapshot.
    pub stale: Vec<String>,
    /// Ids that must survive the cleanup pass.
    pub keep: HashSet<String>,
    /// Devices without an id: listed, never written or tracked.
    pub untracked: usize,
    pub total: usize,
}

/// One line of the dry-run output.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedDevice {
    pub action: &'static str,
    pub id: Option<String>,
    pub state: serde_json::Value,
    pub attributes: crate::sink::Attributes,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileResult {
    pub new: usize,
    pub stale: usize,
    pub total: usize,
    pub upserted: usize,
    pub deleted: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    registry: DeviceRegistry,
    device_prefix: String,
    format: EntityFormat,
}

impl Reconciler {
    pub fn new(device_prefix: impl Into<String>, format: EntityFormat) -> Self {
        Self::with_registry(DeviceRegistry::new(), device_prefix, format)
    }

    pub fn with_registry(registry: DeviceRegistry, device_prefix: impl Into<String>, format: EntityFormat) -> Self {
        Self { registry, device_prefix: device_prefix.into(), format }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Pure diff, nothing is written. Two devices sharing an id: the first one wins.
    pub fn plan(&self, devices: &[DeviceRecord]) -> ReconcilePlan {
        let mut plan = ReconcilePlan { total: devices.len(), ..ReconcilePlan::default() };

        for device in devices {
            let Some(payload) = self.format.device_payload(device) else {
                plan.untracked += 1;
                continue;
            };
            if !plan.keep.insert(payload.id.clone()) {
                debug!(id = %payload.id, "duplicate device id in snapshot, keeping the first");
                continue;
            }
            let change = if self.registry.contains(&payload.id) { DeviceChange::Seen } else { DeviceChange::New };
            plan.upserts.push(PlannedUpsert { change, display_name: device.display_name.clone(), payload });
        }

        plan.stale = self.registry.stale_ids(&plan.keep);
        plan
    }

    /// Planned sensors of every device, id-less ones included, in snapshot order.
    pub fn preview(&self, devices: &[DeviceRecord]) -> Vec<PlannedDevice> {
        devices
            .iter()
            .map(|device| {
                let action = match &device.id {
                    None => "untracked",
                    Some(id) if self.registry.contains(id) => "update",
                    Some(_) => "create",
                };
                PlannedDevice {
                    action,
                    id: device.id.clone(),
                    state: self.format.device_state(device),
                    attributes: self.format.device_attributes(device),
                }
            })
            .collect()
    }

    pub async fn reconcile(&mut self, sink: &dyn Sink, devices: &[DeviceRecord]) -> ReconcileResult {
        let plan = self.plan(devices);
        let mut result = ReconcileResult {
            new: plan.upserts.iter().filter(|u| u.change == DeviceChange::New).count(),
            stale: plan.stale.len(),
            total: plan.total,
            ..ReconcileResult::default()
        };

        let upserts = join_all(plan.upserts.iter().map(|u| async move { (u, sink.upsert(&u.payload).await) })).await;
        for (upsert, outcome) in upserts {
            let id = upsert.payload.id.as_str();
            match outcome {
                Ok(()) => {
                    result.upserted += 1;
                    match self.registry.remember(id, upsert.display_name.as_deref()) {
                        Remembered::New => info!("Found device {}", upsert.display_name.as_deref().unwrap_or("Unknown")),
                        Remembered::Renamed { previous } => debug!(id, ?previous, "device renamed"),
                        Remembered::Unchanged => {}
                    }
                }
                Err(e) => {
                    result.failed += 1;
                    warn!(id, "Failed to update device sensor: {e}");
                }
            }
        }

        let doomed = self.cleanup_targets(sink, &plan).await;
        let deletes = join_all(doomed.iter().map(|id| async move { (id, sink.delete_entity(id).await) })).await;
        for (id, outcome) in deletes {
            match outcome {
                Ok(()) => {
                    result.deleted += 1;
                    match self.registry.forget(id) {
                        Some(name) => info!("Removed device {}", name.as_deref().unwrap_or(id.as_str())),
                        None => info!("Removed orphaned sensor {id}"),
                    }
                }
                Err(e) => {
                    result.failed += 1;
                    warn!(id = %id, "Failed to delete device sensor: {e}");
                }
            }
        }

        if result.new > 0 {
            info!("{} devices", result.total);
        }
        result
    }

    /// Stale registry ids plus every listed sink entity outside the keep-set.
    async fn cleanup_targets(&self, sink: &dyn Sink, plan: &ReconcilePlan) -> BTreeSet<String> {
        let mut doomed: BTreeSet<String> = plan.stale.iter().cloned().collect();
        match sink.list_entities(&self.device_prefix).await {
            Ok(existing) => doomed.extend(existing.into_iter().filter(|id| !plan.keep.contains(id))),
            Err(e) => warn!("Failed to list device sensors, cleaning tracked devices only: {e}"),
        }
        doomed
    }
}
