/**
 * DEVICE REGISTRY - Devices already mirrored into the sink during this run
 *
 * ROLE :
 * id -> display name of every device whose sensor write was confirmed.
 * Lives as long as the process; nothing is persisted, a restart starts empty
 * and the keep-set cleanup of the reconciler catches up with the sink.
 *
 * Only the reconciler mutates it, and only after the sink answered.
 */

use std::collections::{BTreeMap, HashSet};

/// What `remember` changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Remembered {
    New,
    Renamed { previous: Option<String> },
    Unchanged,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceRegistry {
    devices: BTreeMap<String, Option<String>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.devices.contains_key(id)
    }

    pub fn name(&self, id: &str) -> Option<&str> {
        self.devices.get(id).and_then(|n| n.as_deref())
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    /// Records a confirmed upsert, refreshing the name if it changed.
    pub fn remember(&mut self, id: &str, name: Option<&str>) -> Remembered {
        match self.devices.get_mut(id) {
            None => {
                self.devices.insert(id.to_string(), name.map(str::to_owned));
                Remembered::New
            }
            Some(current) if current.as_deref() != name => {
                let previous = std::mem::replace(current, name.map(str::to_owned));
                Remembered::Renamed { previous }
            }
            Some(_) => Remembered::Unchanged,
        }
    }

    /// Records a confirmed delete. Returns the entry if the id was tracked.
    pub fn forget(&mut self, id: &str) -> Option<Option<String>> {
        self.devices.remove(id)
    }

    /// Tracked ids missing from `keep`, in id order.
    pub fn stale_ids(&self, keep: &HashSet<String>) -> Vec<String> {
        self.devices.keys().filter(|id| !keep.contains(*id)).cloned().collect()
    }
}
