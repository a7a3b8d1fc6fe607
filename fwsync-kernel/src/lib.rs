//! fwsync kernel - Firewalla hosts mirrored as Home Assistant sensors
//!
//! Pipeline of one cycle:
//! - discovery snapshot ([`discovery`]) -> canonical devices ([`normalize`], [`ordering`])
//! - devices -> sink upserts/deletes, tracked in the [`registry`] ([`reconcile`])
//! - latest speed test -> sink, once per measurement ([`speedtest`])
//!
//! [`scheduler`] runs that pipeline on a fixed interval.

pub mod config;
pub mod discovery;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod ordering;
pub mod payload;
pub mod reconcile;
pub mod registry;
pub mod scheduler;
pub mod sink;
pub mod speedtest;

pub use config::{AllocationEncoding, CliArgs, Settings, TimeZoneMode};
pub use discovery::{DiscoveryError, DiscoverySource};
pub use models::{DeviceRecord, HostRecord, Measurement};
pub use reconcile::{ReconcileResult, Reconciler};
pub use registry::DeviceRegistry;
pub use scheduler::{CycleReport, SyncOptions, SyncScheduler};
pub use sink::{Attributes, EntityPayload, Sink, SinkError};
