/**
 * SYNC SCHEDULER - Drives the reconciliation cycles
 *
 * ROLE :
 * Owns the whole pipeline (discovery, normalizer, reconciler with its
 * registry, speed test deduplicator) and runs one cycle at startup, then one
 * per interval, until the process stops.
 *
 * FONCTIONNEMENT :
 * - Idle -> RunningCycle on each tick, back to Idle whatever the outcome
 * - cycles run inline in the tick loop: a tick that fires during a cycle is
 *   skipped, never run concurrently
 * - cycle = hosts -> normalise + order -> reconcile -> speed test
 * - an authentication failure abandons the cycle; any other failure only
 *   ends its own stage
 */

use crate::config::{AllocationEncoding, Settings, TimeZoneMode, DEFAULT_DEVICE_PREFIX, DEFAULT_UNRESOLVED_IP};
use crate::discovery::{DiscoveryError, DiscoverySource};
use crate::normalize::Normalizer;
use crate::payload::EntityFormat;
use crate::reconcile::{PlannedDevice, ReconcileResult, Reconciler};
use crate::registry::DeviceRegistry;
use crate::sink::Sink;
use crate::speedtest::SpeedtestDeduplicator;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info_span, warn, Instrument};

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub interval: Duration,
    pub device_prefix: String,
    pub unresolved_ip: String,
    pub allocation_encoding: AllocationEncoding,
    pub timezone: TimeZoneMode,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            device_prefix: DEFAULT_DEVICE_PREFIX.into(),
            unresolved_ip: DEFAULT_UNRESOLVED_IP.into(),
            allocation_encoding: AllocationEncoding::Full,
            timezone: TimeZoneMode::Local,
        }
    }
}

impl From<&Settings> for SyncOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            interval: settings.interval(),
            device_prefix: settings.device_prefix.clone(),
            unresolved_ip: settings.unresolved_ip.clone(),
            allocation_encoding: settings.allocation_encoding,
            timezone: settings.timezone,
        }
    }
}

impl SyncOptions {
    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.device_prefix.clone(), self.timezone)
    }

    pub fn reconciler(&self) -> Reconciler {
        let format = EntityFormat {
            unresolved_ip: self.unresolved_ip.clone(),
            allocation_encoding: self.allocation_encoding,
        };
        Reconciler::new(self.device_prefix.clone(), format)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    RunningCycle,
}

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("cycle abandoned: {0}")]
    Authentication(String),
}

/// What one completed cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// `None` when the host stage could not run.
    pub devices: Option<ReconcileResult>,
    pub speedtest_emitted: bool,
}

pub struct SyncScheduler {
    discovery: Arc<dyn DiscoverySource>,
    sink: Arc<dyn Sink>,
    normalizer: Normalizer,
    reconciler: Reconciler,
    speedtest: SpeedtestDeduplicator,
    interval: Duration,
    state: SchedulerState,
    cycles: u64,
}

impl SyncScheduler {
    pub fn new(discovery: Arc<dyn DiscoverySource>, sink: Arc<dyn Sink>, options: SyncOptions) -> Self {
        Self {
            discovery,
            sink,
            normalizer: options.normalizer(),
            reconciler: options.reconciler(),
            speedtest: SpeedtestDeduplicator::new(options.timezone),
            interval: options.interval,
            state: SchedulerState::Idle,
            cycles: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn registry(&self) -> &DeviceRegistry {
        self.reconciler.registry()
    }

    pub fn last_speedtest(&self) -> Option<i64> {
        self.speedtest.last_emitted()
    }

    /// First cycle immediately, then one per interval. Never returns.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_cycle().await {
                warn!("{e}, retrying in {}s", self.interval.as_secs());
            }
        }
    }

    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        self.cycles += 1;
        self.state = SchedulerState::RunningCycle;
        let span = info_span!("cycle", n = self.cycles);
        let outcome = self.cycle().instrument(span).await;
        self.state = SchedulerState::Idle;
        outcome
    }

    async fn cycle(&mut self) -> Result<CycleReport, CycleError> {
        let mut report = CycleReport::default();

        match self.discovery.list_hosts().await {
            Ok(hosts) => {
                let devices = self.normalizer.normalize_all(&hosts);
                debug!(hosts = hosts.len(), devices = devices.len(), "snapshot normalised");
                report.devices = Some(self.reconciler.reconcile(self.sink.as_ref(), &devices).await);
            }
            Err(DiscoveryError::Authentication(reason)) => {
                error!("Firewalla rejected credentials: {reason}");
                return Err(CycleError::Authentication(reason));
            }
            Err(e) => error!("Failed to list hosts: {e}"),
        }

        match self.discovery.latest_speedtest().await {
            Ok(Some(measurement)) => {
                report.speedtest_emitted = self.speedtest.maybe_emit(self.sink.as_ref(), &measurement).await;
            }
            Ok(None) => debug!("no speed test result"),
            Err(e) => error!("Failed to fetch speed test: {e}"),
        }

        Ok(report)
    }
}

/// Dry run: fetch and normalise once, report what a cycle would write. Never touches a sink.
pub async fn plan_snapshot(
    discovery: &dyn DiscoverySource,
    options: &SyncOptions,
) -> Result<Vec<PlannedDevice>, DiscoveryError> {
    let hosts = discovery.list_hosts().await?;
    let devices = options.normalizer().normalize_all(&hosts);
    Ok(options.reconciler().preview(&devices))
}
