/*!
Test Harness pour le moteur de synchronisation

Wires a [`MockDiscovery`] and a [`MockSink`] to a real [`SyncScheduler`] so a
test scripts the box, runs cycles and asserts on what landed in the sink.
Timestamps are rendered in UTC to keep expectations machine independent.
*/

use crate::discovery_stub::MockDiscovery;
use crate::host_builders::HostBuilder;
use crate::sink_stub::MockSink;
use fwsync_kernel::config::TimeZoneMode;
use fwsync_kernel::scheduler::{CycleError, CycleReport, SyncOptions, SyncScheduler};
use std::sync::{Arc, Once};
use std::time::Duration;

static TRACING: Once = Once::new();

/// Logs of the code under test, captured per test by the libtest writer.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
            .with_test_writer()
            .try_init();
    });
}

pub fn test_options() -> SyncOptions {
    SyncOptions {
        interval: Duration::from_millis(50),
        timezone: TimeZoneMode::Utc,
        ..SyncOptions::default()
    }
}

pub struct TestHarness {
    pub discovery: MockDiscovery,
    pub sink: MockSink,
    pub scheduler: SyncScheduler,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_options(test_options())
    }

    pub fn with_options(options: SyncOptions) -> Self {
        init_test_tracing();
        let discovery = MockDiscovery::new();
        let sink = MockSink::new();
        let scheduler = SyncScheduler::new(Arc::new(discovery.clone()), Arc::new(sink.clone()), options);
        Self { discovery, sink, scheduler }
    }

    pub fn set_hosts(&self, hosts: &[HostBuilder]) {
        self.discovery.set_hosts(hosts.iter().map(HostBuilder::build).collect());
    }

    pub async fn cycle(&mut self) -> Result<CycleReport, CycleError> {
        self.scheduler.run_cycle().await
    }

    /// Ids currently tracked by the scheduler's registry.
    pub fn tracked(&self) -> Vec<String> {
        self.scheduler.registry().ids().map(String::from).collect()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
