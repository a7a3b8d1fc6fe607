/*!
Mock Discovery pour développement sans box Firewalla

Serves whatever host list and speed test the test scripted, or a scripted
failure. Cloneable handle over shared state, like [`crate::MockSink`].
*/

use async_trait::async_trait;
use fwsync_kernel::discovery::{DiscoveryError, DiscoverySource};
use fwsync_kernel::models::{HostRecord, Measurement};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Default)]
struct DiscoveryState {
    hosts: Vec<HostRecord>,
    speedtest: Option<Measurement>,
    hosts_error: Option<DiscoveryError>,
    speedtest_error: Option<DiscoveryError>,
    host_calls: usize,
    speedtest_calls: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MockDiscovery {
    state: Arc<Mutex<DiscoveryState>>,
}

impl MockDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_hosts(&self, hosts: Vec<HostRecord>) {
        self.state.lock().hosts = hosts;
    }

    pub fn set_speedtest(&self, measurement: Option<Measurement>) {
        self.state.lock().speedtest = measurement;
    }

    /// `None` clears a previously scripted failure.
    pub fn fail_hosts(&self, error: Option<DiscoveryError>) {
        self.state.lock().hosts_error = error;
    }

    pub fn fail_speedtest(&self, error: Option<DiscoveryError>) {
        self.state.lock().speedtest_error = error;
    }

    pub fn host_calls(&self) -> usize {
        self.state.lock().host_calls
    }

    pub fn speedtest_calls(&self) -> usize {
        self.state.lock().speedtest_calls
    }
}

#[async_trait]
impl DiscoverySource for MockDiscovery {
    async fn list_hosts(&self) -> Result<Vec<HostRecord>, DiscoveryError> {
        let mut state = self.state.lock();
        state.host_calls += 1;
        match &state.hosts_error {
            Some(e) => Err(e.clone()),
            None => Ok(state.hosts.clone()),
        }
    }

    async fn latest_speedtest(&self) -> Result<Option<Measurement>, DiscoveryError> {
        let mut state = self.state.lock();
        state.speedtest_calls += 1;
        match &state.speedtest_error {
            Some(e) => Err(e.clone()),
            None => Ok(state.speedtest),
        }
    }
}
