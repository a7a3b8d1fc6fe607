/*!
Builders pour les hosts Firewalla de test

Produces host entries in the JSON shape the box reports, so tests go through
the same decoding as production instead of filling `HostRecord` by hand.
*/

use fwsync_kernel::models::{HostRecord, Measurement};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Default)]
pub struct HostBuilder {
    fields: Map<String, Value>,
    allocations: Map<String, Value>,
}

impl HostBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host with a MAC and a name, the most common shape.
    pub fn named(name: &str, mac: &str) -> Self {
        Self::new().name(name).mac(mac)
    }

    pub fn ip(self, ip: &str) -> Self {
        self.set_string("ip", ip)
    }

    pub fn mac(self, mac: &str) -> Self {
        self.set_string("mac", mac)
    }

    pub fn name(self, name: &str) -> Self {
        self.set_string("name", name)
    }

    pub fn dhcp_name(self, name: &str) -> Self {
        self.set_string("dhcpName", name)
    }

    pub fn local_domain(self, name: &str) -> Self {
        self.set_string("localDomain", name)
    }

    pub fn vendor(self, vendor: &str) -> Self {
        self.set_string("macVendor", vendor)
    }

    pub fn last_active(mut self, epoch: f64) -> Self {
        self.fields.insert("lastActive".into(), json!(epoch));
        self
    }

    pub fn first_found(mut self, epoch: f64) -> Self {
        self.fields.insert("firstFound".into(), json!(epoch));
        self
    }

    /// Adds an allocation entry; entries keep the order they were added in.
    pub fn allocation(mut self, network: &str, ipv4: &str, kind: &str) -> Self {
        self.allocations.insert(network.into(), json!({ "ipv4": ipv4, "type": kind }));
        self
    }

    pub fn set_string(mut self, key: &str, value: &str) -> Self {
        self.fields.insert(key.into(), json!(value));
        self
    }

    pub fn to_json(&self) -> Value {
        let mut fields = self.fields.clone();
        if !self.allocations.is_empty() {
            fields.insert(
                "policy".into(),
                json!({ "ipAllocation": { "allocations": Value::Object(self.allocations.clone()) } }),
            );
        }
        Value::Object(fields)
    }

    /// Decoded like a discovery response entry.
    pub fn build(&self) -> HostRecord {
        HostRecord::from_value(self.to_json()).unwrap_or_default()
    }
}

pub fn measurement(timestamp: i64, upload_mbps: f64, download_mbps: f64) -> Measurement {
    Measurement { timestamp, upload_mbps, download_mbps }
}

/// Reference host: 192.168.1.50, MAC aa:bb:cc:11:22:33, named "laptop".
pub fn laptop() -> HostBuilder {
    HostBuilder::named("laptop", "AA:BB:CC:11:22:33")
        .ip("192.168.1.50")
        .last_active(1_700_000_000.0)
        .first_found(1_690_000_000.0)
        .allocation("net-1", "192.168.1.50", "dynamic")
}
