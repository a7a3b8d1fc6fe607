//! Sensor payloads written to the sink.

use crate::config::AllocationEncoding;
use crate::models::{AllocationType, DeviceRecord};
use crate::sink::{Attributes, EntityPayload};
use serde_json::{json, Value};

pub const SPEEDTEST_UPLOAD_ID: &str = "speedtest_upload";
pub const SPEEDTEST_DOWNLOAD_ID: &str = "speedtest_download";

/// State written when a device has never been seen active.
const UNKNOWN_STATE: &str = "unknown";

impl AllocationType {
    pub fn encode(self, encoding: AllocationEncoding) -> &'static str {
        match (self, encoding) {
            (AllocationType::Dynamic, AllocationEncoding::Full) => "dynamic",
            (AllocationType::Static, AllocationEncoding::Full) => "static",
            (AllocationType::Dynamic, AllocationEncoding::Compact) => "d",
            (AllocationType::Static, AllocationEncoding::Compact) => "s",
        }
    }
}

/// Rendering choices for device sensors.
#[derive(Debug, Clone)]
pub struct EntityFormat {
    pub unresolved_ip: String,
    pub allocation_encoding: AllocationEncoding,
}

impl Default for EntityFormat {
    fn default() -> Self {
        Self {
            unresolved_ip: crate::config::DEFAULT_UNRESOLVED_IP.into(),
            allocation_encoding: AllocationEncoding::Full,
        }
    }
}

impl EntityFormat {
    pub fn device_state(&self, device: &DeviceRecord) -> Value {
        Value::from(device.last_active_at.as_deref().unwrap_or(UNKNOWN_STATE))
    }

    /// Absent optional values are left out rather than written as null.
    pub fn device_attributes(&self, device: &DeviceRecord) -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert("device_class".into(), json!("timestamp"));
        attributes.insert("icon".into(), json!("mdi:ip-network"));
        let ip = device.ip.map(|ip| ip.to_string()).unwrap_or_else(|| self.unresolved_ip.clone());
        attributes.insert("ip".into(), json!(ip));
        attributes.insert("DHCP".into(), json!(device.allocation_type.encode(self.allocation_encoding)));

        let optional = [
            ("friendly_name", &device.display_name),
            ("MAC", &device.mac),
            ("vendor", &device.vendor),
            ("found", &device.first_found_at),
        ];
        for (key, value) in optional {
            if let Some(v) = value {
                attributes.insert(key.into(), json!(v));
            }
        }
        attributes
    }

    /// `None` for devices without a MAC: there is no stable id to write them under.
    pub fn device_payload(&self, device: &DeviceRecord) -> Option<EntityPayload> {
        Some(EntityPayload {
            id: device.id.clone()?,
            state: self.device_state(device),
            attributes: self.device_attributes(device),
        })
    }
}

fn speedtest_payload(id: &str, label: &str, mbps: f64, timestamp: &str) -> EntityPayload {
    let mut attributes = Attributes::new();
    attributes.insert("icon".into(), json!("mdi:speedometer"));
    attributes.insert("device_class".into(), json!("data_rate"));
    attributes.insert("state_class".into(), json!("measurement"));
    attributes.insert("friendly_name".into(), json!(label));
    attributes.insert("unit_of_measurement".into(), json!("Mbit/s"));
    attributes.insert("timestamp".into(), json!(timestamp));
    EntityPayload { id: id.into(), state: json!(mbps), attributes }
}

/// Upload and download sensors for one (already rounded) measurement.
pub fn speedtest_payloads(upload: f64, download: f64, timestamp: &str) -> [EntityPayload; 2] {
    [
        speedtest_payload(SPEEDTEST_UPLOAD_ID, "SpeedTest Upload", upload, timestamp),
        speedtest_payload(SPEEDTEST_DOWNLOAD_ID, "SpeedTest Download", download, timestamp),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn laptop() -> DeviceRecord {
        DeviceRecord {
            id: Some("network_device_112233".into()),
            ip: Some(Ipv4Addr::new(192, 168, 1, 50)),
            mac: Some("aabbcc112233".into()),
            vendor: None,
            display_name: Some("laptop".into()),
            last_active_at: Some("2023-11-14T22:13:20".into()),
            first_found_at: Some("2023-07-22T04:26:40".into()),
            allocation_type: AllocationType::Dynamic,
        }
    }

    #[test]
    fn test_device_payload() {
        let payload = EntityFormat::default().device_payload(&laptop()).unwrap();
        assert_eq!(payload.id, "network_device_112233");
        assert_eq!(payload.state, json!("2023-11-14T22:13:20"));
        assert_eq!(payload.attributes["friendly_name"], json!("laptop"));
        assert_eq!(payload.attributes["ip"], json!("192.168.1.50"));
        assert_eq!(payload.attributes["MAC"], json!("aabbcc112233"));
        assert_eq!(payload.attributes["found"], json!("2023-07-22T04:26:40"));
        assert_eq!(payload.attributes["DHCP"], json!("dynamic"));
        assert_eq!(payload.attributes["device_class"], json!("timestamp"));
        assert!(!payload.attributes.contains_key("vendor"));
    }

    #[test]
    fn test_compact_encoding_and_sentinel() {
        let format = EntityFormat { unresolved_ip: "0.0.0.0".into(), allocation_encoding: AllocationEncoding::Compact };
        let mut device = laptop();
        device.ip = None;
        device.allocation_type = AllocationType::Static;
        device.last_active_at = None;

        let payload = format.device_payload(&device).unwrap();
        assert_eq!(payload.attributes["ip"], json!("0.0.0.0"));
        assert_eq!(payload.attributes["DHCP"], json!("s"));
        assert_eq!(payload.state, json!("unknown"));
    }

    #[test]
    fn test_device_without_id_has_no_payload() {
        let mut device = laptop();
        device.id = None;
        assert!(EntityFormat::default().device_payload(&device).is_none());
    }

    #[test]
    fn test_speedtest_payloads() {
        let [up, down] = speedtest_payloads(20.46, 300.11, "2023-11-14T22:15:00");
        assert_eq!(up.id, "speedtest_upload");
        assert_eq!(up.state, json!(20.46));
        assert_eq!(down.attributes["friendly_name"], json!("SpeedTest Download"));
        assert_eq!(down.attributes["timestamp"], json!("2023-11-14T22:15:00"));
        assert_eq!(down.attributes["unit_of_measurement"], json!("Mbit/s"));
    }
}
