/**
 * MODELS - Host records from the Firewalla box and their canonical form
 *
 * ROLE :
 * Wire types as the box reports them (HostRecord, SpeedtestResults) and the
 * canonical DeviceRecord the reconciliation works on.
 *
 * The nested allocation block of a host is only reachable through
 * HostRecord::allocation(), which validates it into an explicit variant.
 */

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::net::Ipv4Addr;

/// One host entry of the discovery snapshot, read-only.
///
/// Every field is optional; a value of the wrong type decodes as absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub ip: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub mac: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub dhcp_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub local_domain: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub mac_vendor: Option<String>,
    #[serde(default, deserialize_with = "lenient_epoch")]
    pub last_active: Option<f64>,
    #[serde(default, deserialize_with = "lenient_epoch")]
    pub first_found: Option<f64>,
    /// Raw `policy` block; only read through [`HostRecord::allocation`].
    #[serde(default)]
    pub policy: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawAllocation {
    #[serde(default, deserialize_with = "lenient_string")]
    ipv4: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "lenient_string")]
    kind: Option<String>,
}

/// Validated view of the first allocation entry of a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocation {
    None,
    Dynamic { ip: Option<Ipv4Addr> },
    Static { ip: Option<Ipv4Addr> },
}

impl Allocation {
    pub fn ip(&self) -> Option<Ipv4Addr> {
        match self {
            Allocation::None => None,
            Allocation::Dynamic { ip } | Allocation::Static { ip } => *ip,
        }
    }

    pub fn allocation_type(&self) -> AllocationType {
        match self {
            Allocation::Static { .. } => AllocationType::Static,
            _ => AllocationType::Dynamic,
        }
    }
}

impl HostRecord {
    /// Decodes one host entry; `None` when the entry does not have the shape of a host.
    pub fn from_value(value: Value) -> Option<Self> {
        serde_json::from_value(value).ok()
    }

    /// First entry of `policy.ipAllocation.allocations`, first wins.
    ///
    /// Any level that is missing or not an object (`[]`, `"none"`, ...) yields
    /// [`Allocation::None`].
    pub fn allocation(&self) -> Allocation {
        let first = self
            .policy
            .as_ref()
            .and_then(|p| p.get("ipAllocation"))
            .and_then(|a| a.get("allocations"))
            .and_then(Value::as_object)
            .and_then(|entries| entries.values().next());

        let Some(raw) = first.and_then(|v| RawAllocation::deserialize(v).ok()) else {
            return Allocation::None;
        };

        let ip = raw.ipv4.as_deref().and_then(parse_ipv4);
        match raw.kind.as_deref() {
            Some("static") => Allocation::Static { ip },
            _ => Allocation::Dynamic { ip },
        }
    }

    /// Direct address of the host when it is a valid dotted quad.
    pub fn direct_ip(&self) -> Option<Ipv4Addr> {
        self.ip.as_deref().and_then(parse_ipv4)
    }
}

fn parse_ipv4(raw: &str) -> Option<Ipv4Addr> {
    raw.trim().parse().ok()
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Ok(Some(s)),
        _ => Ok(None),
    }
}

// Epochs sometimes arrive as strings; anything unusable becomes None instead of
// rejecting the whole host.
fn lenient_epoch<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let epoch = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(epoch.filter(|e| e.is_finite()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationType {
    Dynamic,
    Static,
}

/// Canonical, orderable and diffable form of a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub id: Option<String>,
    /// `None` means unresolved; rendered with the configured sentinel.
    pub ip: Option<Ipv4Addr>,
    pub mac: Option<String>,
    pub vendor: Option<String>,
    pub display_name: Option<String>,
    pub last_active_at: Option<String>,
    pub first_found_at: Option<String>,
    pub allocation_type: AllocationType,
}

/// Speed test results as returned by the box, most recent first.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpeedtestResults {
    #[serde(default)]
    pub results: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct SpeedtestEntry {
    timestamp: f64,
    result: SpeedtestFigures,
}

#[derive(Debug, Deserialize)]
struct SpeedtestFigures {
    upload: f64,
    download: f64,
}

impl SpeedtestResults {
    /// Latest usable measurement; `None` for an empty or unreadable result list.
    pub fn latest(&self) -> Option<Measurement> {
        let entry = SpeedtestEntry::deserialize(self.results.first()?).ok()?;
        if !entry.timestamp.is_finite() {
            return None;
        }
        Some(Measurement {
            timestamp: entry.timestamp.floor() as i64,
            upload_mbps: entry.result.upload,
            download_mbps: entry.result.download,
        })
    }
}

/// Bandwidth measurement, timestamp floored to whole epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub timestamp: i64,
    pub upload_mbps: f64,
    pub download_mbps: f64,
}
