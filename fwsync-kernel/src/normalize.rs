//! Host normalisation and device fingerprints.
//!
//! A host becomes a [`DeviceRecord`] when it has either a resolvable IPv4
//! address or a display name; everything else is dropped without noise.

use crate::config::TimeZoneMode;
use crate::models::{DeviceRecord, HostRecord};
use crate::ordering::sort_devices;
use chrono::{DateTime, Local, Utc};
use tracing::debug;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Number of trailing MAC hex digits kept in a device id.
const FINGERPRINT_LEN: usize = 6;

#[derive(Debug, Clone)]
pub struct Normalizer {
    device_prefix: String,
    zone: TimeZoneMode,
}

impl Normalizer {
    pub fn new(device_prefix: impl Into<String>, zone: TimeZoneMode) -> Self {
        Self { device_prefix: device_prefix.into(), zone }
    }

    /// Canonical record for one host, or `None` when the host has neither address nor name.
    pub fn normalize(&self, host: &HostRecord) -> Option<DeviceRecord> {
        let allocation = host.allocation();
        let ip = host.direct_ip().or_else(|| allocation.ip());

        let display_name = [&host.name, &host.dhcp_name, &host.local_domain]
            .into_iter()
            .flatten()
            .map(|n| n.trim())
            .find(|n| !n.is_empty())
            .map(str::to_owned);

        if ip.is_none() && display_name.is_none() {
            return None;
        }

        let mac = host.mac.as_deref().and_then(normalize_mac);
        let id = mac.as_deref().map(|m| fingerprint(&self.device_prefix, m));

        Some(DeviceRecord {
            id,
            ip,
            mac,
            vendor: host.mac_vendor.clone().filter(|v| !v.is_empty()),
            display_name,
            last_active_at: host.last_active.and_then(|e| format_epoch(e, self.zone)),
            first_found_at: host.first_found.and_then(|e| format_epoch(e, self.zone)),
            allocation_type: allocation.allocation_type(),
        })
    }

    /// Normalises a whole snapshot and orders it by address.
    pub fn normalize_all(&self, hosts: &[HostRecord]) -> Vec<DeviceRecord> {
        let mut devices: Vec<DeviceRecord> = hosts.iter().filter_map(|h| self.normalize(h)).collect();
        let dropped = hosts.len() - devices.len();
        if dropped > 0 {
            debug!(dropped, "hosts without address or name skipped");
        }
        sort_devices(&mut devices);
        devices
    }
}

/// Lowercase hex digits of a MAC, separators removed.
///
/// Returns `None` for an empty value or one holding anything but hex digits and
/// the usual `:`, `-`, `.` separators.
pub fn normalize_mac(raw: &str) -> Option<String> {
    let mut mac = String::with_capacity(12);
    for c in raw.trim().chars() {
        match c {
            ':' | '-' | '.' => {}
            c if c.is_ascii_hexdigit() => mac.push(c.to_ascii_lowercase()),
            _ => return None,
        }
    }
    (!mac.is_empty()).then_some(mac)
}

/// Stable device id: prefix plus the last six characters of a normalised MAC.
pub fn fingerprint(prefix: &str, normalized_mac: &str) -> String {
    let skip = normalized_mac.chars().count().saturating_sub(FINGERPRINT_LEN);
    let tail: String = normalized_mac.chars().skip(skip).collect();
    format!("{prefix}{tail}")
}

/// Floors an epoch to whole seconds and renders it as `YYYY-MM-DDTHH:mm:ss`.
///
/// Non-finite or out of range epochs yield `None`.
pub fn format_epoch(epoch: f64, zone: TimeZoneMode) -> Option<String> {
    if !epoch.is_finite() {
        return None;
    }
    let utc = DateTime::<Utc>::from_timestamp(epoch.floor() as i64, 0)?;
    let formatted = match zone {
        TimeZoneMode::Utc => utc.format(TIMESTAMP_FORMAT).to_string(),
        TimeZoneMode::Local => utc.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string(),
    };
    Some(formatted)
}
