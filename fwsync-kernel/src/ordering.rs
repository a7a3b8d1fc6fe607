use crate::models::DeviceRecord;
use std::cmp::Ordering;

/// Octet-wise address order; unresolved addresses go last.
pub fn compare_by_ip(a: &DeviceRecord, b: &DeviceRecord) -> Ordering {
    match (a.ip, b.ip) {
        (Some(x), Some(y)) => x.octets().cmp(&y.octets()),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable, so unresolved devices keep the order they were produced in.
pub fn sort_devices(devices: &mut [DeviceRecord]) {
    devices.sort_by(compare_by_ip);
}
