//! Cycle-level scenarios: scheduler, reconciler and speed test against the mocks.

use crate::host_builders::{laptop, measurement, HostBuilder};
use crate::sink_stub::MockSink;
use crate::test_utils::TestHarness;
use fwsync_kernel::config::TimeZoneMode;
use fwsync_kernel::discovery::DiscoveryError;
use fwsync_kernel::payload::{SPEEDTEST_DOWNLOAD_ID, SPEEDTEST_UPLOAD_ID};
use fwsync_kernel::scheduler::SchedulerState;
use fwsync_kernel::speedtest::SpeedtestDeduplicator;
use serde_json::json;

const LAPTOP_ID: &str = "network_device_112233";

fn host(name: &str, mac: &str, ip: &str) -> HostBuilder {
    HostBuilder::named(name, mac).ip(ip)
}

#[tokio::test]
async fn test_laptop_cycle_end_to_end() {
    let mut harness = TestHarness::new();
    harness.set_hosts(&[laptop()]);
    harness.discovery.set_speedtest(Some(measurement(1_700_000_000, 20.456, 300.111)));

    let report = harness.cycle().await.unwrap();
    let devices = report.devices.unwrap();
    assert_eq!((devices.new, devices.total, devices.upserted, devices.failed), (1, 1, 1, 0));
    assert!(report.speedtest_emitted);
    assert_eq!(harness.scheduler.state(), SchedulerState::Idle);

    let sensor = harness.sink.entity(LAPTOP_ID).unwrap();
    assert_eq!(sensor.state, json!("2023-11-14T22:13:20"));
    assert_eq!(sensor.attributes["ip"], json!("192.168.1.50"));
    assert_eq!(sensor.attributes["MAC"], json!("aabbcc112233"));
    assert_eq!(sensor.attributes["friendly_name"], json!("laptop"));
    assert_eq!(sensor.attributes["DHCP"], json!("dynamic"));
    assert_eq!(sensor.attributes["found"], json!("2023-07-22T04:26:40"));
    assert_eq!(sensor.attributes["device_class"], json!("timestamp"));
    assert!(!sensor.attributes.contains_key("vendor"));

    assert_eq!(harness.sink.entity("speedtest_upload").unwrap().state, json!(20.46));
    assert_eq!(harness.tracked(), vec![LAPTOP_ID.to_string()]);
}

#[tokio::test]
async fn test_repeated_cycle_is_idempotent() {
    let mut harness = TestHarness::new();
    harness.set_hosts(&[laptop(), host("nas", "11:22:33:44:55:66", "192.168.1.10")]);
    harness.discovery.set_speedtest(Some(measurement(1_700_000_000, 10.0, 100.0)));

    harness.cycle().await.unwrap();
    let first_entities = harness.sink.entity_ids();
    harness.sink.clear_log();

    let report = harness.cycle().await.unwrap();
    let devices = report.devices.unwrap();
    assert_eq!(devices.new, 0);
    assert_eq!(devices.deleted, 0);
    assert!(!report.speedtest_emitted);
    assert!(harness.sink.deletes().is_empty());
    assert_eq!(harness.sink.entity_ids(), first_entities);

    let registry = harness.scheduler.registry();
    assert_eq!(harness.tracked(), vec![LAPTOP_ID.to_string(), "network_device_445566".to_string()]);
    assert_eq!(registry.name(LAPTOP_ID), Some("laptop"));
    assert_eq!(registry.name("network_device_445566"), Some("nas"));
    assert_eq!(harness.scheduler.cycles(), 2);
}

#[tokio::test]
async fn test_renamed_host_refreshes_registry_and_sensor() {
    let mut harness = TestHarness::new();
    harness.set_hosts(&[laptop()]);
    harness.cycle().await.unwrap();
    assert_eq!(harness.scheduler.registry().name(LAPTOP_ID), Some("laptop"));

    harness.set_hosts(&[laptop().name("work-laptop").vendor("Apple")]);
    let devices = harness.cycle().await.unwrap().devices.unwrap();
    assert_eq!((devices.new, devices.deleted), (0, 0));
    assert_eq!(harness.scheduler.registry().name(LAPTOP_ID), Some("work-laptop"));

    let sensor = harness.sink.entity(LAPTOP_ID).unwrap();
    assert_eq!(sensor.attributes["friendly_name"], json!("work-laptop"));
    assert_eq!(sensor.attributes["vendor"], json!("Apple"));
}

#[tokio::test]
async fn test_renamed_host_kept_on_failed_upsert() {
    let mut harness = TestHarness::new();
    harness.set_hosts(&[laptop()]);
    harness.cycle().await.unwrap();

    harness.set_hosts(&[laptop().name("work-laptop")]);
    harness.sink.fail_upsert(LAPTOP_ID, true);
    harness.cycle().await.unwrap();
    assert_eq!(harness.scheduler.registry().name(LAPTOP_ID), Some("laptop"));
}

#[tokio::test]
async fn test_vanished_device_removed_once() {
    let mut harness = TestHarness::new();
    let a = host("a", "00:00:00:aa:aa:aa", "10.0.0.1");
    let b = host("b", "00:00:00:bb:bb:bb", "10.0.0.2");
    let c = host("c", "00:00:00:cc:cc:cc", "10.0.0.3");

    harness.set_hosts(&[a.clone(), b, c.clone()]);
    harness.cycle().await.unwrap();
    assert_eq!(harness.tracked().len(), 3);

    harness.set_hosts(&[a, c]);
    let devices = harness.cycle().await.unwrap().devices.unwrap();
    assert_eq!(devices.stale, 1);
    assert_eq!(devices.deleted, 1);
    assert_eq!(harness.sink.deletes(), vec!["network_device_bbbbbb".to_string()]);
    assert!(!harness.tracked().contains(&"network_device_bbbbbb".to_string()));

    harness.sink.clear_log();
    let devices = harness.cycle().await.unwrap().devices.unwrap();
    assert_eq!(devices.deleted, 0);
    assert!(harness.sink.deletes().is_empty());
}

#[tokio::test]
async fn test_failed_upsert_not_tracked_then_retried() {
    let mut harness = TestHarness::new();
    harness.set_hosts(&[laptop(), host("nas", "11:22:33:44:55:66", "192.168.1.10")]);
    harness.sink.fail_upsert(LAPTOP_ID, true);

    let devices = harness.cycle().await.unwrap().devices.unwrap();
    assert_eq!((devices.upserted, devices.failed), (1, 1));
    assert_eq!(harness.tracked(), vec!["network_device_445566".to_string()]);

    harness.sink.fail_upsert(LAPTOP_ID, false);
    let devices = harness.cycle().await.unwrap().devices.unwrap();
    assert_eq!(devices.new, 1);
    assert!(harness.tracked().contains(&LAPTOP_ID.to_string()));
}

#[tokio::test]
async fn test_failed_delete_stays_tracked_and_retries() {
    let mut harness = TestHarness::new();
    harness.set_hosts(&[laptop()]);
    harness.cycle().await.unwrap();

    harness.set_hosts(&[]);
    harness.sink.fail_delete(LAPTOP_ID, true);
    let devices = harness.cycle().await.unwrap().devices.unwrap();
    assert_eq!((devices.deleted, devices.failed), (0, 1));
    assert_eq!(harness.tracked(), vec![LAPTOP_ID.to_string()]);

    harness.sink.fail_delete(LAPTOP_ID, false);
    let devices = harness.cycle().await.unwrap().devices.unwrap();
    assert_eq!(devices.deleted, 1);
    assert!(harness.tracked().is_empty());
    assert!(harness.sink.entity(LAPTOP_ID).is_none());
}

#[tokio::test]
async fn test_orphaned_sensors_cleaned_by_keep_set() {
    let mut harness = TestHarness::new();
    harness.sink.seed("network_device_deadbe", json!("2023-01-01T00:00:00"));
    harness.sink.seed("speedtest_upload", json!(1.0));
    harness.set_hosts(&[laptop()]);

    let devices = harness.cycle().await.unwrap().devices.unwrap();
    assert_eq!(devices.deleted, 1);
    assert_eq!(harness.sink.deletes(), vec!["network_device_deadbe".to_string()]);
    assert!(harness.sink.entity("speedtest_upload").is_some());
    assert!(harness.sink.entity(LAPTOP_ID).is_some());
}

#[tokio::test]
async fn test_list_failure_falls_back_to_registry() {
    let mut harness = TestHarness::new();
    harness.sink.seed("network_device_deadbe", json!("x"));
    harness.set_hosts(&[laptop()]);
    harness.sink.fail_list(true);

    let devices = harness.cycle().await.unwrap().devices.unwrap();
    assert_eq!(devices.deleted, 0);
    assert_eq!(devices.upserted, 1);
    assert!(harness.sink.entity("network_device_deadbe").is_some());
}

#[tokio::test]
async fn test_authentication_failure_abandons_cycle() {
    let mut harness = TestHarness::new();
    harness.set_hosts(&[laptop()]);
    harness.cycle().await.unwrap();

    harness.discovery.fail_hosts(Some(DiscoveryError::Authentication("401".into())));
    harness.discovery.set_speedtest(Some(measurement(1_700_000_000, 1.0, 2.0)));
    harness.sink.clear_log();

    assert!(harness.cycle().await.is_err());
    assert_eq!(harness.scheduler.state(), SchedulerState::Idle);
    assert_eq!(harness.tracked(), vec![LAPTOP_ID.to_string()]);
    assert!(harness.sink.upserts().is_empty());
    assert!(harness.sink.deletes().is_empty());
    assert_eq!(harness.discovery.speedtest_calls(), 1);
    assert_eq!(harness.scheduler.last_speedtest(), None);
}

#[tokio::test]
async fn test_transient_host_failure_still_emits_speedtest() {
    let mut harness = TestHarness::new();
    harness.set_hosts(&[laptop()]);
    harness.cycle().await.unwrap();

    harness.discovery.fail_hosts(Some(DiscoveryError::Transient("timeout".into())));
    harness.discovery.set_speedtest(Some(measurement(1_700_000_000, 1.0, 2.0)));

    let report = harness.cycle().await.unwrap();
    assert!(report.devices.is_none());
    assert!(report.speedtest_emitted);
    // A failed snapshot says nothing about vanished devices.
    assert_eq!(harness.tracked(), vec![LAPTOP_ID.to_string()]);
    assert!(harness.sink.deletes().is_empty());
}

#[tokio::test]
async fn test_odd_policy_block_keeps_live_sensor() {
    let mut harness = TestHarness::new();
    harness.set_hosts(&[laptop()]);
    harness.cycle().await.unwrap();

    let odd = HostBuilder::named("laptop", "AA:BB:CC:11:22:33")
        .ip("192.168.1.50")
        .set_string("policy", "none");
    harness.set_hosts(&[odd]);
    let devices = harness.cycle().await.unwrap().devices.unwrap();
    assert_eq!((devices.total, devices.deleted), (1, 0));
    assert!(harness.sink.deletes().is_empty());
    assert!(harness.sink.entity(LAPTOP_ID).is_some());
}

#[tokio::test]
async fn test_speedtest_failure_keeps_device_stage() {
    let mut harness = TestHarness::new();
    harness.set_hosts(&[laptop()]);
    harness.discovery.set_speedtest(Some(measurement(1_700_000_000, 1.0, 2.0)));
    harness.discovery.fail_speedtest(Some(DiscoveryError::Transient("timeout".into())));

    let report = harness.cycle().await.unwrap();
    assert_eq!(report.devices.unwrap().upserted, 1);
    assert!(!report.speedtest_emitted);
    assert_eq!(harness.scheduler.last_speedtest(), None);
    assert!(harness.sink.entity(SPEEDTEST_UPLOAD_ID).is_none());

    harness.discovery.fail_speedtest(None);
    let report = harness.cycle().await.unwrap();
    assert!(report.speedtest_emitted);
    assert_eq!(harness.scheduler.last_speedtest(), Some(1_700_000_000));
    assert_eq!(harness.sink.upsert_count(SPEEDTEST_UPLOAD_ID), 1);
}

#[tokio::test]
async fn test_speedtest_written_once_per_timestamp() {
    let sink = MockSink::new();
    let mut dedup = SpeedtestDeduplicator::new(TimeZoneMode::Utc);
    let first = measurement(1_700_000_000, 20.456, 300.111);

    assert!(dedup.maybe_emit(&sink, &first).await);
    assert!(!dedup.maybe_emit(&sink, &first).await);
    assert_eq!(sink.upsert_count(SPEEDTEST_UPLOAD_ID), 1);
    assert_eq!(sink.upsert_count(SPEEDTEST_DOWNLOAD_ID), 1);

    let upload = sink.entity(SPEEDTEST_UPLOAD_ID).unwrap();
    assert_eq!(upload.state, json!(20.46));
    assert_eq!(upload.attributes["timestamp"], json!("2023-11-14T22:13:20"));
    assert_eq!(sink.entity(SPEEDTEST_DOWNLOAD_ID).unwrap().state, json!(300.11));

    assert!(dedup.maybe_emit(&sink, &measurement(1_700_003_600, 20.456, 300.111)).await);
    assert_eq!(sink.upsert_count(SPEEDTEST_UPLOAD_ID), 2);
    assert_eq!(dedup.last_emitted(), Some(1_700_003_600));
}

#[tokio::test]
async fn test_failed_speedtest_write_is_retried() {
    let sink = MockSink::new();
    let mut dedup = SpeedtestDeduplicator::new(TimeZoneMode::Utc);
    let m = measurement(1_700_000_000, 20.456, 300.111);

    sink.fail_upsert(SPEEDTEST_DOWNLOAD_ID, true);
    assert!(!dedup.maybe_emit(&sink, &m).await);
    assert_eq!(dedup.last_emitted(), None);

    sink.fail_upsert(SPEEDTEST_DOWNLOAD_ID, false);
    assert!(dedup.maybe_emit(&sink, &m).await);
    assert_eq!(dedup.last_emitted(), Some(1_700_000_000));
    assert_eq!(sink.upsert_count(SPEEDTEST_DOWNLOAD_ID), 1);
}

#[tokio::test]
async fn test_devices_without_mac_are_counted_not_written() {
    let mut harness = TestHarness::new();
    harness.set_hosts(&[laptop(), HostBuilder::new().name("printer").ip("10.0.0.7")]);

    let devices = harness.cycle().await.unwrap().devices.unwrap();
    assert_eq!(devices.total, 2);
    assert_eq!(devices.upserted, 1);
    assert_eq!(harness.sink.entity_ids(), vec![LAPTOP_ID.to_string()]);
}

#[tokio::test]
async fn test_scheduler_runs_first_cycle_immediately() {
    let harness = TestHarness::new();
    harness.set_hosts(&[laptop()]);
    let sink = harness.sink.clone();
    let discovery = harness.discovery.clone();

    let handle = tokio::spawn(harness.scheduler.run());
    tokio::time::sleep(std::time::Duration::from_millis(120)).await;
    handle.abort();

    assert!(discovery.host_calls() >= 2);
    assert!(sink.upsert_count(LAPTOP_ID) >= 1);
}
