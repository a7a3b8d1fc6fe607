use crate::config::TimeZoneMode;
use crate::models::Measurement;
use crate::normalize::format_epoch;
use crate::payload::speedtest_payloads;
use crate::sink::Sink;
use tracing::{debug, error, info};

/// Rounds to two decimals, the precision of the speed sensors.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Writes a speed test only once per measurement timestamp.
#[derive(Debug, Clone)]
pub struct SpeedtestDeduplicator {
    last_emitted: Option<i64>,
    zone: TimeZoneMode,
}

impl SpeedtestDeduplicator {
    pub fn new(zone: TimeZoneMode) -> Self {
        Self { last_emitted: None, zone }
    }

    pub fn last_emitted(&self) -> Option<i64> {
        self.last_emitted
    }

    /// Emits upload and download sensors unless this timestamp was already written.
    ///
    /// The timestamp is only recorded once both writes succeeded, so a failed
    /// emission is retried with the next measurement fetch.
    pub async fn maybe_emit(&mut self, sink: &dyn Sink, measurement: &Measurement) -> bool {
        if self.last_emitted == Some(measurement.timestamp) {
            debug!(timestamp = measurement.timestamp, "speed test unchanged");
            return false;
        }
        let Some(stamp) = format_epoch(measurement.timestamp as f64, self.zone) else {
            error!(timestamp = measurement.timestamp, "speed test timestamp out of range");
            return false;
        };

        let upload = round2(measurement.upload_mbps);
        let download = round2(measurement.download_mbps);
        info!("speedTest {upload} Mbit/s up, {download} Mbit/s down (timestamp {stamp})");

        let [up, down] = speedtest_payloads(upload, download, &stamp);
        let (up_result, down_result) = tokio::join!(sink.upsert(&up), sink.upsert(&down));

        let mut emitted = true;
        for (id, outcome) in [(&up.id, up_result), (&down.id, down_result)] {
            if let Err(e) = outcome {
                error!(id = %id, "Failed to write speed test: {e}");
                emitted = false;
            }
        }
        if emitted {
            self.last_emitted = Some(measurement.timestamp);
        }
        emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(20.456), 20.46);
        assert_eq!(round2(300.111), 300.11);
        assert_eq!(round2(99.999), 100.0);
        assert_eq!(round2(0.0), 0.0);
    }

    #[test]
    fn test_starts_without_timestamp() {
        assert_eq!(SpeedtestDeduplicator::new(TimeZoneMode::Utc).last_emitted(), None);
    }
}
