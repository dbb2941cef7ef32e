use dsmr_client::{Granularity, MeterReading};
use serde::Serialize;

use crate::store::RingSet;

/// Diagnostics counters; every increment is mirrored to `metrics`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HealthCounters {
    pub telegrams: u64,
    pub telegram_errors: u64,
    pub storage_errors: u64,
    pub reboots: u32,
    pub rollovers: u64,
    pub deferred_rollovers: u64,
    pub clock_anomalies: u64,
}

impl HealthCounters {
    pub fn telegram_ok(&mut self) {
        self.telegrams += 1;
        metrics::counter!("telegrams_total").increment(1);
    }

    pub fn telegram_error(&mut self) {
        self.telegram_errors += 1;
        metrics::counter!("telegram_errors_total").increment(1);
    }

    pub fn storage_errors(&mut self, n: u32) {
        if n == 0 {
            return;
        }
        self.storage_errors += u64::from(n);
        metrics::counter!("ring_storage_errors_total").increment(u64::from(n));
    }

    pub fn rollover(&mut self, granularity: Granularity) {
        self.rollovers += 1;
        metrics::counter!("rollovers_total", "ring" => granularity.as_str()).increment(1);
    }

    pub fn deferred_rollover(&mut self, granularity: Granularity) {
        self.deferred_rollovers += 1;
        metrics::counter!("rollovers_deferred_total", "ring" => granularity.as_str()).increment(1);
    }

    pub fn clock_anomaly(&mut self) {
        self.clock_anomalies += 1;
        metrics::counter!("clock_anomalies_total").increment(1);
    }
}

/// Everything the loop mutates, passed explicitly to each component.
pub struct LoggerState {
    pub latest: Option<MeterReading>,
    pub counters: HealthCounters,
    pub rings: RingSet,
}

/// Read-only view handed to publishers.
#[derive(Clone, Copy)]
pub struct Snapshot<'a> {
    pub reading: Option<&'a MeterReading>,
    pub counters: &'a HealthCounters,
    pub rings: &'a RingSet,
}

impl LoggerState {
    pub fn new(rings: RingSet, reboots: u32) -> Self {
        Self {
            latest: None,
            counters: HealthCounters {
                reboots,
                ..HealthCounters::default()
            },
            rings,
        }
    }

    /// Hydrate every ring; problems are counted, never fatal.
    pub fn hydrate(&mut self) {
        for (granularity, report) in self.rings.hydrate_all() {
            self.counters.storage_errors(report.storage_errors);
            if self.rings.get(granularity).needs_repopulation() {
                tracing::warn!(ring = %granularity, rewritten = report.reinitialized, "ring needs repopulation");
            }
        }
    }

    /// Install a freshly decoded reading as the latest one.
    ///
    /// Gas arrives over M-Bus and is sometimes absent from a telegram; the
    /// last known gas counter is kept rather than dropped to zero.
    pub fn accept(&mut self, mut reading: MeterReading) {
        if reading.gas_delivered.is_none() {
            reading.gas_delivered = self.latest.as_ref().and_then(|r| r.gas_delivered);
        }
        self.latest = Some(reading);
    }

    /// Latest reading, if one with the validity flag set has been ingested.
    pub fn latest_valid(&self) -> Option<&MeterReading> {
        self.latest.as_ref().filter(|r| r.valid)
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            reading: self.latest.as_ref(),
            counters: &self.counters,
            rings: &self.rings,
        }
    }
}
