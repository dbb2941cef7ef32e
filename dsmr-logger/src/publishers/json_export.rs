use std::{
    fs,
    path::{Path, PathBuf},
};

use dsmr_client::{Granularity, MeterReading, SlotRecord};
use serde::Serialize;

use super::{PublishError, Publisher};
use crate::state::{HealthCounters, Snapshot};

#[derive(Serialize)]
struct ExportedSlot {
    /// Packed label as stored in the ring file (YYMMDDHH, YYMMDD, YYMM).
    window: Option<String>,
    #[serde(flatten)]
    record: SlotRecord,
}

#[derive(Serialize)]
struct ExportedRing {
    granularity: &'static str,
    last_committed: Option<u32>,
    needs_repopulation: bool,
    slots: Vec<ExportedSlot>,
}

#[derive(Serialize)]
struct ExportDocument<'a> {
    hostname: &'a str,
    reading: Option<&'a MeterReading>,
    counters: &'a HealthCounters,
    rings: Vec<ExportedRing>,
}

/// Writes the whole snapshot as one JSON document, replaced atomically.
pub struct JsonExportPublisher {
    hostname: String,
    path: PathBuf,
}

impl JsonExportPublisher {
    pub fn new(hostname: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            hostname: hostname.into(),
            path: path.into(),
        }
    }

    fn document<'a>(&'a self, snapshot: &Snapshot<'a>) -> ExportDocument<'a> {
        let rings = Granularity::ALL
            .into_iter()
            .map(|g| {
                let ring = snapshot.rings.get(g);
                ExportedRing {
                    granularity: g.as_str(),
                    last_committed: ring.last_committed(),
                    needs_repopulation: ring.needs_repopulation(),
                    slots: ring
                        .history()
                        .into_iter()
                        .map(|record| ExportedSlot {
                            window: g.label_text(record.label),
                            record,
                        })
                        .collect(),
                }
            })
            .collect();

        ExportDocument {
            hostname: &self.hostname,
            reading: snapshot.reading,
            counters: snapshot.counters,
            rings,
        }
    }
}

fn io_error(path: &Path, source: std::io::Error) -> PublishError {
    PublishError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl Publisher for JsonExportPublisher {
    fn name(&self) -> &'static str {
        "json-export"
    }

    fn publish(&mut self, snapshot: &Snapshot<'_>) -> Result<(), PublishError> {
        let body = serde_json::to_vec_pretty(&self.document(snapshot))
            .map_err(|e| PublishError::Serialize(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &body).map_err(|e| io_error(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| io_error(&self.path, e))?;
        tracing::debug!(path = %self.path.display(), bytes = body.len(), "snapshot exported");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        state::LoggerState,
        store::{storage::mem::MemStorage, RingSet},
    };
    use time::macros::datetime;

    #[test]
    fn exports_reading_counters_and_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");

        let mut state = LoggerState::new(RingSet::new(MemStorage::default()), 3);
        state.hydrate();
        let mut reading = MeterReading::empty(datetime!(2024-10-18 14:00:05 +02:00));
        reading.energy_delivered_tariff1 = "123.456".parse().unwrap();
        reading.valid = true;
        let label = Granularity::Hours
            .window_of(datetime!(2024-10-18 13:00:00 +02:00))
            .unwrap();
        state
            .rings
            .get_mut(Granularity::Hours)
            .commit(SlotRecord::from_reading(label, &reading))
            .unwrap();
        state.latest = Some(reading);

        let mut publisher = JsonExportPublisher::new("DSMR-API", &path);
        publisher.publish(&state.snapshot()).unwrap();

        let doc: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(doc["hostname"], "DSMR-API");
        assert_eq!(doc["counters"]["reboots"], 3);
        assert_eq!(doc["reading"]["energy_delivered_tariff1"], 123.456);
        assert_eq!(doc["rings"][0]["granularity"], "hours");
        assert_eq!(doc["rings"][0]["slots"][0]["window"], "24101813");
        assert_eq!(doc["rings"][0]["slots"][0]["edt1"], 123.456);
        assert_eq!(doc["rings"][1]["slots"].as_array().unwrap().len(), 0);
        assert!(!dir.path().join("snapshot.json.tmp").exists());
    }
}
