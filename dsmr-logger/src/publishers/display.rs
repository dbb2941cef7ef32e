use super::{PublishError, Publisher};
use crate::state::Snapshot;

/// Periodic one-line summary of the latest reading in the log.
pub struct DisplayPublisher {
    hostname: String,
}

impl DisplayPublisher {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
        }
    }
}

impl Publisher for DisplayPublisher {
    fn name(&self) -> &'static str {
        "display"
    }

    fn publish(&mut self, snapshot: &Snapshot<'_>) -> Result<(), PublishError> {
        let c = snapshot.counters;
        match snapshot.reading {
            Some(r) => tracing::info!(
                host = %self.hostname,
                delivered_kwh = %r.energy_delivered_total(),
                returned_kwh = %r.energy_returned_total(),
                power_kw = %r.power_delivered.unwrap_or_default(),
                gas_m3 = %r.gas_delivered.unwrap_or_default(),
                telegrams = c.telegrams,
                errors = c.telegram_errors,
                "meter"
            ),
            None => tracing::info!(
                host = %self.hostname,
                telegrams = c.telegrams,
                errors = c.telegram_errors,
                "waiting for first telegram"
            ),
        }
        Ok(())
    }
}
