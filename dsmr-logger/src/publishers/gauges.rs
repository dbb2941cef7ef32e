use dsmr_client::Decimal3;

use super::{PublishError, Publisher};
use crate::state::Snapshot;

/// Mirrors the latest reading into `metrics` gauges for the Prometheus endpoint.
#[derive(Default)]
pub struct MetricsPublisher;

fn set(name: &'static str, value: Decimal3) {
    metrics::gauge!(name).set(value.as_f64());
}

impl Publisher for MetricsPublisher {
    fn name(&self) -> &'static str {
        "prometheus"
    }

    fn publish(&mut self, snapshot: &Snapshot<'_>) -> Result<(), PublishError> {
        let Some(r) = snapshot.reading.filter(|r| r.valid) else {
            return Ok(());
        };

        metrics::gauge!("energy_delivered_kwh", "tariff" => "1").set(r.energy_delivered_tariff1.as_f64());
        metrics::gauge!("energy_delivered_kwh", "tariff" => "2").set(r.energy_delivered_tariff2.as_f64());
        metrics::gauge!("energy_returned_kwh", "tariff" => "1").set(r.energy_returned_tariff1.as_f64());
        metrics::gauge!("energy_returned_kwh", "tariff" => "2").set(r.energy_returned_tariff2.as_f64());
        if let Some(p) = r.power_delivered {
            set("power_delivered_kw", p);
        }
        if let Some(p) = r.power_returned {
            set("power_returned_kw", p);
        }
        if let Some(g) = r.gas_delivered {
            set("gas_delivered_m3", g);
        }
        for (phase, v) in ["l1", "l2", "l3"].into_iter().zip(r.voltage) {
            if let Some(v) = v {
                metrics::gauge!("voltage_v", "phase" => phase).set(v.as_f64());
            }
        }
        for (phase, a) in ["l1", "l2", "l3"].into_iter().zip(r.current) {
            if let Some(a) = a {
                metrics::gauge!("current_a", "phase" => phase).set(a.as_f64());
            }
        }
        metrics::gauge!("reboots").set(f64::from(snapshot.counters.reboots));
        Ok(())
    }
}
