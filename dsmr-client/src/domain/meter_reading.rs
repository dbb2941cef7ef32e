use time::OffsetDateTime;

use super::Decimal3;

/// One decoded telegram: cumulative counters plus instantaneous values.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MeterReading {
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub received_at: OffsetDateTime,
    pub meter_timestamp: Option<String>,
    pub equipment_id: Option<String>,
    pub energy_delivered_tariff1: Decimal3,
    pub energy_delivered_tariff2: Decimal3,
    pub energy_returned_tariff1: Decimal3,
    pub energy_returned_tariff2: Decimal3,
    pub power_delivered: Option<Decimal3>,
    pub power_returned: Option<Decimal3>,
    pub gas_delivered: Option<Decimal3>,
    /// L1..L3
    pub voltage: [Option<Decimal3>; 3],
    pub current: [Option<Decimal3>; 3],
    pub electricity_failures: Option<u32>,
    pub electricity_long_failures: Option<u32>,
    pub sags: [Option<u32>; 3],
    pub swells: [Option<u32>; 3],
    pub valid: bool,
}

impl MeterReading {
    /// A reading with every counter at zero and `valid` unset.
    pub fn empty(received_at: OffsetDateTime) -> Self {
        Self {
            received_at,
            meter_timestamp: None,
            equipment_id: None,
            energy_delivered_tariff1: Decimal3::ZERO,
            energy_delivered_tariff2: Decimal3::ZERO,
            energy_returned_tariff1: Decimal3::ZERO,
            energy_returned_tariff2: Decimal3::ZERO,
            power_delivered: None,
            power_returned: None,
            gas_delivered: None,
            voltage: [None; 3],
            current: [None; 3],
            electricity_failures: None,
            electricity_long_failures: None,
            sags: [None; 3],
            swells: [None; 3],
            valid: false,
        }
    }

    pub fn energy_delivered_total(&self) -> Decimal3 {
        Decimal3::from_thousandths(
            self.energy_delivered_tariff1.thousandths() + self.energy_delivered_tariff2.thousandths(),
        )
    }

    pub fn energy_returned_total(&self) -> Decimal3 {
        Decimal3::from_thousandths(
            self.energy_returned_tariff1.thousandths() + self.energy_returned_tariff2.thousandths(),
        )
    }
}
