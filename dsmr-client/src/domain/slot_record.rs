use super::{Decimal3, MeterReading};

/// One ring entry: cumulative meter state at the close of window `label`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SlotRecord {
    pub label: u32,
    pub edt1: Decimal3,
    pub edt2: Decimal3,
    pub ert1: Decimal3,
    pub ert2: Decimal3,
    pub gdt: Decimal3,
}

/// Consumption within one window, derived from two adjacent records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SlotDelta {
    pub edt1: Decimal3,
    pub edt2: Decimal3,
    pub ert1: Decimal3,
    pub ert2: Decimal3,
    pub gdt: Decimal3,
}

impl SlotRecord {
    pub fn from_reading(label: u32, reading: &MeterReading) -> Self {
        Self {
            label,
            edt1: reading.energy_delivered_tariff1,
            edt2: reading.energy_delivered_tariff2,
            ert1: reading.energy_returned_tariff1,
            ert2: reading.energy_returned_tariff2,
            gdt: reading.gas_delivered.unwrap_or(Decimal3::ZERO),
        }
    }

    pub fn fields(&self) -> [Decimal3; 5] {
        [self.edt1, self.edt2, self.ert1, self.ert2, self.gdt]
    }

    /// Usage between `earlier` and `self`.
    ///
    /// `None` when any counter went backwards (meter exchanged or reset).
    pub fn delta_since(&self, earlier: &SlotRecord) -> Option<SlotDelta> {
        let d = |now: Decimal3, before: Decimal3| {
            now.checked_sub(before).filter(|v| !v.is_negative())
        };
        Some(SlotDelta {
            edt1: d(self.edt1, earlier.edt1)?,
            edt2: d(self.edt2, earlier.edt2)?,
            ert1: d(self.ert1, earlier.ert1)?,
            ert2: d(self.ert2, earlier.ert2)?,
            gdt: d(self.gdt, earlier.gdt)?,
        })
    }
}
