use std::path::Path;

use time::PrimitiveDateTime;

use super::{decode_ring, RingFileError, RingImage};
use crate::domain::{Granularity, SlotDelta, SlotRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowUsage {
    pub record: SlotRecord,
    pub window_start: Option<PrimitiveDateTime>,
    /// Usage inside this window; `None` for the oldest window, after a gap,
    /// or across a counter reset.
    pub delta: Option<SlotDelta>,
}

/// Load a ring file from `dir`.
pub fn load_ring(dir: &Path, granularity: Granularity) -> Result<RingImage, RingFileError> {
    let bytes = std::fs::read(dir.join(granularity.file_name()))?;
    decode_ring(granularity, &bytes)
}

/// Live records in chronological order.
pub fn history(slots: &[Option<SlotRecord>]) -> Vec<SlotRecord> {
    let mut live: Vec<SlotRecord> = slots.iter().skip(1).flatten().copied().collect();
    live.sort_by_key(|r| r.label);
    live
}

/// Per-window usage from a chronological history.
pub fn usage_per_window(granularity: Granularity, history: &[SlotRecord]) -> Vec<WindowUsage> {
    let mut out = Vec::with_capacity(history.len());
    let mut previous: Option<&SlotRecord> = None;

    for record in history {
        let delta = previous
            .filter(|p| p.label + 1 == record.label)
            .and_then(|p| record.delta_since(p));
        out.push(WindowUsage {
            record: *record,
            window_start: granularity.window_start(record.label),
            delta,
        });
        previous = Some(record);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Decimal3;

    fn rec(label: u32, edt1: i64) -> SlotRecord {
        SlotRecord {
            label,
            edt1: Decimal3::from_thousandths(edt1),
            edt2: Decimal3::ZERO,
            ert1: Decimal3::ZERO,
            ert2: Decimal3::ZERO,
            gdt: Decimal3::ZERO,
        }
    }

    #[test]
    fn history_skips_header_and_sorts_wrapped_ring() {
        // 48 wrapped onto index 1, 47 still at index 48.
        let mut slots = vec![None; Granularity::Hours.slots()];
        slots[1] = Some(rec(48, 3));
        slots[48] = Some(rec(47, 2));
        slots[47] = Some(rec(46, 1));

        let labels: Vec<u32> = history(&slots).iter().map(|r| r.label).collect();
        assert_eq!(labels, vec![46, 47, 48]);
    }

    #[test]
    fn usage_needs_adjacent_windows() {
        let hist = vec![rec(10, 1_000), rec(11, 1_400), rec(13, 2_000)];
        let usage = usage_per_window(Granularity::Days, &hist);

        assert_eq!(usage[0].delta, None);
        assert_eq!(usage[1].delta.map(|d| d.edt1.thousandths()), Some(400));
        assert_eq!(usage[2].delta, None);
        assert!(usage[0].window_start.is_some());
    }
}
