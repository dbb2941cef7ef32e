use dsmr_client::{MeterReading, SlotRecord};

use crate::{
    state::LoggerState,
    store::CommitOutcome,
    timebase::Boundary,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloverResult {
    Committed,
    /// Committed in memory, the file write failed.
    CommittedMemoryOnly,
    /// Boundary already committed earlier, or the ring holds a later label.
    Stale,
    /// No valid reading since boot, nothing written.
    Deferred,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolloverEvent {
    pub boundary: Boundary,
    pub result: RolloverResult,
    pub record: Option<SlotRecord>,
}

/// Pure construction of the slot record for a closed window.
///
/// Rules:
/// - the record carries the closed window's key, not the new one;
/// - without a valid reading there is no record (no zero-filled history).
pub fn build_record(boundary: &Boundary, reading: Option<&MeterReading>) -> Option<SlotRecord> {
    reading
        .filter(|r| r.valid)
        .map(|r| SlotRecord::from_reading(boundary.closed, r))
}

/// Commit one record per boundary, in the order given (finest first).
///
/// All boundaries of a tick use the same reading. Failures are counted and
/// logged here; nothing is propagated.
pub fn roll_over(state: &mut LoggerState, boundaries: &[Boundary]) -> Vec<RolloverEvent> {
    let reading = state.latest_valid().cloned();
    let mut events = Vec::with_capacity(boundaries.len());

    for boundary in boundaries {
        let g = boundary.granularity;
        let Some(record) = build_record(boundary, reading.as_ref()) else {
            tracing::info!(ring = %g, closed = boundary.closed, "no valid telegram yet, rollover deferred");
            state.counters.deferred_rollover(g);
            events.push(RolloverEvent {
                boundary: *boundary,
                result: RolloverResult::Deferred,
                record: None,
            });
            continue;
        };

        let result = match state.rings.get_mut(g).commit(record) {
            Ok(CommitOutcome::Persisted { index }) => {
                tracing::info!(ring = %g, label = record.label, index, "slot committed");
                state.counters.rollover(g);
                RolloverResult::Committed
            }
            Ok(CommitOutcome::MemoryOnly { index, error }) => {
                tracing::warn!(ring = %g, label = record.label, index, error = %error, "slot kept in memory only");
                state.counters.rollover(g);
                state.counters.storage_errors(1);
                RolloverResult::CommittedMemoryOnly
            }
            Ok(CommitOutcome::Stale { last_committed }) if last_committed > record.label.saturating_add(1) => {
                // History ends in the future: an earlier clock excursion. Commits
                // resume once real time passes `last_committed`.
                tracing::warn!(
                    ring = %g,
                    label = record.label,
                    last_committed,
                    ahead = last_committed - record.label,
                    "ring history is ahead of the clock, rollover refused"
                );
                state.counters.clock_anomaly();
                RolloverResult::Stale
            }
            Ok(CommitOutcome::Stale { last_committed }) => {
                tracing::debug!(ring = %g, label = record.label, last_committed, "boundary already committed");
                RolloverResult::Stale
            }
            Err(e) => {
                tracing::error!(ring = %g, error = %e, "rollover failed");
                state.counters.storage_errors(1);
                RolloverResult::Failed
            }
        };

        events.push(RolloverEvent {
            boundary: *boundary,
            result,
            record: Some(record),
        });
    }

    events
}
