use dsmr_client::{
    ring_file::{self, queries, RECLEN},
    Granularity, SlotRecord,
};

use super::storage::{FlashStorage, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingState {
    Uninitialized,
    Hydrated,
    Committing,
}

/// Result of loading a ring at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hydrated {
    pub live: usize,
    pub discarded: usize,
    /// The file was missing or unusable and has been rewritten blank.
    pub reinitialized: bool,
    pub storage_errors: u32,
}

#[derive(Debug)]
pub enum CommitOutcome {
    Persisted { index: usize },
    /// Memory holds the record but the file write failed; the slot is lost
    /// on the next boot unless a later commit rewrites it.
    MemoryOnly { index: usize, error: StorageError },
    /// Label not newer than the last committed one: the boundary was
    /// already rolled over.
    Stale { last_committed: u32 },
}

/// Fixed-size ring of slot records mirrored 1:1 into a fixed-record file.
pub struct RingStore {
    granularity: Granularity,
    slots: Vec<Option<SlotRecord>>,
    state: RingState,
    storage: Box<dyn FlashStorage>,
    last_committed: Option<u32>,
    needs_repopulation: bool,
}

impl RingStore {
    pub fn new(granularity: Granularity, storage: Box<dyn FlashStorage>) -> Self {
        Self {
            granularity,
            slots: vec![None; granularity.slots()],
            state: RingState::Uninitialized,
            storage,
            last_committed: None,
            needs_repopulation: false,
        }
    }

    pub fn hydrate(&mut self) -> Hydrated {
        let g = self.granularity;
        let mut storage_errors = 0;

        // `None` with `rewrite` unset: the file may still be fine, it just
        // could not be read now, so it is left alone.
        let (image, rewrite) = match self.storage.read(g.file_name()) {
            Ok(Some(bytes)) => match ring_file::decode_ring(g, &bytes) {
                Ok(image) => (Some(image), false),
                Err(e) => {
                    tracing::warn!(ring = %g, error = %e, "ring file unusable, starting empty");
                    (None, true)
                }
            },
            Ok(None) => {
                tracing::info!(ring = %g, "no ring file yet, starting empty");
                (None, true)
            }
            Err(e) => {
                tracing::warn!(ring = %g, error = %e, "ring file unreadable, starting empty in memory");
                storage_errors += 1;
                (None, false)
            }
        };

        let needs_repopulation = image.is_none();
        let discarded = match image {
            Some(image) => {
                self.slots = image.slots;
                image.discarded
            }
            None => {
                self.slots = vec![None; g.slots()];
                if rewrite {
                    if let Err(e) = self.storage.write_all(g.file_name(), &ring_file::blank_ring(g)) {
                        tracing::error!(ring = %g, error = %e, "failed to reinitialize ring file");
                        storage_errors += 1;
                    }
                }
                0
            }
        };
        if discarded > 0 {
            tracing::warn!(ring = %g, discarded, "dropped unreadable ring records");
        }

        self.needs_repopulation = needs_repopulation;
        self.last_committed = self.slots.iter().flatten().map(|r| r.label).max();
        self.state = RingState::Hydrated;

        let live = self.slots.iter().flatten().count();
        tracing::info!(ring = %g, live, reinitialized = rewrite, "ring hydrated");

        Hydrated {
            live,
            discarded,
            reinitialized: rewrite,
            storage_errors,
        }
    }

    pub fn commit(&mut self, record: SlotRecord) -> Result<CommitOutcome, StorageError> {
        let g = self.granularity;
        if self.state == RingState::Uninitialized {
            return Err(StorageError::NotHydrated(g));
        }
        if let Some(last) = self.last_committed {
            if record.label <= last {
                return Ok(CommitOutcome::Stale { last_committed: last });
            }
        }

        let index = ring_file::slot_index(g, record.label);
        self.state = RingState::Committing;
        self.slots[index] = Some(record);
        self.last_committed = Some(record.label);

        let written = ring_file::encode_record(g, Some(&record))
            .map_err(StorageError::from)
            .and_then(|bytes| self.storage.write_at(g.file_name(), (index * RECLEN) as u64, &bytes));
        self.state = RingState::Hydrated;

        Ok(match written {
            Ok(()) => CommitOutcome::Persisted { index },
            Err(error) => CommitOutcome::MemoryOnly { index, error },
        })
    }

    /// Record at `index`; the header slot and empty slots yield `None`.
    pub fn slot(&self, index: usize) -> Option<&SlotRecord> {
        if index == 0 {
            return None;
        }
        self.slots.get(index)?.as_ref()
    }

    pub fn slots(&self) -> &[Option<SlotRecord>] {
        &self.slots
    }

    /// Live records, oldest first.
    pub fn history(&self) -> Vec<SlotRecord> {
        queries::history(&self.slots)
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn state(&self) -> RingState {
        self.state
    }

    pub fn last_committed(&self) -> Option<u32> {
        self.last_committed
    }

    pub fn needs_repopulation(&self) -> bool {
        self.needs_repopulation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::storage::mem::MemStorage;
    use dsmr_client::Decimal3;

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

    fn hydrated(g: Granularity, storage: &MemStorage) -> RingStore {
        let mut ring = RingStore::new(g, Box::new(storage.clone()));
        ring.hydrate();
        ring
    }

    #[test]
    fn hydrate_without_file_creates_blank_ring() {
        let storage = MemStorage::default();
        let mut ring = RingStore::new(Granularity::Hours, Box::new(storage.clone()));
        assert_eq!(ring.state(), RingState::Uninitialized);

        let report = ring.hydrate();
        assert!(report.reinitialized);
        assert!(ring.needs_repopulation());
        assert_eq!(ring.state(), RingState::Hydrated);
        assert_eq!(ring.slots().len(), 49);
        assert_eq!(
            storage.file("RINGhours.csv").unwrap(),
            ring_file::blank_ring(Granularity::Hours)
        );
    }

    #[test]
    fn short_or_foreign_file_is_reinitialized() {
        let storage = MemStorage::default();
        storage
            .files
            .borrow_mut()
            .insert("RINGdays.csv".into(), b"garbage".to_vec());
        let ring = hydrated(Granularity::Days, &storage);
        assert!(ring.needs_repopulation());
        assert_eq!(storage.file("RINGdays.csv").unwrap().len(), 15 * RECLEN);

        // Right length, wrong header (an hours file where days are expected).
        let mut other = ring_file::blank_ring(Granularity::Days);
        other[..RECLEN].copy_from_slice(&ring_file::header_record(Granularity::Hours)[..RECLEN]);
        storage.files.borrow_mut().insert("RINGdays.csv".into(), other);
        let ring = hydrated(Granularity::Days, &storage);
        assert!(ring.needs_repopulation());
    }

    #[test]
    fn wraparound_overwrites_oldest_hour() {
        let storage = MemStorage::default();
        let mut ring = hydrated(Granularity::Hours, &storage);

        for label in 0..=48 {
            let outcome = ring.commit(rec(label, i64::from(label) * 1_000)).unwrap();
            assert!(matches!(outcome, CommitOutcome::Persisted { .. }));
        }

        assert_eq!(ring.slot(1).map(|r| r.label), Some(48));
        for label in 1..=48u32 {
            let index = (label % 48) as usize + 1;
            assert_eq!(ring.slot(index).map(|r| r.label), Some(label), "label {label}");
        }
        assert!(ring.slots().iter().flatten().all(|r| r.label != 0));
        assert_eq!(ring.slots().len(), 49);
    }

    #[test]
    fn second_commit_for_same_boundary_is_stale() {
        let storage = MemStorage::default();
        let mut ring = hydrated(Granularity::Days, &storage);

        ring.commit(rec(100, 5_000)).unwrap();
        let outcome = ring.commit(rec(100, 9_999)).unwrap();
        assert!(matches!(outcome, CommitOutcome::Stale { last_committed: 100 }));

        let older = ring.commit(rec(99, 1)).unwrap();
        assert!(matches!(older, CommitOutcome::Stale { .. }));

        let index = ring_file::slot_index(Granularity::Days, 100);
        assert_eq!(ring.slot(index).unwrap().edt1.thousandths(), 5_000);
    }

    #[test]
    fn committed_slots_survive_reboot() {
        let storage = MemStorage::default();
        let mut ring = hydrated(Granularity::Months, &storage);
        ring.commit(rec(297, 123_456)).unwrap();
        ring.commit(rec(298, 130_000)).unwrap();

        let reloaded = hydrated(Granularity::Months, &storage);
        assert!(!reloaded.needs_repopulation());
        assert_eq!(reloaded.last_committed(), Some(298));
        assert_eq!(reloaded.history(), ring.history());
    }

    #[test]
    fn failed_write_keeps_memory_copy() {
        let storage = MemStorage::default();
        let mut ring = hydrated(Granularity::Hours, &storage);
        storage.fail_writes.set(true);

        let outcome = ring.commit(rec(5, 42)).unwrap();
        assert!(matches!(outcome, CommitOutcome::MemoryOnly { index: 6, .. }));
        assert_eq!(ring.slot(6).map(|r| r.label), Some(5));
        assert_eq!(ring.state(), RingState::Hydrated);

        storage.fail_writes.set(false);
        let reloaded = hydrated(Granularity::Hours, &storage);
        assert_eq!(reloaded.slot(6), None);
    }

    #[test]
    fn commit_before_hydrate_is_refused() {
        let mut ring = RingStore::new(Granularity::Hours, Box::new(MemStorage::default()));
        assert!(matches!(
            ring.commit(rec(1, 1)),
            Err(StorageError::NotHydrated(Granularity::Hours))
        ));
    }

    #[test]
    fn header_slot_is_never_live() {
        let storage = MemStorage::default();
        let mut ring = hydrated(Granularity::Hours, &storage);
        ring.commit(rec(47, 1)).unwrap();
        assert_eq!(ring.slot(0), None);
        assert_eq!(ring.slot(48).map(|r| r.label), Some(47));
        assert_eq!(ring.slot(49), None);
    }

    #[test]
    fn read_failure_leaves_the_file_alone() {
        let storage = MemStorage::default();
        let mut ring = hydrated(Granularity::Days, &storage);
        ring.commit(rec(100, 5_000)).unwrap();
        let on_disk = storage.file("RINGdays.csv").unwrap();

        storage.fail_reads.set(true);
        let mut ring = RingStore::new(Granularity::Days, Box::new(storage.clone()));
        let report = ring.hydrate();
        assert!(!report.reinitialized);
        assert_eq!(report.storage_errors, 1);
        assert!(ring.needs_repopulation());
        assert!(ring.history().is_empty());
        assert_eq!(storage.file("RINGdays.csv").unwrap(), on_disk);

        storage.fail_reads.set(false);
        let ring = hydrated(Granularity::Days, &storage);
        assert_eq!(ring.last_committed(), Some(100));
    }
}
