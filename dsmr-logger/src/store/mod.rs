pub mod ring_store;
pub mod storage;

pub use ring_store::{CommitOutcome, Hydrated, RingState, RingStore};
pub use storage::{DirStorage, FlashStorage, StorageError};

use dsmr_client::Granularity;

const REBOOTS_FILE: &str = "reboots.txt";

/// The three history rings.
pub struct RingSet {
    hours: RingStore,
    days: RingStore,
    months: RingStore,
}

impl RingSet {
    pub fn new<S>(storage: S) -> Self
    where
        S: FlashStorage + Clone + 'static,
    {
        Self {
            hours: RingStore::new(Granularity::Hours, Box::new(storage.clone())),
            days: RingStore::new(Granularity::Days, Box::new(storage.clone())),
            months: RingStore::new(Granularity::Months, Box::new(storage)),
        }
    }

    pub fn get(&self, granularity: Granularity) -> &RingStore {
        match granularity {
            Granularity::Hours => &self.hours,
            Granularity::Days => &self.days,
            Granularity::Months => &self.months,
        }
    }

    pub fn get_mut(&mut self, granularity: Granularity) -> &mut RingStore {
        match granularity {
            Granularity::Hours => &mut self.hours,
            Granularity::Days => &mut self.days,
            Granularity::Months => &mut self.months,
        }
    }

    pub fn hydrate_all(&mut self) -> Vec<(Granularity, Hydrated)> {
        Granularity::ALL
            .into_iter()
            .map(|g| (g, self.get_mut(g).hydrate()))
            .collect()
    }
}

/// Increment the persisted boot counter and return the new value.
///
/// An unreadable counter restarts from zero.
pub fn record_boot(storage: &mut dyn FlashStorage) -> Result<u32, StorageError> {
    let previous = storage
        .read(REBOOTS_FILE)?
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .and_then(|s| s.trim().parse::<u32>().ok())
        .unwrap_or(0);
    let count = previous.saturating_add(1);
    storage.write_all(REBOOTS_FILE, format!("{count}\n").as_bytes())?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::mem::MemStorage;

    #[test]
    fn boot_counter_increments_across_boots() {
        let mut storage = MemStorage::default();
        assert_eq!(record_boot(&mut storage).unwrap(), 1);
        assert_eq!(record_boot(&mut storage).unwrap(), 2);
        assert_eq!(storage.file(REBOOTS_FILE).unwrap(), b"2\n");
    }

    #[test]
    fn ring_set_hydrates_one_file_per_granularity() {
        let storage = MemStorage::default();
        let mut rings = RingSet::new(storage.clone());
        let reports = rings.hydrate_all();

        assert_eq!(reports.len(), 3);
        for g in Granularity::ALL {
            assert!(storage.file(g.file_name()).is_some(), "{g}");
            assert_eq!(rings.get(g).state(), RingState::Hydrated);
        }
    }
}
