use std::{
    fs::{self, OpenOptions},
    io::{self, Seek, SeekFrom, Write},
    path::PathBuf,
};

use dsmr_client::{ring_file::RingFileError, Granularity};

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("storage i/o on '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("record not encodable: {0}")]
    Format(#[from] RingFileError),
    #[error("{0} ring used before hydrate")]
    NotHydrated(Granularity),
}

impl StorageError {
    fn io(name: &str, source: io::Error) -> Self {
        Self::Io {
            name: name.to_string(),
            source,
        }
    }
}

/// Persistent byte store addressed by file name.
///
/// `write_at` must only ever touch `bytes.len()` bytes at `offset`, that is
/// what keeps a torn write confined to a single ring record.
pub trait FlashStorage {
    /// `Ok(None)` when the file does not exist.
    fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Replace the whole file.
    fn write_all(&mut self, name: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Overwrite part of an existing file.
    fn write_at(&mut self, name: &str, offset: u64, bytes: &[u8]) -> Result<(), StorageError>;
}

/// Files in one directory on the host filesystem.
#[derive(Debug, Clone)]
pub struct DirStorage {
    root: PathBuf,
}

impl DirStorage {
    pub fn open<P: Into<PathBuf>>(root: P) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StorageError::io(&root.display().to_string(), e))?;
        Ok(Self { root })
    }
}

impl FlashStorage for DirStorage {
    fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(self.root.join(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(name, e)),
        }
    }

    fn write_all(&mut self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.root.join(name);
        let tmp = self.root.join(format!("{name}.tmp"));
        fs::write(&tmp, bytes).map_err(|e| StorageError::io(name, e))?;
        fs::rename(&tmp, &path).map_err(|e| StorageError::io(name, e))
    }

    fn write_at(&mut self, name: &str, offset: u64, bytes: &[u8]) -> Result<(), StorageError> {
        let mut file = OpenOptions::new()
            .write(true)
            .open(self.root.join(name))
            .map_err(|e| StorageError::io(name, e))?;
        file.seek(SeekFrom::Start(offset))
            .and_then(|_| file.write_all(bytes))
            .and_then(|_| file.sync_data())
            .map_err(|e| StorageError::io(name, e))
    }
}

#[cfg(test)]
pub(crate) mod mem {
    use std::{
        cell::{Cell, RefCell},
        collections::HashMap,
        rc::Rc,
    };

    use super::*;

    /// In-memory storage for tests. Clones share the same files.
    #[derive(Clone, Default)]
    pub struct MemStorage {
        pub files: Rc<RefCell<HashMap<String, Vec<u8>>>>,
        pub fail_writes: Rc<Cell<bool>>,
        pub fail_reads: Rc<Cell<bool>>,
    }

    impl MemStorage {
        pub fn file(&self, name: &str) -> Option<Vec<u8>> {
            self.files.borrow().get(name).cloned()
        }

        fn check(&self, name: &str) -> Result<(), StorageError> {
            if self.fail_writes.get() {
                return Err(StorageError::io(name, io::Error::other("flash write failed")));
            }
            Ok(())
        }
    }

    impl FlashStorage for MemStorage {
        fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
            if self.fail_reads.get() {
                return Err(StorageError::io(name, io::Error::other("flash read failed")));
            }
            Ok(self.file(name))
        }

        fn write_all(&mut self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
            self.check(name)?;
            self.files.borrow_mut().insert(name.to_string(), bytes.to_vec());
            Ok(())
        }

        fn write_at(&mut self, name: &str, offset: u64, bytes: &[u8]) -> Result<(), StorageError> {
            self.check(name)?;
            let mut files = self.files.borrow_mut();
            let file = files
                .get_mut(name)
                .ok_or_else(|| StorageError::io(name, io::ErrorKind::NotFound.into()))?;
            let start = offset as usize;
            if file.len() < start + bytes.len() {
                file.resize(start + bytes.len(), b' ');
            }
            file[start..start + bytes.len()].copy_from_slice(bytes);
            Ok(())
        }
    }
}
