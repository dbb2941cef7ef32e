use std::{
    fs, io,
    path::PathBuf,
    time::SystemTime,
};

use super::TelegramSource;

/// Spool-file source for telegrams.
///
/// A serial capture process (ser2net, a udev-started `cat`, ...) overwrites
/// the file with each complete telegram. The file is only re-read when its
/// modification time or length changed, so a stalled port shows up as
/// "no data" instead of the same telegram being decoded again.
pub struct FileTelegramSource {
    path: PathBuf,
    last_seen: Option<(SystemTime, u64)>,
}

impl FileTelegramSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            last_seen: None,
        }
    }
}

impl TelegramSource for FileTelegramSource {
    fn read_telegram(&mut self) -> io::Result<Option<Vec<u8>>> {
        let meta = match fs::metadata(&self.path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let stamp = (meta.modified()?, meta.len());
        if self.last_seen == Some(stamp) {
            return Ok(None);
        }

        let bytes = fs::read(&self.path)?;
        self.last_seen = Some(stamp);
        Ok(Some(bytes))
    }
}
