use std::time::{Duration, Instant};

use time::{OffsetDateTime, UtcOffset};

/// One clock reading, taken once per scheduler iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Monotonic time since boot, drives the timers.
    pub uptime: Duration,
    /// Wall clock with the local offset (timezone/DST) applied.
    pub local: OffsetDateTime,
}

#[derive(thiserror::Error, Debug)]
pub enum ClockError {
    #[error("local UTC offset unavailable: {0}")]
    Offset(String),
}

pub trait Clock {
    fn now(&mut self) -> Tick;

    /// Hook for the periodic time resync.
    fn resync(&mut self) -> Result<(), ClockError>;
}

/// Host clock. The OS keeps UTC in sync; the local offset is looked up on
/// every reading so a DST switch lands on the first tick after it.
pub struct SystemClock {
    boot: Instant,
    offset: UtcOffset,
    fallback: UtcOffset,
}

impl SystemClock {
    pub fn new(fallback: UtcOffset) -> Self {
        let mut clock = Self {
            boot: Instant::now(),
            offset: fallback,
            fallback,
        };
        if let Err(e) = clock.resync() {
            tracing::warn!(error = %e, fallback = %fallback, "using configured UTC offset");
        }
        clock
    }

    fn refresh_offset(&mut self) -> Result<(), ClockError> {
        let offset = UtcOffset::current_local_offset().map_err(|e| ClockError::Offset(e.to_string()))?;
        if offset != self.offset {
            tracing::info!(old = %self.offset, new = %offset, "local UTC offset changed");
            self.offset = offset;
        }
        Ok(())
    }
}

impl Clock for SystemClock {
    fn now(&mut self) -> Tick {
        // On failure keep the last known offset; resync reports it.
        let _ = self.refresh_offset();
        Tick {
            uptime: self.boot.elapsed(),
            local: OffsetDateTime::now_utc().to_offset(self.offset),
        }
    }

    /// Falls back to the configured offset when the OS cannot report one.
    fn resync(&mut self) -> Result<(), ClockError> {
        let result = self.refresh_offset();
        if result.is_err() {
            self.offset = self.fallback;
        }
        result
    }
}
