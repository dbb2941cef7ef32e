use dsmr_client::Granularity;
use time::OffsetDateTime;

/// A window that has just closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    pub granularity: Granularity,
    /// Window key of the closed window, not the one just opened.
    pub closed: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// First valid reading of the clock since boot.
    First,
    /// Still inside the same hour.
    Steady,
    /// Boundaries crossed, finest first.
    Crossed(Vec<Boundary>),
    /// Wall clock moved back into an earlier hour.
    ClockMovedBack,
    /// Clock outside the supported range, typically not yet synchronised.
    ClockNotSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WindowKeys {
    hour: u32,
    day: u32,
    month: u32,
}

impl WindowKeys {
    fn of(local: OffsetDateTime) -> Option<Self> {
        Some(Self {
            hour: Granularity::Hours.window_of(local)?,
            day: Granularity::Days.window_of(local)?,
            month: Granularity::Months.window_of(local)?,
        })
    }

    fn get(&self, granularity: Granularity) -> u32 {
        match granularity {
            Granularity::Hours => self.hour,
            Granularity::Days => self.day,
            Granularity::Months => self.month,
        }
    }
}

/// Detects hour/day/month boundary crossings of the local wall clock.
///
/// Only compares against the previous observation. Whether a closed window
/// was already committed is for the ring to decide.
#[derive(Debug, Default)]
pub struct TimeBase {
    previous: Option<WindowKeys>,
}

impl TimeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, local: OffsetDateTime) -> Observation {
        let Some(current) = WindowKeys::of(local) else {
            return Observation::ClockNotSet;
        };
        let Some(previous) = self.previous.replace(current) else {
            return Observation::First;
        };

        if current.hour < previous.hour {
            return Observation::ClockMovedBack;
        }
        if current.hour == previous.hour {
            return Observation::Steady;
        }

        // A coarser window only changes together with every finer one.
        let crossed = Granularity::ALL
            .into_iter()
            .filter(|g| current.get(*g) != previous.get(*g))
            .map(|granularity| Boundary {
                granularity,
                closed: previous.get(granularity),
            })
            .collect();
        Observation::Crossed(crossed)
    }
}
