use std::time::Duration;

/// What a timer does about intervals that passed while the loop was busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissedTicks {
    /// Report every elapsed interval so the caller can replay them.
    CatchUp,
    /// Report at most one and restart the interval from now.
    SkipMissed,
}

/// Named periodic trigger driven by monotonic uptime.
///
/// A timer has no side effects of its own, it only tells the scheduler how
/// many times the bound action is due.
#[derive(Debug, Clone)]
pub struct Timer {
    name: &'static str,
    interval: Duration,
    policy: MissedTicks,
    last_fire: Duration,
}

impl Timer {
    /// Armed at `now`: the first fire is one interval later.
    pub fn new(name: &'static str, interval: Duration, policy: MissedTicks, now: Duration) -> Self {
        Self {
            name,
            interval: interval.max(Duration::from_millis(1)),
            policy,
            last_fire: now,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn policy(&self) -> MissedTicks {
        self.policy
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn elapsed_intervals(&mut self, now: Duration) -> u32 {
        let Some(elapsed) = now.checked_sub(self.last_fire) else {
            return 0;
        };
        if elapsed < self.interval {
            return 0;
        }

        match self.policy {
            MissedTicks::CatchUp => {
                let count = (elapsed.as_nanos() / self.interval.as_nanos()).min(u128::from(u32::MAX)) as u32;
                self.last_fire += self.interval * count;
                count
            }
            MissedTicks::SkipMissed => {
                self.last_fire = now;
                1
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn catch_up_reports_every_missed_interval() {
        let mut t = Timer::new("telegram", secs(10), MissedTicks::CatchUp, secs(0));
        assert_eq!(t.elapsed_intervals(secs(25)), 2);
        // Remainder is kept: 20s was the last due point, next is 30s.
        assert_eq!(t.elapsed_intervals(secs(29)), 0);
        assert_eq!(t.elapsed_intervals(secs(30)), 1);
    }

    #[test]
    fn skip_missed_reports_once_and_rearms_from_now() {
        let mut t = Timer::new("clock", secs(10), MissedTicks::SkipMissed, secs(0));
        assert_eq!(t.elapsed_intervals(secs(25)), 1);
        assert_eq!(t.elapsed_intervals(secs(34)), 0);
        assert_eq!(t.elapsed_intervals(secs(35)), 1);
    }

    #[test]
    fn never_fires_before_interval_or_backwards() {
        let mut t = Timer::new("display", secs(5), MissedTicks::CatchUp, secs(100));
        assert_eq!(t.elapsed_intervals(secs(104)), 0);
        assert_eq!(t.elapsed_intervals(secs(50)), 0);
        assert_eq!(t.elapsed_intervals(secs(105)), 1);
    }
}
