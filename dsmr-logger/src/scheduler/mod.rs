use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::{
    aggregate::{self, RolloverEvent},
    clock::{Clock, Tick},
    config::TimerConfig,
    network::{FatalError, NetworkLink},
    publishers::Publisher,
    sources::TelegramIngest,
    state::{LoggerState, Snapshot},
    timebase::{Observation, TimeBase},
    timer::{MissedTicks, Timer},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Ingest,
    RolloverCheck,
    Display,
    Publish,
    ClockResync,
    Network,
}

/// What one `tick()` did.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Actions run, in order, with how many times.
    pub runs: Vec<(Action, u32)>,
    pub rollovers: Vec<RolloverEvent>,
}

impl TickReport {
    pub fn count(&self, action: Action) -> u32 {
        self.runs
            .iter()
            .filter(|(a, _)| *a == action)
            .map(|(_, n)| n)
            .sum()
    }
}

struct Network {
    link: Box<dyn NetworkLink>,
    connect_timeout: Duration,
}

/// Cooperative main loop: owns the state and every collaborator.
pub struct Scheduler {
    clock: Box<dyn Clock>,
    ingest: TelegramIngest,
    timebase: TimeBase,
    state: LoggerState,
    timers: Vec<(Timer, Action)>,
    display: Vec<Box<dyn Publisher>>,
    publishers: Vec<Box<dyn Publisher>>,
    network: Option<Network>,
}

impl Scheduler {
    pub fn new(
        mut clock: Box<dyn Clock>,
        ingest: TelegramIngest,
        state: LoggerState,
        intervals: &TimerConfig,
    ) -> Self {
        let now = clock.now().uptime;
        // Registration order is execution order within a tick.
        let timers = vec![
            (Timer::new("telegram", intervals.telegram(), MissedTicks::CatchUp, now), Action::Ingest),
            (
                Timer::new("rollover-check", intervals.rollover_check(), MissedTicks::CatchUp, now),
                Action::RolloverCheck,
            ),
            (Timer::new("display", intervals.display(), MissedTicks::SkipMissed, now), Action::Display),
            (Timer::new("publish", intervals.publish(), MissedTicks::CatchUp, now), Action::Publish),
            (
                Timer::new("clock-resync", intervals.clock_resync(), MissedTicks::SkipMissed, now),
                Action::ClockResync,
            ),
            (Timer::new("network", intervals.network(), MissedTicks::SkipMissed, now), Action::Network),
        ];

        Self {
            clock,
            ingest,
            timebase: TimeBase::new(),
            state,
            timers,
            display: Vec::new(),
            publishers: Vec::new(),
            network: None,
        }
    }

    pub fn with_display(mut self, publisher: Box<dyn Publisher>) -> Self {
        self.display.push(publisher);
        self
    }

    pub fn with_publisher(mut self, publisher: Box<dyn Publisher>) -> Self {
        self.publishers.push(publisher);
        self
    }

    pub fn with_network(mut self, link: Box<dyn NetworkLink>, connect_timeout: Duration) -> Self {
        self.network = Some(Network {
            link,
            connect_timeout,
        });
        self
    }

    pub fn state(&self) -> &LoggerState {
        &self.state
    }

    /// Bring the network link up before the first tick.
    pub fn start(&mut self) -> Result<(), FatalError> {
        if let Some(net) = self.network.as_mut() {
            connect(net)?;
        }
        Ok(())
    }

    /// Evaluate every timer once against a single clock reading.
    pub fn tick(&mut self) -> Result<TickReport, FatalError> {
        let tick = self.clock.now();
        let mut report = TickReport::default();

        for i in 0..self.timers.len() {
            let (count, action) = {
                let (timer, action) = &mut self.timers[i];
                let count = timer.elapsed_intervals(tick.uptime);
                if count > 1 {
                    tracing::debug!(timer = timer.name(), count, "catching up missed intervals");
                }
                (count, *action)
            };
            if count == 0 {
                continue;
            }
            for _ in 0..count {
                self.run_action(action, tick, &mut report)?;
            }
            report.runs.push((action, count));
        }

        Ok(report)
    }

    fn run_action(&mut self, action: Action, tick: Tick, report: &mut TickReport) -> Result<(), FatalError> {
        match action {
            Action::Ingest => {
                self.ingest.poll(&mut self.state, tick.local);
            }
            Action::RolloverCheck => match self.timebase.observe(tick.local) {
                Observation::Crossed(boundaries) => {
                    report
                        .rollovers
                        .extend(aggregate::roll_over(&mut self.state, &boundaries));
                }
                Observation::ClockMovedBack => {
                    self.state.counters.clock_anomaly();
                    tracing::warn!(local = %tick.local, "wall clock moved back, no rollover");
                }
                Observation::ClockNotSet => {
                    tracing::debug!(local = %tick.local, "wall clock not set yet");
                }
                Observation::First | Observation::Steady => {}
            },
            Action::Display => publish_all(&mut self.display, &self.state.snapshot()),
            Action::Publish => publish_all(&mut self.publishers, &self.state.snapshot()),
            Action::ClockResync => {
                if let Err(e) = self.clock.resync() {
                    tracing::warn!(error = %e, "clock resync failed");
                }
            }
            Action::Network => {
                if let Some(net) = self.network.as_mut() {
                    if net.link.is_up() {
                        tracing::debug!("network link up");
                    } else {
                        tracing::warn!("network link down, reconnecting");
                        connect(net)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Drive `tick()` once per second until ctrl-c or a fatal error.
    pub async fn run(mut self) -> Result<(), FatalError> {
        self.start()?;

        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick()?;
                }
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    return Ok(());
                }
            }
        }
    }
}

fn connect(net: &mut Network) -> Result<(), FatalError> {
    let timeout = net.connect_timeout;
    net.link
        .connect(timeout)
        .map_err(|source| FatalError::NetworkTimeout { timeout, source })?;
    tracing::info!("network link up");
    Ok(())
}

fn publish_all(publishers: &mut [Box<dyn Publisher>], snapshot: &Snapshot<'_>) {
    for publisher in publishers.iter_mut() {
        if let Err(e) = publisher.publish(snapshot) {
            tracing::warn!(publisher = publisher.name(), error = %e, "publish failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{
        aggregate::RolloverResult,
        clock::manual::ManualClock,
        network::scripted::ScriptedLink,
        publishers::PublishError,
        sources::scripted::{PlainDecoder, ScriptedSource},
        store::{storage::mem::MemStorage, RingSet},
    };
    use dsmr_client::{Decimal3, Granularity};
    use time::{macros::datetime, OffsetDateTime};

    fn intervals() -> TimerConfig {
        TimerConfig {
            telegram_secs: 10,
            rollover_check_secs: 1,
            display_secs: 5,
            publish_secs: 60,
            clock_resync_secs: 600,
            network_secs: 5,
        }
    }

    struct Harness {
        scheduler: Scheduler,
        clock: ManualClock,
        source: ScriptedSource,
    }

    fn harness(start: OffsetDateTime) -> Harness {
        let clock = ManualClock::new(start);
        let source = ScriptedSource::default();
        let mut state = LoggerState::new(RingSet::new(MemStorage::default()), 1);
        state.hydrate();
        let ingest = TelegramIngest::new(Box::new(source.clone()), Box::new(PlainDecoder));
        let scheduler = Scheduler::new(Box::new(clock.clone()), ingest, state, &intervals());
        Harness {
            scheduler,
            clock,
            source,
        }
    }

    impl Harness {
        /// Advance one second at a time, ticking after each step.
        fn run_for(&mut self, secs: u32) -> Vec<TickReport> {
            (0..secs)
                .map(|_| {
                    self.clock.advance(Duration::from_secs(1));
                    self.scheduler.tick().unwrap()
                })
                .collect()
        }
    }

    /// Records the telegram count it saw at each publish.
    #[derive(Clone, Default)]
    struct Recorder {
        seen: Rc<RefCell<Vec<u64>>>,
    }

    impl Publisher for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn publish(&mut self, snapshot: &Snapshot<'_>) -> Result<(), PublishError> {
            self.seen.borrow_mut().push(snapshot.counters.telegrams);
            Ok(())
        }
    }

    #[test]
    fn telegram_is_ingested_before_the_boundary_it_closes() {
        let mut h = harness(datetime!(2024-10-18 13:59:50 +02:00));
        h.source.push("100.0;1.0");

        let reports = h.run_for(10);

        // Ticks 1..9 stay inside 13:xx; tick 10 reaches 14:00:00 and also
        // fires the telegram timer, which runs first.
        assert!(reports[..9].iter().all(|r| r.rollovers.is_empty()));
        let last = &reports[9];
        assert_eq!(last.runs[0], (Action::Ingest, 1));
        assert_eq!(last.rollovers.len(), 1);
        assert_eq!(last.rollovers[0].result, RolloverResult::Committed);
        assert_eq!(
            last.rollovers[0].record.unwrap().edt1,
            Decimal3::from_thousandths(100_000)
        );
        assert_eq!(
            Granularity::Hours.label_text(last.rollovers[0].boundary.closed).as_deref(),
            Some("24101813")
        );
    }

    #[test]
    fn boundary_without_telegram_is_deferred() {
        let mut h = harness(datetime!(2024-10-18 13:59:55 +02:00));

        let reports = h.run_for(6);

        let events: Vec<_> = reports.iter().flat_map(|r| &r.rollovers).collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].result, RolloverResult::Deferred);
        assert!(h.scheduler.state().rings.get(Granularity::Hours).history().is_empty());
    }

    #[test]
    fn repeated_and_backward_clock_do_not_recommit() {
        let mut h = harness(datetime!(2024-10-18 13:59:50 +02:00));
        h.source.push("100.0;1.0");
        h.run_for(10);

        // Same instant again: no timer is due.
        let again = h.scheduler.tick().unwrap();
        assert!(again.runs.is_empty());

        // Wall clock corrected backwards, then forward across 14:00 again.
        h.clock.set_local(datetime!(2024-10-18 13:30:00 +02:00));
        h.run_for(1);
        assert_eq!(h.scheduler.state().counters.clock_anomalies, 1);

        h.clock.set_local(datetime!(2024-10-18 14:00:30 +02:00));
        let reports = h.run_for(1);
        assert_eq!(reports[0].rollovers[0].result, RolloverResult::Stale);

        let state = h.scheduler.state();
        assert_eq!(state.counters.rollovers, 1);
        assert_eq!(
            state.rings.get(Granularity::Hours).history()[0].edt1,
            Decimal3::from_thousandths(100_000)
        );
    }

    #[test]
    fn missed_intervals_follow_each_timer_policy() {
        let mut h = harness(datetime!(2024-10-18 10:00:00 +02:00));
        h.source.push("1.0;1.0");

        h.clock.advance(Duration::from_secs(25));
        let report = h.scheduler.tick().unwrap();

        assert_eq!(report.count(Action::Ingest), 2);
        assert_eq!(report.count(Action::RolloverCheck), 25);
        assert_eq!(report.count(Action::Display), 1);
        assert_eq!(report.count(Action::Publish), 0);
        // Second replay finds no new telegram.
        assert_eq!(h.scheduler.state().counters.telegrams, 1);
        assert_eq!(h.scheduler.state().counters.telegram_errors, 1);
    }

    #[test]
    fn publishers_see_the_state_after_ingest() {
        let recorder = Recorder::default();
        let mut h = harness(datetime!(2024-10-18 10:00:00 +02:00));
        h.scheduler = h.scheduler.with_display(Box::new(recorder.clone()));
        h.source.push("1.0;1.0");

        h.run_for(10);

        assert_eq!(*recorder.seen.borrow(), vec![0, 1]);
    }

    #[test]
    fn clock_resync_runs_on_its_interval() {
        let mut h = harness(datetime!(2024-10-18 10:00:00 +02:00));
        h.clock.advance(Duration::from_secs(1200));
        h.scheduler.tick().unwrap();
        // SkipMissed: two intervals elapsed, one resync.
        assert_eq!(*h.clock.resyncs.borrow(), 1);
    }

    #[test]
    fn failed_reconnect_is_fatal() {
        let link = ScriptedLink::default();
        let mut h = harness(datetime!(2024-10-18 10:00:00 +02:00));
        h.scheduler = h
            .scheduler
            .with_network(Box::new(link.clone()), Duration::from_secs(30));

        h.scheduler.start().unwrap();
        assert!(*link.up.borrow());

        h.run_for(5);
        assert_eq!(*link.attempts.borrow(), 1);

        *link.up.borrow_mut() = false;
        link.outcomes.borrow_mut().push_back(false);
        h.clock.advance(Duration::from_secs(5));
        let err = h.scheduler.tick().unwrap_err();
        assert!(matches!(err, FatalError::NetworkTimeout { .. }));
        assert_eq!(*link.attempts.borrow(), 2);
    }

    #[test]
    fn startup_without_network_is_fatal() {
        let link = ScriptedLink::default();
        link.outcomes.borrow_mut().push_back(false);
        let mut h = harness(datetime!(2024-10-18 10:00:00 +02:00));
        h.scheduler = h
            .scheduler
            .with_network(Box::new(link), Duration::from_secs(30));

        assert!(h.scheduler.start().is_err());
    }
}
