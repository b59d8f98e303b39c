use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::error::WalkError;
use crate::geo::Coordinate;
use crate::location::{LocationSource, SampleSource};
use crate::session::SessionRecord;
use crate::store::ResultStore;
use crate::tracker::WalkSessionTracker;

/// Wall-clock time for stamping sessions
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that always reads the same instant
#[derive(Clone, Copy, Debug)]
pub struct FixedClock {
    at: DateTime<Utc>,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { at }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.at
    }
}

/// Unified event type consumed by the session driver
#[derive(Clone, Debug, PartialEq)]
pub enum WalkEvent {
    Sample(Coordinate),
    Tick,
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn every_second() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Drives a session in real time: fixes as they arrive, ticks on fixed deadlines
pub struct Runner<T: Ticker> {
    ticker: T,
    next_tick: Option<Instant>,
}

impl<T: Ticker> Runner<T> {
    pub fn new(ticker: T) -> Self {
        Self {
            ticker,
            next_tick: None,
        }
    }

    /// Blocks until the next fix or tick deadline, whichever comes first.
    ///
    /// Deadlines advance by exactly one interval per tick, so a busy fix
    /// stream never delays the countdown.
    pub fn step<E: SampleSource>(&mut self, source: &E) -> WalkEvent {
        let interval = self.ticker.interval();
        let deadline = *self
            .next_tick
            .get_or_insert_with(|| Instant::now() + interval);

        let now = Instant::now();
        if now >= deadline {
            self.next_tick = Some(deadline + interval);
            return WalkEvent::Tick;
        }

        match source.recv_timeout(deadline - now) {
            Ok(coordinate) => WalkEvent::Sample(coordinate),
            Err(RecvTimeoutError::Timeout) => {
                self.next_tick = Some(deadline + interval);
                WalkEvent::Tick
            }
            Err(RecvTimeoutError::Disconnected) => {
                // Source is gone; the countdown still runs to the end.
                std::thread::sleep(deadline.saturating_duration_since(Instant::now()));
                self.next_tick = Some(deadline + interval);
                WalkEvent::Tick
            }
        }
    }

    /// Feeds events into a started tracker until it finalizes.
    pub fn run<L, S, C>(
        &mut self,
        tracker: &mut WalkSessionTracker<L, S, C>,
    ) -> Result<SessionRecord, WalkError>
    where
        L: LocationSource,
        S: ResultStore,
        C: Clock,
    {
        self.run_with(tracker, |_, _| {})
    }

    /// Like [`Runner::run`], calling `on_event` after each event is applied.
    pub fn run_with<L, S, C, F>(
        &mut self,
        tracker: &mut WalkSessionTracker<L, S, C>,
        mut on_event: F,
    ) -> Result<SessionRecord, WalkError>
    where
        L: LocationSource,
        S: ResultStore,
        C: Clock,
        F: FnMut(&WalkEvent, &WalkSessionTracker<L, S, C>),
    {
        loop {
            if !tracker.is_running() {
                return Err(WalkError::NotRunning);
            }

            let event = self.step(&*tracker);
            let finished = match &event {
                WalkEvent::Sample(coordinate) => {
                    tracker.on_sample(*coordinate);
                    None
                }
                WalkEvent::Tick => tracker.tick()?,
            };
            on_event(&event, tracker);

            if let Some(record) = finished {
                return Ok(record);
            }
        }
    }
}
