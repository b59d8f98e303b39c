use std::sync::mpsc::{RecvTimeoutError, TryRecvError};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::WalkError;
use crate::geo::Coordinate;
use crate::location::{LocationSource, SampleSource, Subscription, WatchOptions};
use crate::runtime::{Clock, SystemClock};
use crate::session::{SessionPhase, SessionRecord, SessionState};
use crate::store::ResultStore;

/// Runs one timed walk test: countdown, fix ingestion, distance accumulation
/// and handing the finished record to the result store.
///
/// Every mutating call takes `&mut self`, so events are applied one at a time.
/// Once finished, late fixes and ticks are ignored.
#[derive(Debug)]
pub struct WalkSessionTracker<L: LocationSource, S: ResultStore, C: Clock = SystemClock> {
    location: L,
    store: S,
    clock: C,
    options: WatchOptions,
    phase: SessionPhase,
    state: SessionState,
    subscription: Option<Subscription>,
    record: Option<SessionRecord>,
    saved: bool,
}

impl<L: LocationSource, S: ResultStore> WalkSessionTracker<L, S, SystemClock> {
    pub fn new(location: L, store: S) -> Self {
        Self::with_clock(location, store, SystemClock)
    }
}

impl<L: LocationSource, S: ResultStore, C: Clock> WalkSessionTracker<L, S, C> {
    pub fn with_clock(location: L, store: S, clock: C) -> Self {
        Self {
            location,
            store,
            clock,
            options: WatchOptions::default(),
            phase: SessionPhase::Idle,
            state: SessionState::default(),
            subscription: None,
            record: None,
            saved: false,
        }
    }

    pub fn with_watch_options(mut self, options: WatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Anchors the session on a fresh fix and subscribes to the fix stream.
    ///
    /// On failure the tracker stays idle and nothing is recorded.
    pub fn start(&mut self) -> Result<(), WalkError> {
        if self.phase != SessionPhase::Idle {
            return Err(WalkError::InvalidState { phase: self.phase });
        }

        let origin = self.location.current_position().map_err(|e| {
            warn!(error = %e, "no initial fix, session not started");
            e
        })?;
        let subscription = self.location.subscribe(self.options).map_err(|e| {
            warn!(error = %e, "location subscription failed, session not started");
            e
        })?;

        let started_at = self.clock.now();
        self.state = SessionState {
            started_at: Some(started_at),
            origin: Some(origin),
            ..SessionState::default()
        };
        self.subscription = Some(subscription);
        self.phase = SessionPhase::Running;

        info!(
            %started_at,
            latitude = origin.latitude,
            longitude = origin.longitude,
            "walk session started"
        );
        Ok(())
    }

    /// Ingests one fix. Returns the distance it added, or `None` when the
    /// session is not running and the fix was dropped.
    pub fn on_sample(&mut self, coordinate: Coordinate) -> Option<f64> {
        if self.phase != SessionPhase::Running {
            debug!(phase = %self.phase, "ignoring fix outside a running session");
            return None;
        }

        let added = self.state.record_sample(coordinate);
        debug!(
            added,
            total = self.state.total_distance_meters,
            samples = self.state.samples.len(),
            "fix recorded"
        );
        Some(added)
    }

    /// One second of the countdown. Finalizes the session when time is up.
    pub fn tick(&mut self) -> Result<Option<SessionRecord>, WalkError> {
        if self.phase != SessionPhase::Running {
            return Ok(None);
        }

        let elapsed = self.state.advance();
        debug!(elapsed, "tick");
        if self.state.is_time_up() {
            return self.finish().map(Some);
        }
        Ok(None)
    }

    /// Ends the session early. A second call after finishing does nothing.
    pub fn stop(&mut self) -> Result<Option<SessionRecord>, WalkError> {
        match self.phase {
            SessionPhase::Idle => Err(WalkError::NotRunning),
            SessionPhase::Running => self.finish().map(Some),
            SessionPhase::Finished => Ok(None),
        }
    }

    fn finish(&mut self) -> Result<SessionRecord, WalkError> {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.phase = SessionPhase::Finished;

        let record = self.state.to_record(self.clock.now());
        self.record = Some(record.clone());
        info!(
            distance_meters = record.distance_meters,
            duration_seconds = record.duration_seconds,
            samples = record.samples.len(),
            "walk session finished"
        );

        self.save(record)
    }

    fn save(&mut self, record: SessionRecord) -> Result<SessionRecord, WalkError> {
        match self.store.append_and_save(&record) {
            Ok(()) => {
                self.saved = true;
                Ok(record)
            }
            Err(source) => {
                warn!(error = %source, "walk result kept in memory only");
                Err(WalkError::PersistenceWrite {
                    record: Box::new(record),
                    source,
                })
            }
        }
    }

    /// Tries again to store a record whose save failed.
    pub fn retry_save(&mut self) -> Result<Option<SessionRecord>, WalkError> {
        if self.saved {
            return Ok(None);
        }
        match self.record.clone() {
            Some(record) => self.save(record).map(Some),
            None => Err(WalkError::NotRunning),
        }
    }

    /// Next queued fix without blocking.
    pub fn try_recv_sample(&self) -> Result<Coordinate, TryRecvError> {
        match &self.subscription {
            Some(subscription) => subscription.try_recv(),
            None => Err(TryRecvError::Disconnected),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == SessionPhase::Running
    }

    pub fn is_saved(&self) -> bool {
        self.saved
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn total_distance_meters(&self) -> f64 {
        self.state.total_distance_meters
    }

    pub fn seconds_remaining(&self) -> u32 {
        self.state.seconds_remaining()
    }

    pub fn record(&self) -> Option<&SessionRecord> {
        self.record.as_ref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn location(&self) -> &L {
        &self.location
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

impl<L: LocationSource, S: ResultStore, C: Clock> SampleSource for WalkSessionTracker<L, S, C> {
    fn recv_timeout(&self, timeout: Duration) -> Result<Coordinate, RecvTimeoutError> {
        match &self.subscription {
            Some(subscription) => subscription.recv_timeout(timeout),
            None => Err(RecvTimeoutError::Disconnected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::haversine_distance;
    use crate::location::ChannelLocationSource;
    use crate::runtime::FixedClock;
    use crate::session::SESSION_DURATION_SECS;
    use crate::store::MemoryResultStore;
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};

    type TestTracker = WalkSessionTracker<ChannelLocationSource, MemoryResultStore, FixedClock>;

    fn origin() -> Coordinate {
        Coordinate::new(0.0, 0.0, 0)
    }

    fn tracker() -> TestTracker {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 4, 2, 7, 15, 0).unwrap());
        WalkSessionTracker::with_clock(
            ChannelLocationSource::new().with_position(origin()),
            MemoryResultStore::new(),
            clock,
        )
    }

    fn started() -> TestTracker {
        let mut t = tracker();
        t.start().unwrap();
        t
    }

    #[test]
    fn new_tracker_is_idle() {
        let t = tracker();
        assert_eq!(t.phase(), SessionPhase::Idle);
        assert_eq!(t.seconds_remaining(), SESSION_DURATION_SECS);
        assert!(t.record().is_none());
    }

    #[test]
    fn start_enters_running_and_records_origin() {
        let t = started();
        assert!(t.is_running());
        assert_eq!(t.state().origin, Some(origin()));
        assert_eq!(
            t.state().started_at,
            Some(Utc.with_ymd_and_hms(2024, 4, 2, 7, 15, 0).unwrap())
        );
        assert!(t.state().samples.is_empty());
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut t = started();
        assert_matches!(
            t.start(),
            Err(WalkError::InvalidState {
                phase: SessionPhase::Running
            })
        );
        assert!(t.is_running());
    }

    #[test]
    fn permission_denied_leaves_tracker_idle() {
        let mut t = WalkSessionTracker::new(
            ChannelLocationSource::new()
                .with_position(origin())
                .deny_permission(),
            MemoryResultStore::new(),
        );
        assert_matches!(t.start(), Err(WalkError::PermissionDenied));
        assert_eq!(t.phase(), SessionPhase::Idle);
        assert!(t.record().is_none());
        assert_eq!(t.store().append_calls(), 0);
        assert_matches!(t.stop(), Err(WalkError::NotRunning));
        assert_eq!(t.store().append_calls(), 0);
    }

    #[test]
    fn missing_fix_leaves_tracker_idle() {
        let mut t = WalkSessionTracker::new(ChannelLocationSource::new(), MemoryResultStore::new());
        assert_matches!(t.start(), Err(WalkError::LocationUnavailable(_)));
        assert_eq!(t.phase(), SessionPhase::Idle);
        assert_eq!(t.location().subscribe_calls(), 0);
    }

    #[test]
    fn single_sample_has_zero_distance() {
        let mut t = started();
        assert_eq!(t.on_sample(Coordinate::new(10.0, 10.0, 0)), Some(0.0));
        assert_eq!(t.total_distance_meters(), 0.0);
    }

    #[test]
    fn one_millidegree_walk() {
        let mut t = started();
        t.on_sample(Coordinate::new(0.0, 0.0, 0));
        t.on_sample(Coordinate::new(0.0, 0.001, 1_000));
        assert!((t.total_distance_meters() - 111.19).abs() < 0.5);
    }

    #[test]
    fn total_equals_sum_of_consecutive_legs() {
        let mut t = started();
        let samples: Vec<Coordinate> = (0..25)
            .map(|i| {
                let i = i as f64;
                Coordinate::new(55.0 + i * 0.00007, 12.0 + (i * 0.7).sin() * 0.0001, i as i64 * 1000)
            })
            .collect();

        let mut previous_total = 0.0;
        for c in &samples {
            t.on_sample(*c);
            assert!(t.total_distance_meters() >= previous_total);
            previous_total = t.total_distance_meters();
        }

        let expected: f64 = samples
            .windows(2)
            .map(|w| haversine_distance(&w[0], &w[1]))
            .sum();
        assert!((t.total_distance_meters() - expected).abs() < 1e-6);
        assert_eq!(t.state().samples, samples);
    }

    #[test]
    fn out_of_order_and_jumps_are_kept() {
        let mut t = started();
        t.on_sample(Coordinate::new(0.0, 0.0, 5_000));
        t.on_sample(Coordinate::new(0.0, 0.0, 1_000));
        let jump = t.on_sample(Coordinate::new(1.0, 0.0, 6_000)).unwrap();
        assert!(jump > 100_000.0);
        assert_eq!(t.state().samples.len(), 3);
        assert_eq!(t.state().samples[1].timestamp_millis, 1_000);
    }

    #[test]
    fn sample_before_start_is_ignored() {
        let mut t = tracker();
        assert_eq!(t.on_sample(Coordinate::new(1.0, 1.0, 0)), None);
        assert!(t.state().samples.is_empty());
    }

    #[test]
    fn full_countdown_finishes_without_stop() {
        let mut t = started();
        t.on_sample(Coordinate::new(0.0, 0.0, 0));
        t.on_sample(Coordinate::new(0.0, 0.001, 1_000));

        for _ in 0..SESSION_DURATION_SECS - 1 {
            assert_matches!(t.tick(), Ok(None));
        }
        assert!(t.is_running());

        let record = t.tick().unwrap().expect("time up should finalize");
        assert_eq!(t.phase(), SessionPhase::Finished);
        assert_eq!(record.duration_seconds, SESSION_DURATION_SECS);
        assert_eq!(record.distance_meters, 111);
        assert_eq!(t.store().records(), &[record]);
    }

    #[test]
    fn early_stop_keeps_elapsed_duration() {
        let mut t = started();
        for _ in 0..200 {
            t.tick().unwrap();
        }
        let record = t.stop().unwrap().unwrap();
        assert_eq!(record.duration_seconds, 200);
        assert_eq!(t.seconds_remaining(), 160);
    }

    #[test]
    fn stop_twice_yields_one_record() {
        let mut t = started();
        assert!(t.stop().unwrap().is_some());
        assert!(t.stop().unwrap().is_none());
        assert_eq!(t.store().append_calls(), 1);
        assert_eq!(t.store().records().len(), 1);
    }

    #[test]
    fn finished_tracker_ignores_late_events() {
        let mut t = started();
        let feed = t.location().feed();
        t.on_sample(Coordinate::new(0.0, 0.0, 0));
        t.stop().unwrap();

        assert!(!feed.send(Coordinate::new(0.0, 0.01, 1)));
        assert_eq!(t.on_sample(Coordinate::new(0.0, 0.01, 1)), None);
        assert_matches!(t.tick(), Ok(None));
        assert_eq!(t.state().elapsed_seconds, 0);
        assert_eq!(t.state().samples.len(), 1);
        assert_matches!(t.try_recv_sample(), Err(TryRecvError::Disconnected));
        assert_matches!(t.start(), Err(WalkError::InvalidState { .. }));
    }

    #[test]
    fn record_uses_session_start_time() {
        let mut t = started();
        let record = t.stop().unwrap().unwrap();
        assert_eq!(
            record.started_at,
            Utc.with_ymd_and_hms(2024, 4, 2, 7, 15, 0).unwrap()
        );
    }

    #[test]
    fn failed_save_still_finishes_and_can_retry() {
        let mut t = started();
        t.store_mut().set_fail_writes(true);
        t.on_sample(Coordinate::new(0.0, 0.0, 0));
        t.on_sample(Coordinate::new(0.0, 0.001, 1_000));

        let err = t.stop().unwrap_err();
        let unsaved = err.unsaved_record().cloned().expect("record attached");
        assert_eq!(unsaved.distance_meters, 111);
        assert_eq!(t.phase(), SessionPhase::Finished);
        assert!(!t.is_saved());
        assert_eq!(t.record(), Some(&unsaved));

        // stop() after finishing does not retry on its own
        assert!(t.stop().unwrap().is_none());

        t.store_mut().set_fail_writes(false);
        let saved = t.retry_save().unwrap().unwrap();
        assert_eq!(saved, unsaved);
        assert!(t.is_saved());
        assert!(t.retry_save().unwrap().is_none());
        assert_eq!(t.store().records(), &[unsaved]);
    }

    #[test]
    fn retry_before_finishing_is_an_error() {
        let mut t = started();
        assert_matches!(t.retry_save(), Err(WalkError::NotRunning));
    }

    #[test]
    fn fed_samples_arrive_through_subscription() {
        let mut t = started();
        let feed = t.location().feed();
        assert!(feed.send(Coordinate::new(1.0, 1.0, 0)));
        let c = t.try_recv_sample().unwrap();
        t.on_sample(c);
        assert_eq!(t.state().samples, vec![c]);
        assert_matches!(t.try_recv_sample(), Err(TryRecvError::Empty));
    }
}
