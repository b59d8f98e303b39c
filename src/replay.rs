use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::mpsc::TryRecvError;

use tracing::{debug, info};

use crate::error::WalkError;
use crate::geo::Coordinate;
use crate::location::{LocationSource, Subscription, WatchOptions};
use crate::runtime::Clock;
use crate::session::SessionRecord;
use crate::store::ResultStore;
use crate::tracker::WalkSessionTracker;

/// Reads fixes from CSV with a `latitude,longitude,timestamp` header.
pub fn read_csv_track<R: Read>(reader: R) -> Result<Vec<Coordinate>, WalkError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut samples = Vec::new();
    for row in rdr.deserialize() {
        let sample: Coordinate = row?;
        samples.push(sample);
    }
    Ok(samples)
}

/// Loads a track file. `.csv` files are read as CSV, anything else as a JSON
/// array of fixes or a single stored walk result.
pub fn load_track<P: AsRef<Path>>(path: P) -> Result<Vec<Coordinate>, WalkError> {
    let path = path.as_ref();
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    let samples = if is_csv {
        read_csv_track(fs::File::open(path)?)?
    } else {
        let bytes = fs::read(path)?;
        match serde_json::from_slice::<Vec<Coordinate>>(&bytes) {
            Ok(samples) => samples,
            Err(_) => serde_json::from_slice::<SessionRecord>(&bytes)?.samples,
        }
    };

    if samples.is_empty() {
        return Err(WalkError::Track(format!("{} holds no fixes", path.display())));
    }
    debug!(path = %path.display(), fixes = samples.len(), "track loaded");
    Ok(samples)
}

/// Location source that plays back a recorded track
#[derive(Debug, Clone)]
pub struct TrackSource {
    samples: Vec<Coordinate>,
}

impl TrackSource {
    pub fn new(samples: Vec<Coordinate>) -> Self {
        Self { samples }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, WalkError> {
        load_track(path).map(Self::new)
    }

    pub fn samples(&self) -> &[Coordinate] {
        &self.samples
    }
}

impl LocationSource for TrackSource {
    fn current_position(&mut self) -> Result<Coordinate, WalkError> {
        self.samples
            .first()
            .copied()
            .ok_or_else(|| WalkError::LocationUnavailable("track is empty".to_string()))
    }

    /// The whole track is queued at once; the channel closes after the last fix.
    fn subscribe(&mut self, _options: WatchOptions) -> Result<Subscription, WalkError> {
        let (tx, subscription) = Subscription::channel();
        for sample in &self.samples {
            tx.send(*sample);
        }
        Ok(subscription)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayOptions {
    /// Stop at the last fix instead of counting down the rest of the session.
    pub stop_at_end: bool,
}

/// Plays a started tracker's queued fixes on a clock taken from their
/// timestamps: before each fix the countdown is ticked up to
/// `(timestamp - first timestamp) / 1000` seconds.
pub fn replay<L, S, C>(
    tracker: &mut WalkSessionTracker<L, S, C>,
    options: ReplayOptions,
) -> Result<SessionRecord, WalkError>
where
    L: LocationSource,
    S: ResultStore,
    C: Clock,
{
    if !tracker.is_running() {
        return Err(WalkError::NotRunning);
    }

    let mut first_millis: Option<i64> = None;
    loop {
        match tracker.try_recv_sample() {
            Ok(sample) => {
                let first = *first_millis.get_or_insert(sample.timestamp_millis);
                let offset = ((sample.timestamp_millis - first).max(0) / 1000) as u64;
                while (tracker.state().elapsed_seconds as u64) < offset {
                    if let Some(record) = tracker.tick()? {
                        info!("track outlasted the session, remaining fixes dropped");
                        return Ok(record);
                    }
                }
                tracker.on_sample(sample);
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
        }
    }

    if options.stop_at_end {
        return tracker.stop()?.ok_or(WalkError::NotRunning);
    }
    loop {
        if let Some(record) = tracker.tick()? {
            return Ok(record);
        }
        if !tracker.is_running() {
            return Err(WalkError::NotRunning);
        }
    }
}
