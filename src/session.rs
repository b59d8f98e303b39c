use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::{haversine_distance, Coordinate};
use crate::time_series::TimeSeriesPoint;

/// Fixed length of a walk test
pub const SESSION_DURATION_SECS: u32 = 360;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Running,
    Finished,
}

/// Mutable state of one session, owned by the tracker while it runs
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub started_at: Option<DateTime<Utc>>,
    pub origin: Option<Coordinate>,
    pub elapsed_seconds: u32,
    pub samples: Vec<Coordinate>,
    pub total_distance_meters: f64,
}

impl SessionState {
    /// Appends a fix and returns the distance it added. The first fix adds nothing.
    pub fn record_sample(&mut self, coordinate: Coordinate) -> f64 {
        let contribution = self
            .samples
            .last()
            .map_or(0.0, |last| haversine_distance(last, &coordinate));
        self.total_distance_meters += contribution;
        self.samples.push(coordinate);
        contribution
    }

    /// Advances the countdown by one second, saturating at the session length.
    pub fn advance(&mut self) -> u32 {
        if self.elapsed_seconds < SESSION_DURATION_SECS {
            self.elapsed_seconds += 1;
        }
        self.elapsed_seconds
    }

    pub fn seconds_remaining(&self) -> u32 {
        SESSION_DURATION_SECS.saturating_sub(self.elapsed_seconds)
    }

    pub fn is_time_up(&self) -> bool {
        self.elapsed_seconds >= SESSION_DURATION_SECS
    }

    pub fn to_record(&self, fallback_start: DateTime<Utc>) -> SessionRecord {
        SessionRecord {
            started_at: self.started_at.unwrap_or(fallback_start),
            distance_meters: self.total_distance_meters.round() as u32,
            duration_seconds: self.elapsed_seconds,
            samples: self.samples.clone(),
        }
    }
}

/// A completed (or stopped) walk test as it is persisted.
///
/// Field names on disk follow the result list of the mobile app
/// (`date`, `distance`, `duration`, `coordinates`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(rename = "date")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "distance")]
    pub distance_meters: u32,
    #[serde(rename = "duration")]
    pub duration_seconds: u32,
    #[serde(rename = "coordinates", default)]
    pub samples: Vec<Coordinate>,
}

impl SessionRecord {
    /// Cumulative distance against seconds since the first fix
    pub fn distance_series(&self) -> Vec<TimeSeriesPoint> {
        let Some(first) = self.samples.first() else {
            return Vec::new();
        };

        let mut state = SessionState::default();
        self.samples
            .iter()
            .map(|c| {
                state.record_sample(*c);
                let t = (c.timestamp_millis - first.timestamp_millis) as f64 / 1000.0;
                TimeSeriesPoint::new(t, state.total_distance_meters)
            })
            .collect()
    }

    pub fn average_speed_mps(&self) -> f64 {
        match self.duration_seconds {
            0 => 0.0,
            secs => self.distance_meters as f64 / secs as f64,
        }
    }
}
