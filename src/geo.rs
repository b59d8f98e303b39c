use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A single GPS fix as delivered by a location source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "timestamp")]
    pub timestamp_millis: i64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64, timestamp_millis: i64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp_millis,
        }
    }

    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        haversine_distance(self, other)
    }
}

impl From<(f64, f64, i64)> for Coordinate {
    fn from(v: (f64, f64, i64)) -> Self {
        Coordinate::new(v.0, v.1, v.2)
    }
}

/// Great-circle distance in meters between two fixes.
pub fn haversine_distance(a: &Coordinate, b: &Coordinate) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    // Rounding can push h just past 1.0 for near-antipodal fixes.
    let h = ((d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2))
        .clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Sum of the distances between consecutive fixes, in arrival order.
pub fn path_length(samples: &[Coordinate]) -> f64 {
    samples
        .iter()
        .tuple_windows()
        .map(|(a, b)| haversine_distance(a, b))
        .sum()
}
