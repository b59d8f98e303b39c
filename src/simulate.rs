use std::f64::consts::PI;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tracing::debug;

use crate::error::WalkError;
use crate::geo::{haversine_distance, Coordinate, EARTH_RADIUS_METERS};
use crate::location::{LocationSource, SampleSender, Subscription, WatchOptions};

/// Location source that invents a walk: a wandering heading and a step of
/// roughly `step_meters` per fix, emitted every `time_interval` on its own thread.
#[derive(Debug, Clone)]
pub struct SimulatedWalker {
    start: Coordinate,
    step_meters: f64,
}

impl SimulatedWalker {
    pub fn new(latitude: f64, longitude: f64, step_meters: f64) -> Self {
        Self {
            start: Coordinate::new(latitude, longitude, Utc::now().timestamp_millis()),
            step_meters,
        }
    }
}

/// Moves `meters` along `heading` (radians from north) on a spherical Earth.
pub fn offset(from: &Coordinate, heading: f64, meters: f64, timestamp_millis: i64) -> Coordinate {
    let d = meters / EARTH_RADIUS_METERS;
    let lat1 = from.latitude.to_radians();
    let lon1 = from.longitude.to_radians();

    let lat2 = (lat1.sin() * d.cos() + lat1.cos() * d.sin() * heading.cos()).asin();
    let lon2 = lon1 + (heading.sin() * d.sin() * lat1.cos()).atan2(d.cos() - lat1.sin() * lat2.sin());

    Coordinate::new(lat2.to_degrees(), lon2.to_degrees(), timestamp_millis)
}

fn walk(tx: SampleSender, start: Coordinate, step_meters: f64, options: WatchOptions) {
    let mut rng = rand::thread_rng();
    let mut heading = rng.gen_range(0.0..2.0 * PI);
    let mut last_sent = start;
    let mut position = start;
    let interval = options.time_interval.max(Duration::from_millis(1));

    loop {
        std::thread::sleep(interval);
        if !tx.is_active() {
            debug!("simulated walker unsubscribed");
            break;
        }
        heading += rng.gen_range(-0.3..0.3);
        let step = step_meters * rng.gen_range(0.8..1.2);
        position = offset(&position, heading, step, Utc::now().timestamp_millis());

        // Below the movement threshold the fix is not delivered.
        if haversine_distance(&last_sent, &position) < options.distance_interval_meters {
            continue;
        }
        if !tx.send(position) {
            break;
        }
        last_sent = position;
    }
}

impl LocationSource for SimulatedWalker {
    fn current_position(&mut self) -> Result<Coordinate, WalkError> {
        Ok(self.start)
    }

    fn subscribe(&mut self, options: WatchOptions) -> Result<Subscription, WalkError> {
        let (tx, subscription) = Subscription::channel();
        let start = self.start;
        let step_meters = self.step_meters;
        std::thread::Builder::new()
            .name("simulated-walker".to_string())
            .spawn(move || walk(tx, start, step_meters, options))?;
        Ok(subscription)
    }
}
