// Library surface shared by the binary and the integration tests.
pub mod achievements;
pub mod app_dirs;
pub mod config;
pub mod error;
pub mod geo;
pub mod history;
pub mod location;
pub mod logging;
pub mod profile;
pub mod replay;
pub mod runtime;
pub mod session;
pub mod simulate;
pub mod store;
pub mod time_series;
pub mod tracker;
pub mod util;

pub use error::{StoreError, WalkError};
pub use geo::{haversine_distance, Coordinate};
pub use session::{SessionPhase, SessionRecord, SESSION_DURATION_SECS};
pub use tracker::WalkSessionTracker;
