use thiserror::Error;

use crate::session::{SessionPhase, SessionRecord};

/// Failures of a result store backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed result list: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Write rejected: {0}")]
    Rejected(String),
}

#[derive(Error, Debug)]
pub enum WalkError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),

    #[error("Cannot start a session that is {phase}")]
    InvalidState { phase: SessionPhase },

    #[error("No session is running")]
    NotRunning,

    /// The session finished but its record could not be stored. The record
    /// is carried along so the save can be retried.
    #[error("Failed to save walk result ({} m in {} s): {source}", .record.distance_meters, .record.duration_seconds)]
    PersistenceWrite {
        record: Box<SessionRecord>,
        #[source]
        source: StoreError,
    },

    #[error("Result store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid track: {0}")]
    Track(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WalkError {
    /// The finalized record attached to a failed save, if any.
    pub fn unsaved_record(&self) -> Option<&SessionRecord> {
        match self {
            WalkError::PersistenceWrite { record, .. } => Some(record),
            _ => None,
        }
    }

    pub fn is_location_error(&self) -> bool {
        matches!(
            self,
            WalkError::PermissionDenied | WalkError::LocationUnavailable(_)
        )
    }
}
