use chrono::{DateTime, Utc};

use crate::syncthing_client::api::DaemonError;
use crate::syncthing_client::helpers::parse_timestamp;
use crate::types::TrackerError;

/// A user-visible error. Two errors with the same time and text are the same error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncError {
    pub time: DateTime<Utc>,
    pub message: String,
}

impl SyncError {
    pub fn new(message: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            time,
            message: message.into(),
        }
    }

    pub fn now(message: impl Into<String>) -> Self {
        Self::new(message, Utc::now())
    }

    /// Fails when the daemon's `when` is not a timestamp.
    pub fn from_daemon(error: &DaemonError) -> Result<Self, TrackerError> {
        Ok(Self::new(error.message.trim_end(), parse_timestamp(&error.when)?))
    }
}
