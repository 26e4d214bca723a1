use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::types::TrackerError;

/// Parses Syncthing's RFC 3339 timestamps (nanosecond fractions, numeric offset).
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, TrackerError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| TrackerError::DateParseFailure(raw.to_string()))
}

/// Like [`parse_timestamp`], but substitutes the current time and logs instead of failing.
pub fn timestamp_or_now(raw: &str) -> DateTime<Utc> {
    match parse_timestamp(raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(error = %err, "Using current time instead");
            Utc::now()
        }
    }
}

pub fn format_relative_time(time: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(time);
    if duration.num_seconds() < 60 {
        "just now".to_string()
    } else if duration.num_minutes() < 60 {
        format!("{} min ago", duration.num_minutes())
    } else if duration.num_hours() < 24 {
        format!("{} h ago", duration.num_hours())
    } else {
        format!("{} d ago", duration.num_days())
    }
}

/// Expands a leading `~` with the daemon's home directory. Paths are remote,
/// so the local home directory is never consulted.
pub fn expand_tilde(path: &str, home: Option<&str>) -> PathBuf {
    match (path.strip_prefix('~'), home.filter(|h| !h.is_empty())) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with(['/', '\\']) => {
            PathBuf::from(format!("{}{}", home.trim_end_matches(['/', '\\']), rest))
        }
        _ => PathBuf::from(path),
    }
}
