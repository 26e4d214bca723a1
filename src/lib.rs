//! Client-side state tracking for a Syncthing daemon.
//!
//! [`Tracker`] polls the daemon's REST API, folds full snapshots and the event
//! stream into a [`SyncModel`], and tells observers when the model changed.

pub mod config;
pub mod syncthing_client;
pub mod tracker;
pub mod types;

pub use config::{ClientConfig, Config};
pub use syncthing_client::{SyncthingApi, SyncthingClient};
pub use tracker::{Notifier, SyncModel, Tracker, Visibility};
pub use types::TrackerError;
