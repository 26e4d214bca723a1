use std::sync::{Arc, Weak};

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use syncthing_tracker::syncthing_client::helpers::format_relative_time;
use syncthing_tracker::{Config, SyncModel, Tracker};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn log_summary(model: &SyncModel) {
    let folders = model.folders();
    let syncing = folders.values().filter(|folder| !folder.idle).count();
    let latest_error = model
        .errors()
        .last()
        .map(|err| format!("{} ({})", err.message, format_relative_time(err.time, Utc::now())));

    info!(
        folders = folders.len(),
        syncing,
        connections = model.connections().len(),
        errors = model.errors().len(),
        latest_error = latest_error.as_deref().unwrap_or("none"),
        upgrade = model.possible_upgrade().unwrap_or("none"),
        "Sync state changed"
    );
}

#[tokio::main]
async fn main() {
    init_tracing();

    let config = Config::load().await;
    let tracker = match Tracker::new(config) {
        Ok(tracker) => Arc::new(RwLock::new(tracker)),
        Err(err) => {
            error!(error = %err, "Failed to create Syncthing client");
            std::process::exit(1);
        }
    };

    // Summaries are logged off the notifying task so the callback stays cheap.
    let weak: Weak<RwLock<Tracker>> = Arc::downgrade(&tracker);
    let mut revisions = tracker.read().await.notifier().watch();
    tokio::spawn(async move {
        while revisions.changed().await.is_ok() {
            let Some(tracker) = weak.upgrade() else {
                break;
            };
            let snapshot = tracker.read().await.snapshot().await;
            log_summary(&snapshot);
        }
    });

    tracker.write().await.start();

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Failed to listen for shutdown signal");
    }
    info!("Shutting down");
    tracker.write().await.shutdown().await;
}
