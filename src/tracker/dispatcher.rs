use std::sync::Arc;

use tracing::{debug, info};

use crate::syncthing_client::models::Event;
use crate::types::TrackerError;

use super::model::{EventEffect, SharedModel};
use super::notifier::NotifierHub;

/// Summary of one consumed batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub applied: usize,
    pub skipped: usize,
    pub refresh_requested: bool,
}

/// Applies event batches to the model and remembers the highest applied id.
pub struct EventDispatcher {
    model: SharedModel,
    notifier: Arc<NotifierHub>,
    last_event_id: u64,
    epoch: Option<String>,
}

impl EventDispatcher {
    pub fn new(model: SharedModel, notifier: Arc<NotifierHub>) -> Self {
        Self {
            model,
            notifier,
            last_event_id: 0,
            epoch: None,
        }
    }

    /// The watermark: highest event id applied so far.
    pub fn last_event_id(&self) -> u64 {
        self.last_event_id
    }

    /// Moves the watermark without applying anything, so history that a full
    /// refresh already covers is not replayed.
    pub fn prime(&mut self, latest_id: u64) {
        if latest_id > self.last_event_id {
            debug!(latest_id, "Event watermark primed");
            self.last_event_id = latest_id;
        }
    }

    /// Tracks the daemon's start time. A restarted daemon numbers its events
    /// from scratch, so the watermark is reset; returns true when that happens.
    pub fn observe_epoch(&mut self, current: Option<&str>) -> bool {
        let Some(current) = current else {
            return false;
        };
        let restarted = self
            .epoch
            .as_deref()
            .is_some_and(|previous| previous != current);
        if restarted {
            info!(previous_watermark = self.last_event_id, "Daemon restarted, resetting event watermark");
            self.last_event_id = 0;
        }
        if restarted || self.epoch.is_none() {
            self.epoch = Some(current.to_string());
        }
        restarted
    }

    pub fn admit(&self, event: &Event) -> Result<(), TrackerError> {
        if event.id <= self.last_event_id {
            return Err(TrackerError::DuplicateOrStaleEvent {
                id: event.id,
                watermark: self.last_event_id,
            });
        }
        Ok(())
    }

    /// Applies `events` in the order given. Events at or below the watermark
    /// are skipped, never reordered. Observers are notified once per batch
    /// that changed anything.
    pub async fn consume(&mut self, events: Vec<Event>) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        if events.is_empty() {
            return outcome;
        }

        let mut changed = false;
        {
            let mut model = self.model.write().await;
            for event in &events {
                if let Err(err) = self.admit(event) {
                    debug!(error = %err, kind = event.kind.as_str(), "Skipping event");
                    outcome.skipped += 1;
                    continue;
                }

                match model.apply_event(event) {
                    EventEffect::Unchanged => {}
                    EventEffect::Changed => changed = true,
                    EventEffect::RefreshRequested => {
                        changed = true;
                        outcome.refresh_requested = true;
                    }
                }
                self.last_event_id = event.id;
                outcome.applied += 1;
            }
        }

        if changed {
            self.notifier.notify();
        }
        outcome
    }
}
