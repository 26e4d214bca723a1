mod dispatcher;
mod model;
mod notifier;
mod scheduler;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::syncthing_client::models::FileTree;
use crate::syncthing_client::{SyncthingApi, SyncthingClient};
use crate::types::TrackerError;

pub use dispatcher::{DispatchOutcome, EventDispatcher};
pub use model::{EventEffect, SharedModel, SyncModel, TreeEntry, DEFAULT_MAX_ERRORS};
pub use notifier::{Notifier, NotifierHub};
pub use scheduler::{
    PollingScheduler, RefreshIntervals, SchedulerHandle, SchedulerState, Visibility,
};

/// Keeps a [`SyncModel`] current for the active Syncthing client.
///
/// Owns the shared model, the observer hub and, while started, the polling
/// loops. Readers get cloned snapshots and never hold the model lock.
pub struct Tracker {
    config: Config,
    api: Arc<dyn SyncthingApi>,
    model: SharedModel,
    notifier: Arc<NotifierHub>,
    scheduler: Option<SchedulerHandle>,
    visibility: Visibility,
}

impl Tracker {
    pub fn new(config: Config) -> Result<Self, TrackerError> {
        let api = SyncthingClient::new(config.active()?)?;
        Ok(Self::with_api(config, Arc::new(api)))
    }

    pub fn with_api(config: Config, api: Arc<dyn SyncthingApi>) -> Self {
        let model = SyncModel::shared(config.max_errors);
        Self {
            config,
            api,
            model,
            notifier: Arc::new(NotifierHub::new()),
            scheduler: None,
            visibility: Visibility::Foreground,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn notifier(&self) -> &Arc<NotifierHub> {
        &self.notifier
    }

    pub fn subscribe(&self, observer: Arc<dyn Notifier>) {
        self.notifier.subscribe(observer);
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler
            .as_ref()
            .map_or(SchedulerState::Idle, SchedulerHandle::state)
    }

    fn intervals(&self) -> RefreshIntervals {
        RefreshIntervals {
            foreground: self.config.refresh_interval(),
            background: self.config.background_refresh_interval(),
        }
    }

    /// Starts polling. Does nothing if already started.
    pub fn start(&mut self) {
        if self.scheduler.is_some() {
            return;
        }
        let scheduler = PollingScheduler::new(
            Arc::clone(&self.api),
            Arc::clone(&self.model),
            Arc::clone(&self.notifier),
            self.intervals(),
        );
        self.scheduler = Some(scheduler.start(self.visibility));
    }

    pub async fn shutdown(&mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.shutdown().await;
        }
    }

    /// A consistent copy of the model.
    pub async fn snapshot(&self) -> SyncModel {
        self.model.read().await.clone()
    }

    pub fn set_visibility(&mut self, visibility: Visibility) {
        self.visibility = visibility;
        if let Some(scheduler) = &self.scheduler {
            scheduler.set_visibility(visibility);
        }
    }

    pub fn refresh_now(&self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.refresh_now();
        }
    }

    /// Points the tracker at another configured client. Polling of the old
    /// client stops, the model starts empty, and polling resumes if it was on.
    pub async fn switch_client(&mut self, name: &str) -> Result<(), TrackerError> {
        let client = self.config.client(name)?;
        let api = SyncthingClient::new(client)?;
        self.replace_api(name, Arc::new(api)).await;
        Ok(())
    }

    async fn replace_api(&mut self, name: &str, api: Arc<dyn SyncthingApi>) {
        let was_running = self.scheduler.is_some();
        self.shutdown().await;

        self.api = api;
        self.config.active_client = Some(name.to_string());
        *self.model.write().await = SyncModel::new(self.config.max_errors);
        self.notifier.notify();
        info!(client = %name, "Switched Syncthing client");

        if was_running {
            self.start();
        }
    }

    /// Fetches a folder's manifest and builds its file tree off the runtime.
    /// The tree is stored in the model and returned.
    pub async fn load_file_tree(&self, folder_id: &str) -> Result<FileTree, TrackerError> {
        self.model.write().await.begin_tree_load(folder_id)?;
        self.notifier.notify();

        match self.build_tree(folder_id).await {
            Ok(tree) => {
                let stored = self.model.write().await.store_tree(tree.clone());
                if stored {
                    debug!(folder = %folder_id, nodes = tree.len(), "File tree loaded");
                    self.notifier.notify();
                }
                Ok(tree)
            }
            Err(err) => {
                warn!(folder = %folder_id, error = %err, "Failed to load file tree");
                self.model.write().await.abandon_tree_load(folder_id);
                self.notifier.notify();
                Err(err)
            }
        }
    }

    async fn build_tree(&self, folder_id: &str) -> Result<FileTree, TrackerError> {
        let manifest = self.api.browse(folder_id).await?;
        let folder = folder_id.to_string();
        tokio::task::spawn_blocking(move || FileTree::build(folder, &manifest))
            .await
            .map_err(|err| TrackerError::TreeBuild(err.to_string()))
    }

    pub async fn rescan_folder(&self, folder_id: &str) -> Result<(), TrackerError> {
        if self.model.read().await.folder(folder_id).is_none() {
            return Err(TrackerError::UnknownFolder(folder_id.to_string()));
        }
        self.api.rescan(folder_id).await?;
        info!(folder = %folder_id, "Rescan requested");
        Ok(())
    }

    /// Local filesystem path of a folder, with `~` expanded.
    pub async fn folder_location(&self, folder_id: &str) -> Result<PathBuf, TrackerError> {
        self.model
            .read()
            .await
            .folder_location(folder_id)
            .ok_or_else(|| TrackerError::UnknownFolder(folder_id.to_string()))
    }

    pub async fn clear_errors(&self) {
        self.model.write().await.clear_errors();
        self.notifier.notify();
    }
}
