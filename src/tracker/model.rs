use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::syncthing_client::api::{DaemonError, FullRefresh};
use crate::syncthing_client::models::{
    value_as_u64, Connection, Event, EventKind, FileTree, Folder, SyncError, SystemStatus,
};
use crate::types::TrackerError;

pub const DEFAULT_MAX_ERRORS: usize = 100;

pub type SharedModel = Arc<RwLock<SyncModel>>;

/// Load state of one folder's file tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeEntry {
    Loading,
    Ready(FileTree),
    /// The folder's index changed since this tree was built.
    Stale(FileTree),
}

impl TreeEntry {
    pub fn tree(&self) -> Option<&FileTree> {
        match self {
            TreeEntry::Loading => None,
            TreeEntry::Ready(tree) | TreeEntry::Stale(tree) => Some(tree),
        }
    }
}

/// What applying one event did to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventEffect {
    Unchanged,
    Changed,
    /// The model changed or may be out of date; a full refresh should follow.
    RefreshRequested,
}

/// The tracker's view of one Syncthing daemon.
#[derive(Debug, Clone)]
pub struct SyncModel {
    system: Option<SystemStatus>,
    folders: BTreeMap<String, Folder>,
    connections: Vec<Connection>,
    errors: Vec<SyncError>,
    possible_upgrade: Option<String>,
    config_in_sync: bool,
    trees: HashMap<String, TreeEntry>,
    max_errors: usize,
}

impl Default for SyncModel {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ERRORS)
    }
}

impl SyncModel {
    pub fn new(max_errors: usize) -> Self {
        Self {
            system: None,
            folders: BTreeMap::new(),
            connections: Vec::new(),
            errors: Vec::new(),
            possible_upgrade: None,
            config_in_sync: false,
            trees: HashMap::new(),
            max_errors: max_errors.max(1),
        }
    }

    pub fn shared(max_errors: usize) -> SharedModel {
        Arc::new(RwLock::new(Self::new(max_errors)))
    }

    pub fn system(&self) -> Option<&SystemStatus> {
        self.system.as_ref()
    }

    pub fn folders(&self) -> &BTreeMap<String, Folder> {
        &self.folders
    }

    pub fn folder(&self, id: &str) -> Option<&Folder> {
        self.folders.get(id)
    }

    pub fn folder_ids(&self) -> impl Iterator<Item = &str> {
        self.folders.keys().map(String::as_str)
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn errors(&self) -> &[SyncError] {
        &self.errors
    }

    /// `None` when the daemon is up to date.
    pub fn possible_upgrade(&self) -> Option<&str> {
        self.possible_upgrade.as_deref()
    }

    pub fn config_in_sync(&self) -> bool {
        self.config_in_sync
    }

    /// Start time of the daemon the model was last refreshed from.
    pub fn daemon_epoch(&self) -> Option<&str> {
        self.system.as_ref()?.started_at.as_deref()
    }

    /// Resolved filesystem root of a folder, for revealing it in a file manager.
    pub fn folder_location(&self, id: &str) -> Option<PathBuf> {
        self.folders.get(id).map(|folder| folder.path.clone())
    }

    pub fn tree_state(&self, folder_id: &str) -> Option<&TreeEntry> {
        self.trees.get(folder_id)
    }

    pub fn file_tree(&self, folder_id: &str) -> Option<&FileTree> {
        self.trees.get(folder_id)?.tree()
    }

    /// Merges an authoritative snapshot.
    ///
    /// Folders are rebuilt from the reported configuration. A folder whose
    /// status is missing from the payload keeps its previous idle flag and
    /// byte counts.
    pub fn apply_full_refresh(&mut self, refresh: FullRefresh) {
        let system = SystemStatus::from(refresh.status);
        let home = Some(system.tilde.as_str()).filter(|home| !home.is_empty());

        let mut folders = BTreeMap::new();
        for snapshot in &refresh.folders {
            let mut folder = Folder::from_config(&snapshot.config, home);
            match (&snapshot.status, self.folders.get(&folder.id)) {
                (Some(status), _) => folder.apply_status(status),
                (None, Some(previous)) => folder.inherit_sync_state(previous),
                (None, None) => {}
            }
            folders.insert(folder.id.clone(), folder);
        }
        self.folders = folders;
        self.system = Some(system);

        let folders = &self.folders;
        self.trees.retain(|id, _| folders.contains_key(id));

        if let Some(response) = refresh.connections {
            let mut reported: BTreeMap<String, Connection> = response
                .connections
                .iter()
                .filter(|(_, stats)| stats.connected)
                .map(|(id, stats)| (id.clone(), Connection::from_stats(id, stats)))
                .collect();
            self.connections
                .retain_mut(|existing| match reported.remove(&existing.device_id) {
                    Some(latest) => {
                        *existing = latest;
                        true
                    }
                    None => false,
                });
            self.connections.extend(reported.into_values());
        }

        for error in &refresh.errors {
            self.record_daemon_error(error);
        }
        if let Some(in_sync) = refresh.config_in_sync {
            self.config_in_sync = in_sync;
        }
        if let Some(upgrade) = &refresh.upgrade {
            self.possible_upgrade = upgrade.available_version();
        }
    }

    /// Folds one event into the model. Events the model cannot use are no-ops.
    pub fn apply_event(&mut self, event: &Event) -> EventEffect {
        match event.kind {
            EventKind::FolderSummary => self.apply_folder_summary(event),
            EventKind::FolderCompletion => self.apply_folder_completion(event),
            EventKind::DownloadProgress => self.apply_download_progress(event),
            EventKind::DeviceConnected => self.apply_device_connected(event),
            EventKind::DeviceDisconnected => self.apply_device_disconnected(event),
            EventKind::FolderErrors => self.apply_folder_errors(event),
            EventKind::ItemStarted => self.with_folder(event, |folder| {
                let changed = folder.idle;
                folder.idle = false;
                changed
            }),
            EventKind::ItemFinished => self.apply_item_finished(event),
            EventKind::StateChanged => match event.str_field("to") {
                Some(to) => {
                    let idle = to.eq_ignore_ascii_case("idle");
                    self.with_folder(event, |folder| {
                        let changed = folder.idle != idle;
                        folder.idle = idle;
                        changed
                    })
                }
                None => EventEffect::Unchanged,
            },
            EventKind::ConfigSaved => {
                self.config_in_sync = false;
                EventEffect::RefreshRequested
            }
            EventKind::Starting | EventKind::StartupCompleted => EventEffect::RefreshRequested,
            EventKind::LocalIndexUpdated | EventKind::RemoteIndexUpdated => {
                self.mark_tree_stale(event)
            }
            EventKind::DeviceDiscovered
            | EventKind::DeviceRejected
            | EventKind::FolderRejected
            | EventKind::Ping
            | EventKind::Unknown => EventEffect::Unchanged,
        }
    }

    /// Appends an error unless an identical one is already recorded.
    /// The oldest errors are dropped beyond the retention cap.
    pub fn record_error(&mut self, error: SyncError) -> bool {
        if self.errors.contains(&error) {
            return false;
        }
        self.errors.push(error);
        if self.errors.len() > self.max_errors {
            let excess = self.errors.len() - self.max_errors;
            self.errors.drain(..excess);
        }
        true
    }

    /// Records a failed fetch. A failure whose message is still listed is not
    /// recorded again.
    pub fn record_failure(&mut self, err: &TrackerError) -> bool {
        let message = err.to_string();
        if self.has_error_message(&message) {
            return false;
        }
        self.record_error(SyncError::now(message))
    }

    /// A daemon error without a usable timestamp is stamped with the current
    /// time once, then matched by message alone.
    fn record_daemon_error(&mut self, error: &DaemonError) -> bool {
        match SyncError::from_daemon(error) {
            Ok(parsed) => self.record_error(parsed),
            Err(err) => {
                let message = error.message.trim_end();
                if self.has_error_message(message) {
                    return false;
                }
                warn!(error = %err, "Daemon error has no usable time, using current time");
                self.record_error(SyncError::now(message))
            }
        }
    }

    fn has_error_message(&self, message: &str) -> bool {
        self.errors.iter().any(|known| known.message == message)
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    pub fn begin_tree_load(&mut self, folder_id: &str) -> Result<(), TrackerError> {
        if !self.folders.contains_key(folder_id) {
            return Err(TrackerError::UnknownFolder(folder_id.to_string()));
        }
        self.trees.insert(folder_id.to_string(), TreeEntry::Loading);
        Ok(())
    }

    /// Stores a freshly built tree, unless its folder vanished meanwhile.
    pub fn store_tree(&mut self, tree: FileTree) -> bool {
        if !self.folders.contains_key(tree.folder_id()) {
            debug!(folder = %tree.folder_id(), "Dropping tree of removed folder");
            return false;
        }
        self.trees
            .insert(tree.folder_id().to_string(), TreeEntry::Ready(tree));
        true
    }

    pub fn abandon_tree_load(&mut self, folder_id: &str) {
        if matches!(self.trees.get(folder_id), Some(TreeEntry::Loading)) {
            self.trees.remove(folder_id);
        }
    }

    fn with_folder<F>(&mut self, event: &Event, update: F) -> EventEffect
    where
        F: FnOnce(&mut Folder) -> bool,
    {
        let Some(folder_id) = event.folder_id() else {
            return EventEffect::Unchanged;
        };
        match self.folders.get_mut(folder_id) {
            Some(folder) => {
                if update(folder) {
                    EventEffect::Changed
                } else {
                    EventEffect::Unchanged
                }
            }
            None => {
                debug!(folder = %folder_id, kind = event.kind.as_str(), "Event for untracked folder");
                EventEffect::Unchanged
            }
        }
    }

    fn apply_folder_summary(&mut self, event: &Event) -> EventEffect {
        let Some(summary) = event.field("summary").and_then(Value::as_object) else {
            return EventEffect::Unchanged;
        };
        let idle = summary
            .get("state")
            .and_then(Value::as_str)
            .map(|state| state.eq_ignore_ascii_case("idle"));
        let in_sync = summary.get("inSyncBytes").and_then(value_as_u64);
        let need = summary.get("needBytes").and_then(value_as_u64);

        self.with_folder(event, |folder| {
            let before = (folder.idle, folder.in_sync_bytes, folder.out_of_sync_bytes);
            if let Some(idle) = idle {
                folder.idle = idle;
            }
            if in_sync.is_some() {
                folder.in_sync_bytes = in_sync;
            }
            if need.is_some() {
                folder.out_of_sync_bytes = need;
            }
            before != (folder.idle, folder.in_sync_bytes, folder.out_of_sync_bytes)
        })
    }

    fn apply_folder_completion(&mut self, event: &Event) -> EventEffect {
        let global = event.u64_field("globalBytes");
        let need = event.u64_field("needBytes");
        let completion = event.f64_field("completion");

        self.with_folder(event, |folder| {
            let before = (folder.idle, folder.in_sync_bytes, folder.out_of_sync_bytes);
            if let (Some(global), Some(need)) = (global, need) {
                folder.in_sync_bytes = Some(global.saturating_sub(need));
                folder.out_of_sync_bytes = Some(need.min(global));
            }
            let in_progress = match completion {
                Some(completion) => completion < 100.0,
                None => need.is_some_and(|need| need > 0),
            };
            if in_progress {
                folder.idle = false;
            }
            before != (folder.idle, folder.in_sync_bytes, folder.out_of_sync_bytes)
        })
    }

    /// Payload maps folder id → file name → transfer progress.
    fn apply_download_progress(&mut self, event: &Event) -> EventEffect {
        let Some(data) = &event.data else {
            return EventEffect::Unchanged;
        };

        let mut effect = EventEffect::Unchanged;
        for (folder_id, files) in data {
            let Some(folder) = self.folders.get_mut(folder_id) else {
                continue;
            };
            let Some(files) = files.as_object() else {
                continue;
            };
            let pending = files
                .values()
                .map(|progress| {
                    let total = progress.get("bytesTotal").and_then(value_as_u64).unwrap_or(0);
                    let done = progress.get("bytesDone").and_then(value_as_u64).unwrap_or(0);
                    total.saturating_sub(done)
                })
                .fold(0u64, u64::saturating_add);

            let before = (folder.idle, folder.in_sync_bytes, folder.out_of_sync_bytes);
            match folder.folder_size() {
                Some(size) => {
                    let pending = pending.min(size);
                    folder.out_of_sync_bytes = Some(pending);
                    folder.in_sync_bytes = Some(size - pending);
                }
                None => folder.out_of_sync_bytes = Some(pending),
            }
            if pending > 0 {
                folder.idle = false;
            }
            if before != (folder.idle, folder.in_sync_bytes, folder.out_of_sync_bytes) {
                effect = EventEffect::Changed;
            }
        }
        effect
    }

    fn apply_device_connected(&mut self, event: &Event) -> EventEffect {
        let Some(device_id) = event.str_field("id").filter(|id| !id.is_empty()) else {
            return EventEffect::Unchanged;
        };
        let address = event.str_field("addr").unwrap_or_default();

        match self
            .connections
            .iter_mut()
            .find(|connection| connection.device_id == device_id)
        {
            Some(existing) => existing.address = address.to_string(),
            None => self.connections.push(Connection::new(device_id, address)),
        }
        EventEffect::Changed
    }

    fn apply_device_disconnected(&mut self, event: &Event) -> EventEffect {
        let Some(device_id) = event.str_field("id") else {
            return EventEffect::Unchanged;
        };
        let before = self.connections.len();
        self.connections
            .retain(|connection| connection.device_id != device_id);
        if self.connections.len() == before {
            EventEffect::Unchanged
        } else {
            EventEffect::Changed
        }
    }

    fn apply_folder_errors(&mut self, event: &Event) -> EventEffect {
        let Some(errors) = event.field("errors").and_then(Value::as_array) else {
            return EventEffect::Unchanged;
        };
        let folder = event.folder_id().unwrap_or_default();

        let mut effect = EventEffect::Unchanged;
        for entry in errors {
            let Some(message) = entry.get("error").and_then(Value::as_str) else {
                continue;
            };
            let text = match entry.get("path").and_then(Value::as_str) {
                Some(path) if !folder.is_empty() => format!("{folder}: {path}: {message}"),
                Some(path) => format!("{path}: {message}"),
                None => message.to_string(),
            };
            if self.record_error(SyncError::new(text, event.time)) {
                effect = EventEffect::Changed;
            }
        }
        effect
    }

    fn apply_item_finished(&mut self, event: &Event) -> EventEffect {
        let Some(message) = event.str_field("error").filter(|message| !message.is_empty()) else {
            return EventEffect::Unchanged;
        };
        let text = match (event.folder_id(), event.str_field("item")) {
            (Some(folder), Some(item)) => format!("{folder}: {item}: {message}"),
            _ => message.to_string(),
        };
        if self.record_error(SyncError::new(text, event.time)) {
            EventEffect::Changed
        } else {
            EventEffect::Unchanged
        }
    }

    fn mark_tree_stale(&mut self, event: &Event) -> EventEffect {
        let Some(folder_id) = event.folder_id() else {
            return EventEffect::Unchanged;
        };
        match self.trees.remove(folder_id) {
            Some(TreeEntry::Ready(tree)) | Some(TreeEntry::Stale(tree)) => {
                self.trees
                    .insert(folder_id.to_string(), TreeEntry::Stale(tree));
                EventEffect::Changed
            }
            Some(TreeEntry::Loading) => {
                self.trees.insert(folder_id.to_string(), TreeEntry::Loading);
                EventEffect::Unchanged
            }
            None => EventEffect::Unchanged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syncthing_client::api::{
        ConnectionStats, ConnectionsResponse, DaemonError, FolderConfig, FolderSnapshot,
        FolderStatus, SystemStatusResponse, UpgradeResponse,
    };
    use serde_json::json;

    fn folder_config(id: &str, path: &str) -> FolderConfig {
        FolderConfig {
            id: id.to_string(),
            label: None,
            path: path.to_string(),
            paused: None,
            devices: Vec::new(),
        }
    }

    fn status(state: &str, in_sync: u64, need: u64) -> FolderStatus {
        FolderStatus {
            state: Some(state.to_string()),
            in_sync_bytes: Some(in_sync),
            need_bytes: Some(need),
            global_bytes: Some(in_sync + need),
        }
    }

    fn stats(address: &str, bytes_in: u64) -> ConnectionStats {
        ConnectionStats {
            connected: true,
            address: Some(address.to_string()),
            in_bytes_total: bytes_in,
            out_bytes_total: 0,
        }
    }

    fn refresh(folders: Vec<FolderSnapshot>, connections: &[(&str, ConnectionStats)]) -> FullRefresh {
        FullRefresh {
            status: SystemStatusResponse {
                my_id: "LOCAL".to_string(),
                tilde: "/home/me".to_string(),
                start_time: Some("2024-01-01T00:00:00Z".to_string()),
                ..Default::default()
            },
            folders,
            connections: Some(ConnectionsResponse {
                connections: connections
                    .iter()
                    .map(|(id, stats)| (id.to_string(), stats.clone()))
                    .collect(),
            }),
            ..Default::default()
        }
    }

    fn snapshot(id: &str, status: Option<FolderStatus>) -> FolderSnapshot {
        FolderSnapshot {
            config: folder_config(id, &format!("~/{id}")),
            status,
        }
    }

    fn event(id: u64, kind: EventKind, data: Value) -> Event {
        let data = match data {
            Value::Object(map) => Some(map),
            _ => None,
        };
        Event::new(id, kind, data)
    }

    fn model_with_docs() -> SyncModel {
        let mut model = SyncModel::default();
        model.apply_full_refresh(refresh(
            vec![snapshot("docs", Some(status("idle", 80, 20)))],
            &[],
        ));
        model
    }

    #[test]
    fn full_refresh_populates_model() {
        let mut model = SyncModel::default();
        let mut payload = refresh(
            vec![snapshot("docs", Some(status("idle", 80, 20)))],
            &[("PEER", stats("10.0.0.2:22000", 5))],
        );
        payload.config_in_sync = Some(true);
        payload.upgrade = Some(UpgradeResponse {
            running: "v1.0.0".to_string(),
            latest: "v1.1.0".to_string(),
            newer: Some(true),
        });
        model.apply_full_refresh(payload);

        assert_eq!(model.system().unwrap().my_id, "LOCAL");
        assert_eq!(model.daemon_epoch(), Some("2024-01-01T00:00:00Z"));
        let docs = model.folder("docs").unwrap();
        assert!(docs.idle);
        assert_eq!(docs.sync_percentage(), Some(80.0));
        assert_eq!(
            model.folder_location("docs"),
            Some(PathBuf::from("/home/me/docs"))
        );
        assert_eq!(model.connections().len(), 1);
        assert!(model.config_in_sync());
        assert_eq!(model.possible_upgrade(), Some("v1.1.0"));
        for (id, folder) in model.folders() {
            assert_eq!(id, &folder.id);
        }
    }

    #[test]
    fn refresh_preserves_unreported_folder_state() {
        let mut model = model_with_docs();
        model.apply_full_refresh(refresh(
            vec![snapshot("docs", None), snapshot("photos", None)],
            &[],
        ));

        let docs = model.folder("docs").unwrap();
        assert!(docs.idle);
        assert_eq!(docs.in_sync_bytes, Some(80));
        assert_eq!(docs.out_of_sync_bytes, Some(20));
        assert_eq!(model.folder("photos").unwrap().sync_percentage(), None);
    }

    #[test]
    fn refresh_drops_removed_folders() {
        let mut model = model_with_docs();
        model.apply_full_refresh(refresh(vec![snapshot("photos", None)], &[]));
        assert!(model.folder("docs").is_none());
        assert_eq!(model.folder_ids().collect::<Vec<_>>(), vec!["photos"]);
    }

    #[test]
    fn connections_reconcile_by_device_id() {
        let mut model = SyncModel::default();
        model.apply_full_refresh(refresh(
            Vec::new(),
            &[("A", stats("a:1", 1)), ("B", stats("b:1", 1))],
        ));
        let mut offline = stats("c:1", 0);
        offline.connected = false;
        model.apply_full_refresh(refresh(
            Vec::new(),
            &[("B", stats("b:2", 9)), ("C", offline), ("D", stats("d:1", 0))],
        ));

        let ids: Vec<_> = model
            .connections()
            .iter()
            .map(|c| c.device_id.as_str())
            .collect();
        assert_eq!(ids, vec!["B", "D"]);
        let b = &model.connections()[0];
        assert_eq!(b.address, "b:2");
        assert_eq!(b.bytes_in, 9);
    }

    #[test]
    fn failed_connections_fetch_keeps_previous_list() {
        let mut model = SyncModel::default();
        model.apply_full_refresh(refresh(Vec::new(), &[("A", stats("a:1", 1))]));
        let mut payload = refresh(Vec::new(), &[]);
        payload.connections = None;
        model.apply_full_refresh(payload);
        assert_eq!(model.connections().len(), 1);
    }

    #[test]
    fn daemon_errors_are_deduplicated() {
        let mut model = SyncModel::default();
        let error = DaemonError {
            when: "2024-01-01T00:00:01Z".to_string(),
            message: "disk full".to_string(),
        };
        for _ in 0..3 {
            let mut payload = refresh(Vec::new(), &[]);
            payload.errors = vec![error.clone(), error.clone()];
            model.apply_full_refresh(payload);
        }
        assert_eq!(model.errors().len(), 1);
    }

    #[test]
    fn daemon_error_with_bad_time_is_listed_once() {
        let mut model = SyncModel::default();
        let error = DaemonError {
            when: "garbage".to_string(),
            message: "disk full".to_string(),
        };
        for _ in 0..5 {
            let mut payload = refresh(Vec::new(), &[]);
            payload.errors = vec![error.clone()];
            model.apply_full_refresh(payload);
        }
        assert_eq!(model.errors().len(), 1);
        assert_eq!(model.errors()[0].message, "disk full");
    }

    #[test]
    fn error_list_is_capped_to_most_recent() {
        let mut model = SyncModel::new(3);
        for n in 0..5 {
            model.record_error(SyncError::now(format!("error {n}")));
        }
        let messages: Vec<_> = model.errors().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["error 2", "error 3", "error 4"]);
    }

    #[test]
    fn repeated_failures_are_coalesced() {
        let mut model = SyncModel::default();
        let err = TrackerError::HttpStatus {
            endpoint: "/rest/config".to_string(),
            status: 502,
        };
        assert!(model.record_failure(&err));
        assert!(!model.record_failure(&err));
        assert_eq!(model.errors().len(), 1);
    }

    #[test]
    fn interleaved_failures_are_each_listed_once() {
        let mut model = SyncModel::default();
        let refresh_failure = TrackerError::HttpStatus {
            endpoint: "/rest/system/status".to_string(),
            status: 502,
        };
        let events_failure = TrackerError::HttpStatus {
            endpoint: "/rest/events".to_string(),
            status: 502,
        };
        for _ in 0..4 {
            model.record_failure(&refresh_failure);
            model.record_failure(&events_failure);
        }
        assert_eq!(model.errors().len(), 2);
    }

    #[test]
    fn folder_summary_updates_counts() {
        let mut model = model_with_docs();
        let effect = model.apply_event(&event(
            1,
            EventKind::FolderSummary,
            json!({"folder": "docs", "summary": {"state": "syncing", "inSyncBytes": 50, "needBytes": 50}}),
        ));
        assert_eq!(effect, EventEffect::Changed);
        let docs = model.folder("docs").unwrap();
        assert!(!docs.idle);
        assert_eq!(docs.sync_percentage(), Some(50.0));
    }

    #[test]
    fn folder_completion_clears_idle_while_in_progress() {
        let mut model = model_with_docs();
        model.apply_event(&event(
            1,
            EventKind::FolderCompletion,
            json!({"folder": "docs", "device": "PEER", "completion": 90.0, "globalBytes": 100, "needBytes": 10}),
        ));
        let docs = model.folder("docs").unwrap();
        assert!(!docs.idle);
        assert_eq!(docs.in_sync_bytes, Some(90));
        assert_eq!(docs.out_of_sync_bytes, Some(10));
    }

    #[test]
    fn terminal_completion_leaves_idle_alone() {
        let mut model = model_with_docs();
        model.apply_event(&event(
            1,
            EventKind::FolderCompletion,
            json!({"folder": "docs", "completion": 100, "globalBytes": 100, "needBytes": 0}),
        ));
        let docs = model.folder("docs").unwrap();
        assert!(docs.idle);
        assert_eq!(docs.sync_percentage(), Some(100.0));
    }

    #[test]
    fn download_progress_keeps_folder_size() {
        let mut model = model_with_docs();
        model.apply_event(&event(
            1,
            EventKind::DownloadProgress,
            json!({"docs": {"a.bin": {"bytesTotal": 40, "bytesDone": 10}},
                   "unknown": {"b.bin": {"bytesTotal": 1, "bytesDone": 0}}}),
        ));
        let docs = model.folder("docs").unwrap();
        assert!(!docs.idle);
        assert_eq!(docs.out_of_sync_bytes, Some(30));
        assert_eq!(docs.folder_size(), Some(100));
    }

    #[test]
    fn device_connected_twice_keeps_one_entry_with_latest_address() {
        let mut model = SyncModel::default();
        model.apply_event(&event(
            1,
            EventKind::DeviceConnected,
            json!({"id": "PEER", "addr": "10.0.0.1:22000"}),
        ));
        model.apply_event(&event(
            2,
            EventKind::DeviceConnected,
            json!({"id": "PEER", "addr": "10.0.0.9:22000"}),
        ));
        assert_eq!(model.connections().len(), 1);
        assert_eq!(model.connections()[0].address, "10.0.0.9:22000");

        let effect = model.apply_event(&event(3, EventKind::DeviceDisconnected, json!({"id": "PEER"})));
        assert_eq!(effect, EventEffect::Changed);
        assert!(model.connections().is_empty());
    }

    #[test]
    fn folder_errors_are_recorded_once() {
        let mut model = model_with_docs();
        let errors = event(
            1,
            EventKind::FolderErrors,
            json!({"folder": "docs", "errors": [{"error": "permission denied", "path": "a.txt"}]}),
        );
        assert_eq!(model.apply_event(&errors), EventEffect::Changed);
        assert_eq!(model.apply_event(&errors), EventEffect::Unchanged);
        assert_eq!(model.errors().len(), 1);
        assert_eq!(model.errors()[0].message, "docs: a.txt: permission denied");
        assert_eq!(model.errors()[0].time, errors.time);
    }

    #[test]
    fn state_changed_and_item_started_drive_idle() {
        let mut model = model_with_docs();
        model.apply_event(&event(1, EventKind::ItemStarted, json!({"folder": "docs", "item": "a"})));
        assert!(!model.folder("docs").unwrap().idle);
        model.apply_event(&event(
            2,
            EventKind::StateChanged,
            json!({"folder": "docs", "from": "syncing", "to": "idle"}),
        ));
        assert!(model.folder("docs").unwrap().idle);
    }

    #[test]
    fn config_saved_requests_refresh() {
        let mut model = SyncModel::default();
        let mut payload = refresh(Vec::new(), &[]);
        payload.config_in_sync = Some(true);
        model.apply_full_refresh(payload);

        let effect = model.apply_event(&event(1, EventKind::ConfigSaved, json!({})));
        assert_eq!(effect, EventEffect::RefreshRequested);
        assert!(!model.config_in_sync());
    }

    #[test]
    fn unknown_and_informational_events_are_no_ops() {
        let mut model = model_with_docs();
        let before = model.clone();
        for kind in [
            EventKind::Unknown,
            EventKind::Ping,
            EventKind::DeviceDiscovered,
            EventKind::DeviceRejected,
            EventKind::FolderRejected,
        ] {
            assert_eq!(
                model.apply_event(&event(1, kind, json!({"folder": "docs", "id": "x"}))),
                EventEffect::Unchanged
            );
        }
        assert_eq!(model.folders(), before.folders());
        assert_eq!(model.connections(), before.connections());
    }

    #[test]
    fn index_updates_mark_loaded_trees_stale() {
        let mut model = model_with_docs();
        model.begin_tree_load("docs").unwrap();
        assert!(model.store_tree(FileTree::build("docs", &json!({"a": ["f", 1]}))));

        let effect = model.apply_event(&event(1, EventKind::RemoteIndexUpdated, json!({"folder": "docs"})));
        assert_eq!(effect, EventEffect::Changed);
        assert!(matches!(model.tree_state("docs"), Some(TreeEntry::Stale(_))));
        assert!(model.file_tree("docs").is_some());
    }

    #[test]
    fn trees_follow_folder_lifecycle() {
        let mut model = model_with_docs();
        assert!(matches!(
            model.begin_tree_load("nope"),
            Err(TrackerError::UnknownFolder(_))
        ));

        model.begin_tree_load("docs").unwrap();
        assert_eq!(model.tree_state("docs"), Some(&TreeEntry::Loading));
        model.abandon_tree_load("docs");
        assert_eq!(model.tree_state("docs"), None);

        model.begin_tree_load("docs").unwrap();
        model.store_tree(FileTree::build("docs", &json!({})));
        model.apply_full_refresh(refresh(vec![snapshot("photos", None)], &[]));
        assert_eq!(model.tree_state("docs"), None);
        assert!(!model.store_tree(FileTree::build("docs", &json!({}))));
    }
}
