use std::path::PathBuf;

use crate::syncthing_client::api::{FolderConfig, FolderStatus};
use crate::syncthing_client::helpers::expand_tilde;

/// A synchronized folder as tracked by the model.
///
/// The id is also the key of the model's folder map; it is kept here so a
/// folder can be handed to a presentation layer on its own.
#[derive(Debug, Clone)]
pub struct Folder {
    pub id: String,
    pub label: Option<String>,
    pub path: PathBuf,
    pub devices: Vec<String>,
    pub paused: bool,
    pub idle: bool,
    pub in_sync_bytes: Option<u64>,
    pub out_of_sync_bytes: Option<u64>,
}

impl PartialEq for Folder {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.path == other.path
    }
}

impl Eq for Folder {}

impl Folder {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>, devices: Vec<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            path: path.into(),
            devices,
            paused: false,
            idle: false,
            in_sync_bytes: None,
            out_of_sync_bytes: None,
        }
    }

    /// Builds a folder from its configuration; sync state starts unknown.
    pub fn from_config(config: &FolderConfig, home: Option<&str>) -> Self {
        let mut folder = Self::new(
            config.id.clone(),
            expand_tilde(&config.path, home),
            config
                .devices
                .iter()
                .map(|device| device.device_id.clone())
                .filter(|id| !id.is_empty())
                .collect(),
        );
        folder.label = config.label.clone().filter(|label| !label.is_empty());
        folder.paused = config.paused.unwrap_or(false);
        folder
    }

    pub fn apply_status(&mut self, status: &FolderStatus) {
        self.idle = status.is_idle();
        self.in_sync_bytes = status.in_sync_bytes;
        self.out_of_sync_bytes = status.need_bytes;
    }

    /// Copies sync state the latest payload did not report.
    pub fn inherit_sync_state(&mut self, previous: &Folder) {
        self.idle = previous.idle;
        self.in_sync_bytes = previous.in_sync_bytes;
        self.out_of_sync_bytes = previous.out_of_sync_bytes;
    }

    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }

    pub fn folder_size(&self) -> Option<u64> {
        match (self.in_sync_bytes, self.out_of_sync_bytes) {
            (Some(in_sync), Some(out_of_sync)) => Some(in_sync.saturating_add(out_of_sync)),
            _ => None,
        }
    }

    pub fn sync_ratio(&self) -> Option<f64> {
        let in_sync = self.in_sync_bytes?;
        match self.folder_size()? {
            0 => None,
            size => Some(in_sync as f64 / size as f64),
        }
    }

    /// `None` means unknown, which is not the same as 0%.
    pub fn sync_percentage(&self) -> Option<f64> {
        self.sync_ratio().map(|ratio| ratio * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syncthing_client::api::FolderDevice;

    fn with_bytes(in_sync: Option<u64>, out_of_sync: Option<u64>) -> Folder {
        let mut folder = Folder::new("docs", "/data/docs", Vec::new());
        folder.in_sync_bytes = in_sync;
        folder.out_of_sync_bytes = out_of_sync;
        folder
    }

    #[test]
    fn metrics_for_known_counts() {
        let folder = with_bytes(Some(80), Some(20));
        assert_eq!(folder.folder_size(), Some(100));
        assert_eq!(folder.sync_ratio(), Some(0.8));
        assert_eq!(folder.sync_percentage(), Some(80.0));
    }

    #[test]
    fn metrics_undefined_when_a_count_is_missing() {
        for folder in [
            with_bytes(None, Some(20)),
            with_bytes(Some(80), None),
            with_bytes(None, None),
        ] {
            assert_eq!(folder.folder_size(), None);
            assert_eq!(folder.sync_ratio(), None);
            assert_eq!(folder.sync_percentage(), None);
        }
    }

    #[test]
    fn empty_folder_has_no_percentage() {
        let folder = with_bytes(Some(0), Some(0));
        assert_eq!(folder.folder_size(), Some(0));
        assert_eq!(folder.sync_percentage(), None);
    }

    #[test]
    fn fully_out_of_sync_is_zero_percent() {
        assert_eq!(with_bytes(Some(0), Some(50)).sync_percentage(), Some(0.0));
    }

    #[test]
    fn equality_ignores_sync_state() {
        let a = with_bytes(Some(1), Some(2));
        let mut b = with_bytes(None, None);
        b.idle = true;
        assert_eq!(a, b);

        let c = Folder::new("docs", "/elsewhere", Vec::new());
        assert_ne!(a, c);
    }

    #[test]
    fn from_config_expands_home_and_skips_blank_devices() {
        let config = FolderConfig {
            id: "photos".to_string(),
            label: Some(String::new()),
            path: "~/Photos".to_string(),
            paused: None,
            devices: vec![
                FolderDevice {
                    device_id: "PEER-A".to_string(),
                },
                FolderDevice {
                    device_id: String::new(),
                },
            ],
        };
        let folder = Folder::from_config(&config, Some("/home/me"));
        assert_eq!(folder.path, PathBuf::from("/home/me/Photos"));
        assert_eq!(folder.devices, vec!["PEER-A".to_string()]);
        assert_eq!(folder.label, None);
        assert_eq!(folder.display_name(), "photos");
        assert_eq!(folder.sync_percentage(), None);
    }
}
