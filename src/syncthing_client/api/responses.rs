use crate::syncthing_client::api::{
    ConnectionsResponse, DaemonError, FolderConfig, FolderStatus, SystemStatusResponse,
    UpgradeResponse,
};

/// Everything one full refresh fetched, decoded but not yet applied.
///
/// `None` marks an optional part whose fetch failed; the model keeps its
/// previous value for it instead of resetting.
#[derive(Debug, Default)]
pub struct FullRefresh {
    pub status: SystemStatusResponse,
    pub folders: Vec<FolderSnapshot>,
    pub connections: Option<ConnectionsResponse>,
    pub errors: Vec<DaemonError>,
    pub config_in_sync: Option<bool>,
    pub upgrade: Option<UpgradeResponse>,
}

/// A configured folder together with its status, when that could be fetched.
#[derive(Debug, Clone)]
pub struct FolderSnapshot {
    pub config: FolderConfig,
    pub status: Option<FolderStatus>,
}
