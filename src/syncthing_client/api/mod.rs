mod queries;
mod responses;
mod types;

pub use queries::{BrowseQuery, EventsQuery, FolderQuery};
pub use responses::{FolderSnapshot, FullRefresh};
pub use types::{
    ConnectionStats, ConnectionsResponse, DaemonError, DaemonErrorsResponse,
    FolderConfig, FolderDevice, FolderStatus, RawEvent, RestartRequired, SyncthingConfig,
    SystemStatusResponse, UpgradeResponse,
};
