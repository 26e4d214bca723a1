use tracing::{debug, warn};

use crate::types::TrackerError;

use super::super::api::{
    ConnectionsResponse, DaemonErrorsResponse, FolderQuery, FolderSnapshot, FolderStatus,
    FullRefresh, RestartRequired, SyncthingConfig, SystemStatusResponse, UpgradeResponse,
};
use super::http::HttpClient;

/// Gathers one full-refresh snapshot from the Syncthing REST endpoints.
///
/// System status and configuration are required; everything else is
/// fetched best-effort and left as `None` when it fails.
pub struct DataAggregator<'a> {
    http: &'a HttpClient,
}

impl<'a> DataAggregator<'a> {
    pub fn new(http: &'a HttpClient) -> Self {
        Self { http }
    }

    pub async fn compose_refresh(&self) -> Result<FullRefresh, TrackerError> {
        let status: SystemStatusResponse = self.http.get_json("/rest/system/status").await?;
        let config: SyncthingConfig = self.http.get_json("/rest/config").await?;

        let mut folders = Vec::with_capacity(config.folders.len());
        for folder in config.folders {
            let status = self.fetch_folder_status(&folder.id).await;
            folders.push(FolderSnapshot {
                config: folder,
                status,
            });
        }

        let connections = match self
            .http
            .get_json::<ConnectionsResponse>("/rest/system/connections")
            .await
        {
            Ok(data) => Some(data),
            Err(err) => {
                warn!(error = %err, "Failed to fetch peer connections");
                None
            }
        };

        let errors = match self
            .http
            .get_json::<DaemonErrorsResponse>("/rest/system/error")
            .await
        {
            Ok(data) => data.errors.unwrap_or_default(),
            Err(err) => {
                warn!(error = %err, "Failed to fetch daemon errors");
                Vec::new()
            }
        };

        let config_in_sync = match self
            .http
            .get_json::<RestartRequired>("/rest/config/restart-required")
            .await
        {
            Ok(data) => Some(!data.requires_restart),
            Err(err) => {
                warn!(error = %err, "Failed to fetch config sync state");
                None
            }
        };

        // Fails with 500 when upgrades are disabled on the daemon.
        let upgrade = match self
            .http
            .get_json::<UpgradeResponse>("/rest/system/upgrade")
            .await
        {
            Ok(data) => Some(data),
            Err(err) => {
                debug!(error = %err, "Upgrade check unavailable");
                None
            }
        };

        Ok(FullRefresh {
            status,
            folders,
            connections,
            errors,
            config_in_sync,
            upgrade,
        })
    }

    async fn fetch_folder_status(&self, folder_id: &str) -> Option<FolderStatus> {
        let query = FolderQuery { folder: folder_id };
        match self.http.get_json_with_query("/rest/db/status", &query).await {
            Ok(status) => Some(status),
            Err(err) => {
                warn!(folder = %folder_id, error = %err, "Failed to fetch folder status");
                None
            }
        }
    }
}
