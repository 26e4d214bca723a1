use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::types::TrackerError;

use super::api::{BrowseQuery, EventsQuery, FolderQuery, FullRefresh, RawEvent};
use super::core::{DataAggregator, HttpClient};
use super::models::Event;

/// Extra time granted on top of a long poll's server-side timeout.
const LONG_POLL_GRACE: Duration = Duration::from_secs(5);

/// The remote operations the tracker needs from a Syncthing daemon.
#[async_trait]
pub trait SyncthingApi: Send + Sync {
    /// Fetch an authoritative snapshot of status, folders, connections and errors.
    async fn full_refresh(&self) -> Result<FullRefresh, TrackerError>;

    /// Events with an id greater than `since`, oldest first.
    /// A non-zero `timeout` lets the daemon hold the request until events arrive.
    async fn events_since(
        &self,
        since: u64,
        limit: Option<u32>,
        timeout: Duration,
    ) -> Result<Vec<Event>, TrackerError>;

    /// The nested size manifest of one folder.
    async fn browse(&self, folder_id: &str) -> Result<Value, TrackerError>;

    /// Ask the daemon to rescan a folder.
    async fn rescan(&self, folder_id: &str) -> Result<(), TrackerError>;
}

#[derive(Clone)]
pub struct SyncthingClient {
    http: HttpClient,
}

impl SyncthingClient {
    pub fn new(client: &ClientConfig) -> Result<Self, TrackerError> {
        Ok(Self {
            http: HttpClient::new(client.endpoint()?, client.api_key.clone())?,
        })
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }
}

#[async_trait]
impl SyncthingApi for SyncthingClient {
    async fn full_refresh(&self) -> Result<FullRefresh, TrackerError> {
        DataAggregator::new(&self.http).compose_refresh().await
    }

    async fn events_since(
        &self,
        since: u64,
        limit: Option<u32>,
        timeout: Duration,
    ) -> Result<Vec<Event>, TrackerError> {
        let timeout_secs = timeout.as_secs();
        let query = EventsQuery {
            since,
            limit,
            timeout: (timeout_secs > 0).then_some(timeout_secs),
        };
        let events: Vec<RawEvent> = self
            .http
            .get_json_with_timeout("/rest/events", &query, timeout + LONG_POLL_GRACE)
            .await?;
        Ok(events.into_iter().map(Event::from).collect())
    }

    async fn browse(&self, folder_id: &str) -> Result<Value, TrackerError> {
        let query = BrowseQuery {
            folder: folder_id,
            levels: None,
        };
        self.http.fetch("/rest/db/browse", &query).await
    }

    async fn rescan(&self, folder_id: &str) -> Result<(), TrackerError> {
        let query = FolderQuery { folder: folder_id };
        self.http.post("/rest/db/scan", &query).await
    }
}
