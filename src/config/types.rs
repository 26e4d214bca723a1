use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::types::TrackerError;

/// Configuration for the Syncthing state tracker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_clients")]
    pub clients: Vec<ClientConfig>,

    /// Name of the client to track. The first client is used when unset.
    #[serde(default)]
    pub active_client: Option<String>,

    #[serde(default = "default_refresh_rate")]
    pub refresh_rate_secs: u64,

    #[serde(default = "default_background_refresh_rate")]
    pub background_refresh_rate_secs: u64,

    #[serde(default = "default_max_errors")]
    pub max_errors: usize,

    /// Local Syncthing config directory, used to read the API key from config.xml.
    #[serde(default)]
    pub syncthing_config_dir: Option<String>,
}

/// One remote Syncthing instance the tracker can connect to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    #[serde(default = "default_client_name")]
    pub name: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub api_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clients: default_clients(),
            active_client: None,
            refresh_rate_secs: default_refresh_rate(),
            background_refresh_rate_secs: default_background_refresh_rate(),
            max_errors: default_max_errors(),
            syncthing_config_dir: None,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: default_client_name(),
            base_url: default_base_url(),
            port: default_port(),
            api_key: String::new(),
        }
    }
}

fn default_clients() -> Vec<ClientConfig> {
    vec![ClientConfig::default()]
}

fn default_client_name() -> String {
    "Local Syncthing".to_string()
}

fn default_base_url() -> String {
    "http://localhost".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_refresh_rate() -> u64 {
    1
}

fn default_background_refresh_rate() -> u64 {
    20
}

fn default_max_errors() -> usize {
    100
}

impl Config {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_rate_secs.max(1))
    }

    pub fn background_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.background_refresh_rate_secs.max(1))
    }

    /// The client selected by `active_client`, falling back to the first one.
    pub fn active(&self) -> Result<&ClientConfig, TrackerError> {
        match &self.active_client {
            Some(name) => self.client(name),
            None => self
                .clients
                .first()
                .ok_or_else(|| TrackerError::Config("No Syncthing client configured".to_string())),
        }
    }

    pub fn client(&self, name: &str) -> Result<&ClientConfig, TrackerError> {
        self.clients
            .iter()
            .find(|client| client.name == name)
            .ok_or_else(|| TrackerError::UnknownClient(name.to_string()))
    }

    /// Repairs values a hand-edited config.json may get wrong.
    pub(super) fn normalize(&mut self) {
        if self.clients.is_empty() {
            self.clients = default_clients();
        }
        self.refresh_rate_secs = self.refresh_rate_secs.max(1);
        self.background_refresh_rate_secs = self.background_refresh_rate_secs.max(1);
        self.max_errors = self.max_errors.max(1);
    }
}

impl ClientConfig {
    /// Base URL with the configured port applied.
    pub fn endpoint(&self) -> Result<Url, TrackerError> {
        let mut url = Url::parse(self.base_url.trim())
            .map_err(|_| TrackerError::InvalidUrl(self.base_url.clone()))?;
        url.set_port(Some(self.port))
            .map_err(|_| TrackerError::InvalidUrl(self.base_url.clone()))?;
        Ok(url)
    }
}
