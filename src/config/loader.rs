use std::env;
use std::path::Path;

use tokio::fs;
use tracing::{info, warn};

use crate::types::TrackerError;

use super::{paths, Config};

pub const API_URL_ENV: &str = "SYNCTHING_API_URL";
pub const API_KEY_ENV: &str = "SYNCTHING_API_KEY";

impl Config {
    /// Load configuration from config.json and the environment.
    /// Falls back to defaults if the file doesn't exist or can't be parsed
    pub async fn load() -> Self {
        let config_path = paths::get_config_path();
        let mut config = match Self::load_from(&config_path).await {
            Ok(config) => config,
            Err(err) => {
                warn!(error = %err, "Failed to load config.json, using defaults");
                Self::default()
            }
        };

        config.apply_env_overrides(
            env::var(API_URL_ENV).ok().as_deref(),
            env::var(API_KEY_ENV).ok().as_deref(),
        );
        config.resolve_api_key().await;

        if let Ok(client) = config.active() {
            info!(
                client = %client.name,
                url = %client.base_url,
                port = client.port,
                refresh = config.refresh_rate_secs,
                background_refresh = config.background_refresh_rate_secs,
                "Loaded configuration"
            );
        }
        config
    }

    pub async fn load_from(path: &Path) -> Result<Self, TrackerError> {
        if !fs::try_exists(path).await? {
            warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .await
            .map_err(|err| TrackerError::Config(format!("Failed to read config file: {err}")))?;

        let mut config: Config = serde_json::from_str(&contents)
            .map_err(|err| TrackerError::Config(format!("Failed to parse config.json: {err}")))?;
        config.normalize();
        Ok(config)
    }

    /// Environment values override the active client's URL and API key.
    pub fn apply_env_overrides(&mut self, api_url: Option<&str>, api_key: Option<&str>) {
        let active_name = match self.active() {
            Ok(client) => client.name.clone(),
            Err(_) => return,
        };
        let Some(client) = self.clients.iter_mut().find(|c| c.name == active_name) else {
            return;
        };

        if let Some(url) = api_url.map(str::trim).filter(|url| !url.is_empty()) {
            match reqwest::Url::parse(url) {
                Ok(parsed) => {
                    if let Some(port) = parsed.port_or_known_default() {
                        client.port = port;
                    }
                    client.base_url = url.to_string();
                }
                Err(_) => warn!(url = %url, "Ignoring invalid {API_URL_ENV}"),
            }
        }
        if let Some(key) = api_key.map(str::trim).filter(|key| !key.is_empty()) {
            client.api_key = key.to_string();
        }
    }

    /// Fills an empty API key of the active client from the local config.xml.
    async fn resolve_api_key(&mut self) {
        let Some(xml_path) = self.syncthing_config_xml_path() else {
            return;
        };
        let active_name = match self.active() {
            Ok(client) if client.api_key.is_empty() => client.name.clone(),
            _ => return,
        };

        match fs::read_to_string(&xml_path).await {
            Ok(contents) => match extract_api_key(&contents) {
                Some(key) => {
                    if let Some(client) = self.clients.iter_mut().find(|c| c.name == active_name) {
                        client.api_key = key;
                    }
                }
                None => warn!(path = %xml_path.display(), "No <apikey> in Syncthing config"),
            },
            Err(err) => warn!(path = %xml_path.display(), error = %err, "Failed to read Syncthing config"),
        }
    }
}

fn extract_api_key(contents: &str) -> Option<String> {
    let start_tag = "<apikey>";
    let end_tag = "</apikey>";
    let start = contents.find(start_tag)? + start_tag.len();
    let rest = &contents[start..];
    let end = rest.find(end_tag)?;
    let key = rest[..end].trim();
    (!key.is_empty()).then(|| key.to_string())
}
