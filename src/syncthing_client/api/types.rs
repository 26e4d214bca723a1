use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// `/rest/system/status`
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SystemStatusResponse {
    #[serde(default)]
    pub alloc: u64,
    #[serde(default)]
    pub sys: u64,
    #[serde(default, rename = "cpuPercent")]
    pub cpu_percent: f64,
    #[serde(default)]
    pub goroutines: u64,
    #[serde(default, rename = "extAnnounceOK")]
    pub ext_announce_ok: Option<BTreeMap<String, bool>>,
    #[serde(rename = "myID")]
    pub my_id: String,
    #[serde(default)]
    pub tilde: String,
    #[serde(default, rename = "pathSeparator")]
    pub path_separator: Option<String>,
    #[serde(default, rename = "startTime")]
    pub start_time: Option<String>,
    #[serde(default)]
    pub uptime: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SyncthingConfig {
    #[serde(default)]
    pub folders: Vec<FolderConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FolderConfig {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub paused: Option<bool>,
    #[serde(default)]
    pub devices: Vec<FolderDevice>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FolderDevice {
    #[serde(rename = "deviceID")]
    pub device_id: String,
}

/// `/rest/db/status?folder=`
#[derive(Debug, Deserialize, Clone, Default)]
pub struct FolderStatus {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default, rename = "inSyncBytes")]
    pub in_sync_bytes: Option<u64>,
    #[serde(default, rename = "needBytes")]
    pub need_bytes: Option<u64>,
    #[serde(default, rename = "globalBytes")]
    pub global_bytes: Option<u64>,
}

impl FolderStatus {
    pub fn is_idle(&self) -> bool {
        self.state
            .as_deref()
            .map(|state| state.eq_ignore_ascii_case("idle"))
            .unwrap_or(false)
    }
}

/// `/rest/system/connections`
#[derive(Debug, Deserialize, Default)]
pub struct ConnectionsResponse {
    #[serde(default)]
    pub connections: HashMap<String, ConnectionStats>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConnectionStats {
    #[serde(default = "connected_by_default")]
    pub connected: bool,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, rename = "inBytesTotal")]
    pub in_bytes_total: u64,
    #[serde(default, rename = "outBytesTotal")]
    pub out_bytes_total: u64,
}

// Older daemons only list live connections and omit the flag.
fn connected_by_default() -> bool {
    true
}

/// `/rest/system/error`
#[derive(Debug, Deserialize, Default)]
pub struct DaemonErrorsResponse {
    #[serde(default)]
    pub errors: Option<Vec<DaemonError>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DaemonError {
    pub when: String,
    pub message: String,
}

/// `/rest/config/restart-required`
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct RestartRequired {
    #[serde(rename = "requiresRestart")]
    pub requires_restart: bool,
}

/// `/rest/system/upgrade`
#[derive(Debug, Deserialize, Clone)]
pub struct UpgradeResponse {
    #[serde(default)]
    pub running: String,
    #[serde(default)]
    pub latest: String,
    #[serde(default)]
    pub newer: Option<bool>,
}

impl UpgradeResponse {
    /// The version to upgrade to, or `None` when the daemon is up to date.
    pub fn available_version(&self) -> Option<String> {
        let newer = match self.newer {
            Some(flag) => flag,
            None => match (parse_version(&self.running), parse_version(&self.latest)) {
                (Some(running), Some(latest)) => latest > running,
                _ => false,
            },
        };
        (newer && !self.latest.is_empty()).then(|| self.latest.clone())
    }
}

fn parse_version(raw: &str) -> Option<semver::Version> {
    semver::Version::parse(raw.trim().trim_start_matches('v')).ok()
}

/// One entry of `/rest/events`, before classification.
#[derive(Debug, Deserialize, Clone)]
pub struct RawEvent {
    pub id: u64,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub data: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upgrade(running: &str, latest: &str, newer: Option<bool>) -> UpgradeResponse {
        UpgradeResponse {
            running: running.to_string(),
            latest: latest.to_string(),
            newer,
        }
    }

    #[test]
    fn upgrade_flag_wins_over_versions() {
        assert_eq!(
            upgrade("v1.27.0", "v1.27.0", Some(true)).available_version(),
            Some("v1.27.0".to_string())
        );
        assert_eq!(upgrade("v1.0.0", "v2.0.0", Some(false)).available_version(), None);
    }

    #[test]
    fn upgrade_falls_back_to_semver() {
        assert_eq!(
            upgrade("v1.26.1", "v1.27.0", None).available_version(),
            Some("v1.27.0".to_string())
        );
        assert_eq!(upgrade("v1.27.0", "v1.26.1", None).available_version(), None);
        assert_eq!(upgrade("dev", "v1.27.0", None).available_version(), None);
    }

    #[test]
    fn connection_without_flag_counts_as_connected() {
        let stats: ConnectionStats =
            serde_json::from_str(r#"{"address": "10.0.0.1:22000", "inBytesTotal": 5}"#).unwrap();
        assert!(stats.connected);
        assert_eq!(stats.in_bytes_total, 5);
        assert_eq!(stats.out_bytes_total, 0);
    }

    #[test]
    fn null_error_list_decodes() {
        let errors: DaemonErrorsResponse = serde_json::from_str(r#"{"errors": null}"#).unwrap();
        assert!(errors.errors.is_none());
    }
}
