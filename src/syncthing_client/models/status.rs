use std::collections::BTreeMap;

use crate::syncthing_client::api::SystemStatusResponse;

/// Daemon process metrics from one status fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemStatus {
    pub alloc: u64,
    pub sys: u64,
    pub cpu_percent: f64,
    pub goroutines: u64,
    pub ext_announce_ok: BTreeMap<String, bool>,
    pub my_id: String,
    pub tilde: String,
    pub path_separator: String,
    pub started_at: Option<String>,
    pub uptime_seconds: Option<u64>,
}

impl From<SystemStatusResponse> for SystemStatus {
    fn from(value: SystemStatusResponse) -> Self {
        Self {
            alloc: value.alloc,
            sys: value.sys,
            cpu_percent: value.cpu_percent,
            goroutines: value.goroutines,
            ext_announce_ok: value.ext_announce_ok.unwrap_or_default(),
            my_id: value.my_id,
            tilde: value.tilde,
            path_separator: value.path_separator.unwrap_or_else(|| "/".to_string()),
            started_at: value.start_time,
            uptime_seconds: value.uptime,
        }
    }
}

impl SystemStatus {
    /// Number of announce servers currently reachable.
    pub fn announce_reachable(&self) -> usize {
        self.ext_announce_ok.values().filter(|ok| **ok).count()
    }
}
