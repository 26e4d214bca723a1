use std::env;
use std::path::PathBuf;

use tracing::{debug, warn};

use super::Config;

pub const CONFIG_PATH_ENV: &str = "SYNCTHING_TRACKER_CONFIG";

impl Config {
    /// Get the full path to the local Syncthing config XML file, if a config dir is set
    pub fn syncthing_config_xml_path(&self) -> Option<PathBuf> {
        self.syncthing_config_dir
            .as_deref()
            .map(str::trim)
            .filter(|dir| !dir.is_empty())
            .map(|dir| PathBuf::from(dir.trim_end_matches('/')).join("config.xml"))
    }
}

/// Get the path to the config.json file
/// An explicit env override wins, then the app directory (parent of the binary's folder)
pub(super) fn get_config_path() -> PathBuf {
    if let Ok(custom) = env::var(CONFIG_PATH_ENV) {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            debug!(path = %trimmed, "Config path taken from environment");
            return PathBuf::from(trimmed);
        }
    }

    // Executable is at: app_root/bin/syncthing-tracker
    // Config should be at: app_root/config.json
    if let Ok(exe_path) = env::current_exe() {
        debug!(path = %exe_path.display(), "Executable path detected");

        if let Some(app_root) = exe_path.parent().and_then(|bin_dir| bin_dir.parent()) {
            let config_path = app_root.join("config.json");
            debug!(path = %config_path.display(), "Looking for config");
            return config_path;
        }
    }

    warn!("Using fallback: looking for config.json in current directory");
    PathBuf::from("config.json")
}
