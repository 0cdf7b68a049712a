//! Configuration file discovery
//!
//! Finds and loads the configuration file from standard locations.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::AppConfig;

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./netcheck.yaml",
    "./netcheck.yml",
    "./netcheck.json",
    "./.netcheck.yaml",
    "~/.config/netcheck/config.yaml",
    "~/.netcheck.yaml",
];

/// First existing file among the standard locations
pub fn find_config() -> Option<PathBuf> {
    CONFIG_LOCATIONS
        .iter()
        .map(|location| expand_path(location))
        .find(|path| path.exists())
}

/// Load an explicit file, else a discovered one, else defaults
pub fn load_or_default(explicit: Option<&str>) -> Result<AppConfig> {
    let path = match explicit {
        Some(path) => Some(expand_path(path)),
        None => find_config(),
    };

    match path {
        Some(path) => {
            debug!("Loading config from {}", path.display());
            AppConfig::load(&path)
        }
        None => Ok(AppConfig::default()),
    }
}

/// Expand ~ to home directory
pub(crate) fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Check if file is YAML based on extension
pub(crate) fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}
