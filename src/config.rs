//! Engine configuration loaded from `~/.intake-engine/config.json`.
//!
//! Everything has a sensible default; a missing or malformed file falls
//! back to `EngineConfig::default()` with a warning, never an error to
//! the caller.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Configuration for the reconciliation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Canonical areas of work. Anything outside this list (or empty)
    /// matches the "other/unsure" filter sentinel.
    #[serde(default = "default_known_areas")]
    pub known_areas: Vec<String>,
    /// Identity-resolver cache file. `None` means the per-user default
    /// under the OS data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<PathBuf>,
}

fn default_known_areas() -> Vec<String> {
    ["commercial", "construction", "property", "employment"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            known_areas: default_known_areas(),
            cache_path: None,
        }
    }
}

impl EngineConfig {
    /// Load config from a JSON file.
    pub fn load_from(path: &Path) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path).map_err(|e| EngineError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| EngineError::ConfigParse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load config from the default location, falling back to defaults
    /// when the file is absent or unreadable.
    pub fn load_or_default() -> Self {
        let path = default_config_path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                log::warn!("Config load failed, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Resolved identity-cache path: explicit override, else the per-user
    /// default.
    pub fn resolved_cache_path(&self) -> PathBuf {
        self.cache_path.clone().unwrap_or_else(default_cache_path)
    }

    /// True if `area` is one of the configured canonical areas
    /// (case-insensitive).
    pub fn is_known_area(&self, area: &str) -> bool {
        self.known_areas
            .iter()
            .any(|k| k.eq_ignore_ascii_case(area.trim()))
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".intake-engine")
}

/// Default config file location.
pub fn default_config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Default identity-cache file location.
pub fn default_cache_path() -> PathBuf {
    config_dir().join("name-cache.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = EngineConfig::default();
        assert!(cfg.is_known_area("Commercial"));
        assert!(cfg.is_known_area(" property "));
        assert!(!cfg.is_known_area("crime"));
        assert!(!cfg.is_known_area(""));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"knownAreas": ["adjudication"]}"#).unwrap();
        let cfg = EngineConfig::load_from(&path).unwrap();
        assert!(cfg.is_known_area("adjudication"));
        assert!(!cfg.is_known_area("commercial"));
    }

    #[test]
    fn test_load_from_malformed_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();
        let err = EngineConfig::load_from(&path).unwrap_err();
        assert!(err.is_recoverable());
    }
}
