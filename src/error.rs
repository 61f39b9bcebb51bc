//! Error types for the engine's fallible seams.
//!
//! The reconciliation core itself is total: missing fields become documented
//! defaults, contradictory signals are resolved by precedence, and dangling
//! references are dropped. The only operations that can fail are cache file
//! I/O and config loading, and both degrade gracefully at the call site.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the identity cache and config loader.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to read cache file {path}: {source}")]
    CacheRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse cache file {path}: {source}")]
    CacheParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to write cache file {path}: {source}")]
    CacheWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize cache state: {0}")]
    CacheSerialize(#[from] serde_json::Error),

    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl EngineError {
    /// Returns true if the condition leaves the engine fully usable
    /// (an absent or unreadable cache just means cold lookups).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::CacheRead { .. }
                | EngineError::CacheParse { .. }
                | EngineError::ConfigRead { .. }
                | EngineError::ConfigParse { .. }
        )
    }
}
