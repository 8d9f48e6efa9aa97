//! Error types for the simulation boundaries.
//!
//! Nothing inside a tick returns these; they surface only when loading
//! configuration or serializing state for an outside consumer.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors raised at the edges of the simulation core.
#[derive(Debug, Error)]
pub enum SimError {
    /// A settings file could not be read.
    #[error("Failed to read settings file '{path}': {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Settings JSON was malformed.
    #[error("Failed to parse settings: {0}")]
    ConfigParse(#[source] serde_json::Error),

    /// A type key that does not name any entity type.
    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    /// Snapshot serialization failed.
    #[error("Failed to serialize snapshot: {0}")]
    Serialization(#[from] serde_json::Error),
}
