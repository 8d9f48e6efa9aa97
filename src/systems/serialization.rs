//! Serialization utilities for render snapshots.

use crate::error::Result;
use crate::world::RenderSnapshot;

/// Serialize a snapshot to JSON bytes.
pub fn snapshot_to_json(snapshot: &RenderSnapshot) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(snapshot)?)
}

/// Serialize a snapshot to a JSON string.
pub fn snapshot_to_json_string(snapshot: &RenderSnapshot) -> Result<String> {
    Ok(serde_json::to_string(snapshot)?)
}

/// Deserialize a snapshot from JSON bytes.
pub fn snapshot_from_json(data: &[u8]) -> Result<RenderSnapshot> {
    Ok(serde_json::from_slice(data)?)
}

/// Deserialize a snapshot from a JSON string.
pub fn snapshot_from_json_string(data: &str) -> Result<RenderSnapshot> {
    Ok(serde_json::from_str(data)?)
}
