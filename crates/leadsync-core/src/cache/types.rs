//! ============================================================================
//! Cache Types - Serializable records for redb storage
//! ============================================================================

use serde::{Deserialize, Serialize};

/// A named payload with the moment it was stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    pub payload: serde_json::Value,
    pub stored_at_epoch_ms: i64,
}

/// On-disk value layout; the key lives in the table key
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoredValue {
    pub payload: serde_json::Value,
    pub stored_at_epoch_ms: i64,
}

/// Per-key age report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheKeyStat {
    pub key: String,
    /// None when the stored bytes could not be decoded
    pub age_ms: Option<i64>,
    pub valid: bool,
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub keys: Vec<CacheKeyStat>,
}
