// ============================================================================
// KeyValueCache — TTL-bound persisted store (redb)
// ============================================================================
// Each key holds a JSON `{ payload, storedAtEpochMs }` record. Entries older
// than CACHE_DURATION, missing, or undecodable are all reported as misses;
// reads never fail.
// ============================================================================

pub mod types;

pub use types::{CacheEntry, CacheKeyStat, CacheStats};

use anyhow::{anyhow, Result};
use redb::{Database, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{now_ms, CACHE_DURATION};
use types::StoredValue;

const ENTRIES: TableDefinition<&str, &[u8]> = TableDefinition::new("cache_entries");

/// Persisted key-value cache with a fixed time-to-live
pub struct KeyValueCache {
    db: Database,
    path: PathBuf,
    ttl: Duration,
}

impl KeyValueCache {
    /// Open (or create) the cache database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        info!("Opening cache at: {}", path.display());

        let db = Database::create(&path).map_err(|e| anyhow!("Failed to open cache: {}", e))?;

        // Ensure the table exists so readers never see a missing table
        let write_txn = db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let _ = write_txn
                .open_table(ENTRIES)
                .map_err(|e| anyhow!("Failed to create cache table: {}", e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit init: {}", e))?;

        Ok(Self {
            db,
            path,
            ttl: CACHE_DURATION,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_fresh(&self, stored_at_ms: i64, now_ms: i64) -> bool {
        now_ms - stored_at_ms < self.ttl.as_millis() as i64
    }

    fn load_raw(&self, key: &str) -> Option<Vec<u8>> {
        let read_txn = match self.db.begin_read() {
            Ok(txn) => txn,
            Err(e) => {
                warn!("Cache read for {} failed to begin: {}", key, e);
                return None;
            }
        };
        let table = match read_txn.open_table(ENTRIES) {
            Ok(table) => table,
            Err(e) => {
                warn!("Cache table unavailable: {}", e);
                return None;
            }
        };

        match table.get(key) {
            Ok(Some(value)) => Some(value.value().to_vec()),
            Ok(None) => None,
            Err(e) => {
                warn!("Cache read for {} failed: {}", key, e);
                None
            }
        }
    }

    fn load_stored(&self, key: &str) -> Option<StoredValue> {
        let bytes = self.load_raw(key)?;
        match serde_json::from_slice::<StoredValue>(&bytes) {
            Ok(stored) => Some(stored),
            Err(e) => {
                debug!("Malformed cache entry {}: {} - treating as miss", key, e);
                None
            }
        }
    }

    /// Raw entry regardless of age
    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        self.load_stored(key).map(|stored| CacheEntry {
            key: key.to_string(),
            payload: stored.payload,
            stored_at_epoch_ms: stored.stored_at_epoch_ms,
        })
    }

    pub fn is_valid(&self, key: &str) -> bool {
        self.is_valid_at(key, now_ms())
    }

    /// Whether `key` holds a decodable entry younger than the TTL at `now_ms`
    pub fn is_valid_at(&self, key: &str, now_ms: i64) -> bool {
        self.load_stored(key)
            .map(|stored| self.is_fresh(stored.stored_at_epoch_ms, now_ms))
            .unwrap_or(false)
    }

    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.read_at(key, now_ms())
    }

    /// Fresh payload for `key`, or None on miss, staleness, or decode failure
    pub fn read_at<T: DeserializeOwned>(&self, key: &str, now_ms: i64) -> Option<T> {
        let stored = self.load_stored(key)?;
        if !self.is_fresh(stored.stored_at_epoch_ms, now_ms) {
            debug!("Cache entry {} is stale", key);
            return None;
        }

        match serde_json::from_value(stored.payload) {
            Ok(payload) => Some(payload),
            Err(e) => {
                debug!("Cache entry {} has unexpected shape: {} - treating as miss", key, e);
                None
            }
        }
    }

    pub fn write<T: Serialize>(&self, key: &str, payload: &T) -> Result<()> {
        let value = serde_json::to_value(payload)
            .map_err(|e| anyhow!("Failed to serialize cache payload {}: {}", key, e))?;
        self.write_batch(&[(key, value)], now_ms())
    }

    /// Store several entries in one transaction, all stamped with `stored_at_ms`
    pub fn write_batch(&self, entries: &[(&str, serde_json::Value)], stored_at_ms: i64) -> Result<()> {
        let mut encoded = Vec::with_capacity(entries.len());
        for (key, payload) in entries {
            let stored = StoredValue {
                payload: payload.clone(),
                stored_at_epoch_ms: stored_at_ms,
            };
            let bytes = serde_json::to_vec(&stored)
                .map_err(|e| anyhow!("Failed to serialize cache entry {}: {}", key, e))?;
            encoded.push((*key, bytes));
        }

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut table = write_txn
                .open_table(ENTRIES)
                .map_err(|e| anyhow!("Failed to open cache table: {}", e))?;
            for (key, bytes) in &encoded {
                table
                    .insert(*key, bytes.as_slice())
                    .map_err(|e| anyhow!("Failed to insert cache entry {}: {}", key, e))?;
            }
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        debug!("Stored {} cache entries", encoded.len());
        Ok(())
    }

    /// Delete `keys` in one transaction; returns how many existed
    pub fn clear(&self, keys: &[&str]) -> Result<usize> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        let mut removed = 0;
        {
            let mut table = write_txn
                .open_table(ENTRIES)
                .map_err(|e| anyhow!("Failed to open cache table: {}", e))?;
            for key in keys {
                if table
                    .remove(*key)
                    .map_err(|e| anyhow!("Failed to remove cache entry {}: {}", key, e))?
                    .is_some()
                {
                    removed += 1;
                }
            }
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit delete: {}", e))?;

        if removed > 0 {
            debug!("Cleared {} cache entries", removed);
        }
        Ok(removed)
    }

    /// Force `keys` to be treated as expired
    pub fn expire(&self, keys: &[&str]) -> Result<usize> {
        self.clear(keys)
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let now = now_ms();
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn
            .open_table(ENTRIES)
            .map_err(|e| anyhow!("Failed to open cache table: {}", e))?;

        let mut keys = Vec::new();
        let iter = table
            .range::<&str>(..)
            .map_err(|e| anyhow!("Failed to iterate cache: {}", e))?;
        for entry in iter {
            let (key, value) = entry.map_err(|e| anyhow!("Failed to read entry: {}", e))?;
            let stored_at = serde_json::from_slice::<StoredValue>(value.value())
                .ok()
                .map(|s| s.stored_at_epoch_ms);
            keys.push(CacheKeyStat {
                key: key.value().to_string(),
                age_ms: stored_at.map(|t| now - t),
                valid: stored_at.map(|t| self.is_fresh(t, now)).unwrap_or(false),
            });
        }

        Ok(CacheStats {
            total_entries: keys.len(),
            valid_entries: keys.iter().filter(|k| k.valid).count(),
            keys,
        })
    }
}
