//! ============================================================================
//! Sync Configuration - Endpoints, cache location, and fixed timing constants
//! ============================================================================
//! Runtime settings come from environment variables (a `.env` file is loaded
//! by the binary). Timing constants are fixed and not externally tunable.
//! ============================================================================

use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Lifetime of a cache generation (5 minutes)
pub const CACHE_DURATION: Duration = Duration::from_secs(5 * 60);

/// Auto-refresh polling tick (60 seconds)
pub const AUTO_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Page size requested for aggregate and per-status lead queries
pub const BULK_PAGE_SIZE: u32 = 10_000;

/// Maximum number of leads a single agent is expected to carry
pub const AGENT_CAPACITY: u32 = 50;

/// Role team members must hold to be offered as assignees
pub const DEFAULT_TARGET_ROLE: &str = "marketing";

const DEFAULT_API_URL: &str = "http://localhost:5000/api";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Runtime configuration for a sync service
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the lead-management API (no trailing slash)
    pub api_base_url: String,
    /// Optional bearer token sent with every request
    pub api_token: Option<String>,
    /// Cache database path; `None` resolves to ~/.leadsync/cache.redb
    pub cache_path: Option<PathBuf>,
    /// Team role offered as assignees
    pub target_role: String,
    pub http_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: std::env::var("LEADSYNC_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            api_token: std::env::var("LEADSYNC_API_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
            cache_path: std::env::var("LEADSYNC_CACHE_PATH").ok().map(PathBuf::from),
            target_role: std::env::var("LEADSYNC_TARGET_ROLE")
                .unwrap_or_else(|_| DEFAULT_TARGET_ROLE.to_string()),
            http_timeout: std::env::var("LEADSYNC_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)),
        }
    }
}

impl SyncConfig {
    /// Resolve the on-disk cache location, creating ~/.leadsync if needed
    pub fn resolve_cache_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.cache_path {
            return Ok(path.clone());
        }

        let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
        let dir = home.join(".leadsync");
        std::fs::create_dir_all(&dir)
            .map_err(|e| anyhow!("Failed to create .leadsync directory: {}", e))?;
        Ok(dir.join("cache.redb"))
    }
}

/// Current wall-clock time in epoch milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
