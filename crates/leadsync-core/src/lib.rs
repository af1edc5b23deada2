//! ============================================================================
//! LEADSYNC-CORE: Conversion Lead Sync Layer
//! ============================================================================
//! Client-side data layer for the conversion dashboard:
//! - TTL-bound persisted cache (redb)
//! - Phone-number country resolution
//! - Conversion lead fetch with per-status fallback
//! - Marketing team fetch with workload counts and availability ranking
//! - Stale-while-revalidate sync cache with optimistic assignment
//! ============================================================================

pub mod api;
pub mod cache;
pub mod config;
pub mod country;
pub mod pipeline;
pub mod sync;
pub mod types;

// Re-export main types for convenience
pub use types::*;
pub use api::{ApiError, BulkAssignResults, HttpLeadApi, LeadApi};
pub use cache::KeyValueCache;
pub use config::{SyncConfig, AGENT_CAPACITY, AUTO_REFRESH_INTERVAL, BULK_PAGE_SIZE, CACHE_DURATION};
pub use country::{Country, CountryResolver};
pub use pipeline::{FetchSource, LeadFetchPipeline, TeamFetchPipeline};
pub use sync::{AutoRefreshHandle, SyncCache};
