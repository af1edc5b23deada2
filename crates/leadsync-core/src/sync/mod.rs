//! ============================================================================
//! Sync Module - Cached conversion leads and marketing team for one view
//! ============================================================================
//! `SyncCache` owns the in-memory `SyncState`, the persisted cache generation,
//! and the refresh schedule.
//!
//! ## Lifecycle
//! ```rust,ignore
//! use leadsync_core::{SyncCache, SyncConfig};
//!
//! let cache = SyncCache::from_config(&SyncConfig::default())?;
//! let auto_refresh = cache.start().await;   // cached load + 60s polling
//!
//! let leads = cache.leads();
//! cache.bulk_assign(ids, Some(target), meta).await?;
//!
//! auto_refresh.stop();                       // on view teardown
//! ```
//!
//! ## Guarantees
//! - `load`/`refresh` never fail; failures land in `last_error` and the
//!   previously installed leads and team stay visible.
//! - Leads and team are installed together or not at all.
//! - Optimistic assignment and reconciliation are synchronous local writes.
//! ============================================================================

mod optimistic;
mod refresh;

pub use optimistic::{apply_optimistic_assignment, assignment_note, clear_optimistic};
pub use refresh::AutoRefreshHandle;

use anyhow::{anyhow, Result};
use chrono::Utc;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::api::{BulkAssignRequest, BulkAssignResults, HttpLeadApi, LeadApi};
use crate::cache::KeyValueCache;
use crate::config::{now_ms, SyncConfig, AUTO_REFRESH_INTERVAL};
use crate::pipeline::{FetchSource, LeadFetchPipeline, TeamFetchPipeline};
use crate::types::{
    AssignMeta, AssignTarget, Lead, SyncError, SyncPhase, SyncState, TeamMember,
};

/// Cache key holding the serialized leads array
pub const LEADS_KEY: &str = "conversion_leads";
/// Cache key holding the serialized team array
pub const TEAM_KEY: &str = "marketing_team";
/// Cache key holding the generation's epoch-millisecond timestamp
pub const TIMESTAMP_KEY: &str = "conversion_cache_timestamp";

const GENERATION_KEYS: [&str; 3] = [LEADS_KEY, TEAM_KEY, TIMESTAMP_KEY];

/// Stale-while-revalidate cache of conversion leads and marketing agents
pub struct SyncCache {
    api: Arc<dyn LeadApi>,
    leads: LeadFetchPipeline,
    team: TeamFetchPipeline,
    store: Arc<KeyValueCache>,
    state: RwLock<SyncState>,
    refresh_interval: Duration,
    assign_in_flight: AtomicBool,
    refreshes_running: AtomicUsize,
}

struct Generation {
    leads: Vec<Lead>,
    team: Vec<TeamMember>,
    stored_at_ms: i64,
}

/// Holds `is_refreshing` up while any refresh runs, including ones dropped mid-flight
struct RefreshingGuard<'a>(&'a SyncCache);

impl<'a> RefreshingGuard<'a> {
    fn enter(cache: &'a SyncCache) -> Self {
        let mut state = cache.state_mut();
        cache.refreshes_running.fetch_add(1, Ordering::SeqCst);
        state.is_refreshing = true;
        Self(cache)
    }
}

impl Drop for RefreshingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.0.state_mut();
        let remaining = self.0.refreshes_running.fetch_sub(1, Ordering::SeqCst) - 1;
        state.is_refreshing = remaining > 0;
    }
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SyncCache {
    pub fn new(api: Arc<dyn LeadApi>, store: Arc<KeyValueCache>) -> Self {
        let team = TeamFetchPipeline::new(Arc::clone(&api));
        Self::with_team_pipeline(api, store, team)
    }

    fn with_team_pipeline(api: Arc<dyn LeadApi>, store: Arc<KeyValueCache>, team: TeamFetchPipeline) -> Self {
        Self {
            leads: LeadFetchPipeline::new(Arc::clone(&api)),
            team,
            api,
            store,
            state: RwLock::new(SyncState::default()),
            refresh_interval: AUTO_REFRESH_INTERVAL,
            assign_in_flight: AtomicBool::new(false),
            refreshes_running: AtomicUsize::new(0),
        }
    }

    /// HTTP-backed cache using the configured API and cache file
    pub fn from_config(config: &SyncConfig) -> Result<Arc<Self>> {
        let path = config.resolve_cache_path()?;
        let store = KeyValueCache::open(&path)
            .map_err(|e| anyhow!("Failed to open sync cache at {}: {}", path.display(), e))?;
        let api: Arc<dyn LeadApi> = Arc::new(HttpLeadApi::from_config(config));
        let team = TeamFetchPipeline::with_role(Arc::clone(&api), config.target_role.clone());

        Ok(Arc::new(Self::with_team_pipeline(api, Arc::new(store), team)))
    }

    fn state(&self) -> RwLockReadGuard<'_, SyncState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn state_mut(&self) -> RwLockWriteGuard<'_, SyncState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Initial cached load, then periodic polling until the handle is stopped
    pub async fn start(self: &Arc<Self>) -> AutoRefreshHandle {
        self.load(true).await;
        self.start_auto_refresh()
    }

    pub fn start_auto_refresh(self: &Arc<Self>) -> AutoRefreshHandle {
        AutoRefreshHandle::spawn(self, self.refresh_interval)
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Install leads and team, from the persisted generation when allowed and fresh
    pub async fn load(&self, use_cache: bool) {
        if use_cache {
            if let Some(generation) = self.read_generation(now_ms()) {
                info!(
                    "Serving {} leads and {} agents from cache",
                    generation.leads.len(),
                    generation.team.len()
                );
                self.install(generation.leads, generation.team, generation.stored_at_ms);
                return;
            }
            debug!("No valid cache generation, fetching fresh data");
        }

        self.state_mut().phase = SyncPhase::Loading;

        let (report, team) = tokio::join!(
            self.leads.fetch_with_report(),
            self.team.fetch_marketing_agents()
        );

        let team = match (report.source, team) {
            (FetchSource::Unavailable, _) => {
                let causes: Vec<String> = report.failures.iter().map(ToString::to_string).collect();
                self.fail(SyncError::Leads(causes.join("; ")));
                return;
            }
            (_, Err(e)) => {
                self.fail(SyncError::Team(e.to_string()));
                return;
            }
            (_, Ok(team)) => team,
        };

        let fetched_at = now_ms();
        if use_cache {
            if let Err(e) = self.write_generation(&report.leads, &team, fetched_at) {
                warn!("{}", SyncError::Cache(e.to_string()));
            }
        }
        self.install(report.leads, team, fetched_at);
    }

    /// Drop the persisted generation and fetch fresh data
    pub async fn refresh(&self) {
        let _refreshing = RefreshingGuard::enter(self);

        if let Err(e) = self.store.clear(&GENERATION_KEYS) {
            warn!("Failed to clear cache generation: {}", e);
        }
        self.load(false).await;
    }

    pub async fn refresh_if_stale(&self) -> bool {
        self.refresh_if_stale_at(now_ms()).await
    }

    /// Timer body: refresh only if the last successful fetch is an interval old
    pub async fn refresh_if_stale_at(&self, now_ms: i64) -> bool {
        let (refreshing, last_fetch) = {
            let state = self.state();
            (state.is_refreshing, state.last_fetch_epoch_ms)
        };
        if refreshing {
            debug!("Refresh already running, skipping tick");
            return false;
        }

        let interval_ms = self.refresh_interval.as_millis() as i64;
        if let Some(last) = last_fetch {
            if now_ms - last < interval_ms {
                debug!("Data is {}ms old, skipping tick", now_ms - last);
                return false;
            }
        }

        info!("Data is stale, refreshing");
        self.refresh().await;
        true
    }

    fn read_generation(&self, now_ms: i64) -> Option<Generation> {
        if !GENERATION_KEYS.iter().all(|key| self.store.is_valid_at(key, now_ms)) {
            return None;
        }
        Some(Generation {
            stored_at_ms: self.store.read_at(TIMESTAMP_KEY, now_ms)?,
            leads: self.store.read_at(LEADS_KEY, now_ms)?,
            team: self.store.read_at(TEAM_KEY, now_ms)?,
        })
    }

    fn write_generation(&self, leads: &[Lead], team: &[TeamMember], stored_at_ms: i64) -> Result<()> {
        let leads = serde_json::to_value(leads)?;
        let team = serde_json::to_value(team)?;
        self.store.write_batch(
            &[
                (LEADS_KEY, leads),
                (TEAM_KEY, team),
                (TIMESTAMP_KEY, json!(stored_at_ms)),
            ],
            stored_at_ms,
        )
    }

    fn install(&self, leads: Vec<Lead>, team: Vec<TeamMember>, fetched_at_ms: i64) {
        let mut state = self.state_mut();
        state.leads = leads;
        state.team_members = team;
        state.last_fetch_epoch_ms = Some(fetched_at_ms);
        state.last_error = None;
        state.phase = SyncPhase::Ready;
        debug!(
            "Installed {} leads and {} agents",
            state.leads.len(),
            state.team_members.len()
        );
    }

    fn fail(&self, err: SyncError) {
        error!("{}", err);
        let mut state = self.state_mut();
        state.last_error = Some(err.to_string());
        state.phase = SyncPhase::Error;
    }

    // ========================================================================
    // Optimistic assignment
    // ========================================================================

    /// Rewrite matching leads locally ahead of server confirmation
    pub fn optimistically_assign_leads(
        &self,
        lead_ids: &[String],
        target: Option<&AssignTarget>,
        meta: &AssignMeta,
    ) -> usize {
        let changed =
            apply_optimistic_assignment(&mut self.state_mut().leads, lead_ids, target, meta, Utc::now());
        debug!("Optimistically assigned {} of {} leads", changed, lead_ids.len());
        changed
    }

    /// Stop marking `lead_ids` as provisional; data is left as held
    pub fn reconcile_after_bulk(&self, results: &BulkAssignResults, lead_ids: &[String]) -> usize {
        if results.failed > 0 {
            warn!(
                "Server rejected {} of {} assignments; next refresh will restore them",
                results.failed,
                lead_ids.len()
            );
        }
        clear_optimistic(&mut self.state_mut().leads, lead_ids)
    }

    /// Full assignment flow: optimistic write, POST, reconcile, refresh
    pub async fn bulk_assign(
        &self,
        lead_ids: Vec<String>,
        target: Option<AssignTarget>,
        meta: AssignMeta,
    ) -> Result<BulkAssignResults, SyncError> {
        if lead_ids.is_empty() {
            debug!("Bulk assign called with no leads, nothing to do");
            return Ok(BulkAssignResults::default());
        }
        if self.assign_in_flight.swap(true, Ordering::SeqCst) {
            return Err(SyncError::AssignmentInFlight);
        }
        let _in_flight = InFlightGuard(&self.assign_in_flight);

        self.optimistically_assign_leads(&lead_ids, target.as_ref(), &meta);

        let request = BulkAssignRequest {
            notes: assignment_note(target.as_ref(), &meta),
            lead_ids,
            assign_to: target,
        };
        let outcome = self.api.bulk_assign(&request).await;

        let results = match &outcome {
            Ok(results) => results.clone(),
            Err(e) => {
                warn!("Bulk assign failed: {}", e);
                BulkAssignResults {
                    failed: request.lead_ids.len() as u32,
                    ..Default::default()
                }
            }
        };
        self.reconcile_after_bulk(&results, &request.lead_ids);
        self.refresh().await;

        outcome.map_err(SyncError::from)
    }

    // ========================================================================
    // Readers
    // ========================================================================

    pub fn snapshot(&self) -> SyncState {
        self.state().clone()
    }

    pub fn leads(&self) -> Vec<Lead> {
        self.state().leads.clone()
    }

    pub fn team_members(&self) -> Vec<TeamMember> {
        self.state().team_members.clone()
    }

    pub fn lead(&self, id: &str) -> Option<Lead> {
        self.state().leads.iter().find(|l| l.id == id).cloned()
    }

    pub fn phase(&self) -> SyncPhase {
        self.state().phase
    }

    pub fn last_error(&self) -> Option<String> {
        self.state().last_error.clone()
    }

    pub fn is_refreshing(&self) -> bool {
        self.state().is_refreshing
    }

    pub fn last_fetch_epoch_ms(&self) -> Option<i64> {
        self.state().last_fetch_epoch_ms
    }

    pub fn store(&self) -> &KeyValueCache {
        &self.store
    }
}
