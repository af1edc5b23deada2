//! ============================================================================
//! Auto Refresh - Periodic stale-while-revalidate polling
//! ============================================================================
//! The timer is a polling check: each tick refreshes only if the last fetch
//! is at least one interval old. The task holds a weak reference, so a
//! dropped SyncCache ends the loop on its next tick.
//! ============================================================================

use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::SyncCache;

/// Owner's handle on a running refresh timer; stopping (or dropping) cancels it
#[must_use = "dropping the handle cancels auto-refresh"]
pub struct AutoRefreshHandle {
    task: JoinHandle<()>,
}

impl AutoRefreshHandle {
    pub(crate) fn spawn(cache: &Arc<SyncCache>, interval: Duration) -> Self {
        let weak: Weak<SyncCache> = Arc::downgrade(cache);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately; the initial load is the owner's job
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(cache) = weak.upgrade() else {
                    debug!("Sync cache dropped, stopping auto-refresh");
                    break;
                };
                cache.refresh_if_stale().await;
            }
        });

        info!("Auto-refresh started ({:?} interval)", interval);
        Self { task }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for AutoRefreshHandle {
    fn drop(&mut self) {
        if !self.task.is_finished() {
            self.task.abort();
            info!("Auto-refresh stopped");
        }
    }
}
