//! In-memory `LeadApi` for pipeline and sync tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::types::{
    BulkAssignRequest, BulkAssignResults, ConversionPage, ConversionQuery, RawLead, RawTeamMember,
    StatusQuery,
};
use super::{ApiError, LeadApi};
use crate::types::LeadStatus;

pub(crate) fn raw(value: Value) -> RawLead {
    RawLead::from_value(value)
}

pub(crate) fn member(id: &str, email: &str, role: &str) -> RawTeamMember {
    RawTeamMember {
        id: id.to_string(),
        name: Some(format!("Agent {}", id)),
        email: Some(email.to_string()),
        role: Some(role.to_string()),
        status: Some("active".to_string()),
        is_online: None,
    }
}

fn down() -> ApiError {
    ApiError::Network("connection refused".into())
}

pub(crate) struct FakeLeadApi {
    conversion: Mutex<Result<Vec<RawLead>, ApiError>>,
    by_status: Mutex<HashMap<LeadStatus, Vec<RawLead>>>,
    failing_status: Mutex<HashSet<LeadStatus>>,
    failing_counts: Mutex<HashSet<(LeadStatus, String)>>,
    team: Mutex<Result<Vec<RawTeamMember>, ApiError>>,
    bulk: Mutex<Result<BulkAssignResults, ApiError>>,
    pub conversion_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub team_calls: AtomicUsize,
    pub bulk_requests: Mutex<Vec<BulkAssignRequest>>,
}

impl FakeLeadApi {
    pub fn new() -> Self {
        Self {
            conversion: Mutex::new(Err(down())),
            by_status: Mutex::new(HashMap::new()),
            failing_status: Mutex::new(HashSet::new()),
            failing_counts: Mutex::new(HashSet::new()),
            team: Mutex::new(Ok(Vec::new())),
            bulk: Mutex::new(Ok(BulkAssignResults::default())),
            conversion_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            team_calls: AtomicUsize::new(0),
            bulk_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn set_conversion(&self, result: Result<Vec<RawLead>, ApiError>) {
        *self.conversion.lock().unwrap() = result;
    }

    pub fn set_status(&self, status: LeadStatus, leads: Vec<RawLead>) {
        self.by_status.lock().unwrap().insert(status, leads);
    }

    pub fn fail_status(&self, status: LeadStatus) {
        self.failing_status.lock().unwrap().insert(status);
    }

    pub fn fail_count(&self, status: LeadStatus, assignee: &str) {
        self.failing_counts
            .lock()
            .unwrap()
            .insert((status, assignee.to_string()));
    }

    pub fn set_team(&self, result: Result<Vec<RawTeamMember>, ApiError>) {
        *self.team.lock().unwrap() = result;
    }

    pub fn set_bulk(&self, result: Result<BulkAssignResults, ApiError>) {
        *self.bulk.lock().unwrap() = result;
    }

    pub fn total_calls(&self) -> usize {
        self.conversion_calls.load(Ordering::SeqCst)
            + self.status_calls.load(Ordering::SeqCst)
            + self.team_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LeadApi for FakeLeadApi {
    async fn conversion_leads(&self, _query: &ConversionQuery) -> Result<ConversionPage, ApiError> {
        self.conversion_calls.fetch_add(1, Ordering::SeqCst);
        self.conversion
            .lock()
            .unwrap()
            .clone()
            .map(|leads| ConversionPage { leads, cached: false })
    }

    async fn leads_by_status(&self, query: &StatusQuery) -> Result<Vec<RawLead>, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);

        match &query.assigned_to {
            Some(assignee) => {
                if self
                    .failing_counts
                    .lock()
                    .unwrap()
                    .contains(&(query.status, assignee.clone()))
                {
                    return Err(down());
                }
            }
            None => {
                if self.failing_status.lock().unwrap().contains(&query.status) {
                    return Err(down());
                }
            }
        }

        Ok(self
            .by_status
            .lock()
            .unwrap()
            .get(&query.status)
            .cloned()
            .unwrap_or_default())
    }

    async fn team_members(&self) -> Result<Vec<RawTeamMember>, ApiError> {
        self.team_calls.fetch_add(1, Ordering::SeqCst);
        self.team.lock().unwrap().clone()
    }

    async fn bulk_assign(&self, request: &BulkAssignRequest) -> Result<BulkAssignResults, ApiError> {
        self.bulk_requests.lock().unwrap().push(request.clone());
        self.bulk.lock().unwrap().clone()
    }
}
