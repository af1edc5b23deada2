//! ============================================================================
//! Core Types for LeadSync
//! ============================================================================
//! Cached representations of leads and team members, plus the sync state
//! exposed to dashboard readers. Serialized as camelCase JSON so cached
//! generations stay readable by other consumers of the same store.
//! ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lead lifecycle status as reported by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    New,
    Contacted,
    Interested,
    Qualified,
    Converted,
    Lost,
    #[serde(other)]
    Unknown,
}

impl LeadStatus {
    /// Statuses that make up the conversion view
    pub const CONVERSION: [LeadStatus; 2] = [LeadStatus::Contacted, LeadStatus::Interested];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "NEW",
            LeadStatus::Contacted => "CONTACTED",
            LeadStatus::Interested => "INTERESTED",
            LeadStatus::Qualified => "QUALIFIED",
            LeadStatus::Converted => "CONVERTED",
            LeadStatus::Lost => "LOST",
            LeadStatus::Unknown => "UNKNOWN",
        }
    }

    /// Parse a status string case-insensitively; unrecognised values map to Unknown
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "NEW" => LeadStatus::New,
            "CONTACTED" => LeadStatus::Contacted,
            "INTERESTED" => LeadStatus::Interested,
            "QUALIFIED" => LeadStatus::Qualified,
            "CONVERTED" => LeadStatus::Converted,
            "LOST" => LeadStatus::Lost,
            _ => LeadStatus::Unknown,
        }
    }
}

/// Assignment sub-record embedded in every lead
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    /// Assignee identifier (agent email)
    pub assigned_to: Option<String>,
    pub assigned_to_name: Option<String>,
    pub assigned_by: Option<String>,
    pub assigned_by_name: Option<String>,
    pub assigned_at: Option<DateTime<Utc>>,
    /// Assignee immediately before the latest change
    pub previous_assignee: Option<String>,
    pub notes: Option<String>,
}

/// Kind of assignment transition recorded on the timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimelineAction {
    Assigned,
    Reassigned,
    Unassigned,
}

impl TimelineAction {
    /// Classify a transition from `previous` to `next`
    pub fn classify(previous: Option<&str>, next: Option<&str>) -> Self {
        match (previous, next) {
            (_, None) => TimelineAction::Unassigned,
            (None, Some(_)) => TimelineAction::Assigned,
            (Some(_), Some(_)) => TimelineAction::Reassigned,
        }
    }
}

/// Append-only assignment history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub id: String,
    pub action: TimelineAction,
    pub from: Option<String>,
    pub to: Option<String>,
    pub performed_by: Option<String>,
    pub description: String,
    pub at: DateTime<Utc>,
}

/// Conversion lead as held in the sync cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    /// ISO country code resolved from the phone number
    pub country_code: Option<String>,
    pub status: LeadStatus,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assignment: Assignment,
    #[serde(default)]
    pub timeline: Vec<TimelineEntry>,
    /// Set while a local assignment awaits server confirmation
    #[serde(default)]
    pub optimistic: bool,
}

/// Binary presence derived from the API's member status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Online,
    Offline,
}

/// Team member eligible to receive conversion leads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub id: String,
    pub name: String,
    pub email: String,
    pub presence: Presence,
    /// Leads currently assigned across the conversion statuses
    pub assigned_count: u32,
    pub capacity: u32,
}

impl TeamMember {
    /// Share of capacity still free, in [0, 1] (overloaded agents clamp to 0)
    pub fn availability(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        let free = self.capacity.saturating_sub(self.assigned_count);
        free as f64 / self.capacity as f64
    }
}

/// Who a bulk assignment targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignTarget {
    pub email: String,
    pub name: String,
}

/// Caller-supplied context for an assignment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignMeta {
    pub assigned_by: Option<String>,
    pub assigned_by_name: Option<String>,
    pub notes: Option<String>,
}

/// Refresh cycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    #[default]
    Idle,
    Loading,
    Ready,
    Error,
}

/// State shared by every reader of one dashboard view
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub leads: Vec<Lead>,
    pub team_members: Vec<TeamMember>,
    pub last_fetch_epoch_ms: Option<i64>,
    pub is_refreshing: bool,
    pub last_error: Option<String>,
    pub phase: SyncPhase,
}

/// Orchestrator-level failures, surfaced through `SyncState::last_error`
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    #[error("Lead fetch failed: {0}")]
    Leads(String),

    #[error("Team fetch failed: {0}")]
    Team(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("A bulk assignment is already in flight")]
    AssignmentInFlight,

    #[error("Bulk assignment failed: {0}")]
    Assign(#[from] crate::api::ApiError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeline_classification() {
        assert_eq!(TimelineAction::classify(None, Some("a@x.com")), TimelineAction::Assigned);
        assert_eq!(
            TimelineAction::classify(Some("b@x.com"), Some("a@x.com")),
            TimelineAction::Reassigned
        );
        assert_eq!(TimelineAction::classify(Some("b@x.com"), None), TimelineAction::Unassigned);
        assert_eq!(TimelineAction::classify(None, None), TimelineAction::Unassigned);
    }

    #[test]
    fn test_availability_ratio() {
        let member = TeamMember {
            id: "m1".into(),
            name: "Mia".into(),
            email: "mia@x.com".into(),
            presence: Presence::Online,
            assigned_count: 10,
            capacity: 50,
        };
        assert!((member.availability() - 0.8).abs() < f64::EPSILON);

        let overloaded = TeamMember { assigned_count: 70, ..member };
        assert_eq!(overloaded.availability(), 0.0);
    }

    #[test]
    fn test_status_parsing_and_serde() {
        assert_eq!(LeadStatus::parse("interested"), LeadStatus::Interested);
        assert_eq!(LeadStatus::parse("bogus"), LeadStatus::Unknown);

        let status: LeadStatus = serde_json::from_str("\"CONTACTED\"").unwrap();
        assert_eq!(status, LeadStatus::Contacted);
        let unknown: LeadStatus = serde_json::from_str("\"ARCHIVED\"").unwrap();
        assert_eq!(unknown, LeadStatus::Unknown);
    }
}
