//! ============================================================================
//! API Wire Types - Request/response envelopes for the lead-management API
//! ============================================================================
//! Lead records are kept as raw JSON objects: the API has shipped several
//! generations of field names and the pipelines coalesce across them.
//! ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{AssignTarget, LeadStatus};

/// Sort direction for list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Query for the aggregate conversion endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionQuery {
    pub use_cache: bool,
    pub limit: u32,
    pub sort_by: String,
    pub sort_order: SortOrder,
}

/// Query for the per-status leads endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct StatusQuery {
    pub status: LeadStatus,
    pub limit: u32,
    pub offset: u32,
    pub sort_by: String,
    pub sort_order: SortOrder,
    /// Assignee filter hint; callers still filter client-side
    pub assigned_to: Option<String>,
}

/// Lead record exactly as the API returned it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawLead(pub Map<String, Value>);

impl RawLead {
    /// Build from a JSON value; non-objects yield an empty record
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    /// First non-empty string (or number) among `keys`
    pub fn first_str(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| match self.0.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }

    /// A person reference that may be a bare string or an `{ email, name }` object
    pub fn person(&self, keys: &[&str]) -> (Option<String>, Option<String>) {
        for key in keys {
            match self.0.get(*key) {
                Some(Value::String(s)) if !s.trim().is_empty() => {
                    return (Some(s.trim().to_string()), None);
                }
                Some(Value::Object(obj)) => {
                    let field = |names: &[&str]| {
                        names.iter().find_map(|n| {
                            obj.get(*n)
                                .and_then(Value::as_str)
                                .map(str::trim)
                                .filter(|s| !s.is_empty())
                                .map(str::to_string)
                        })
                    };
                    let id = field(&["email", "_id", "id"]);
                    let name = field(&["name", "fullName"]);
                    if id.is_some() || name.is_some() {
                        return (id, name);
                    }
                }
                _ => {}
            }
        }
        (None, None)
    }

    pub fn timestamp(&self, keys: &[&str]) -> Option<DateTime<Utc>> {
        self.first_str(keys)
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Team member row, coalesced from whichever field-name generation the API sent
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTeamMember {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
    pub is_online: Option<bool>,
}

impl RawTeamMember {
    /// Decode one row; rows without any identifier yield `None`
    pub fn from_value(value: Value) -> Option<Self> {
        let record = RawLead::from_value(value);
        let is_online = ["isOnline", "is_online", "online"]
            .iter()
            .find_map(|key| record.0.get(*key).and_then(Value::as_bool));

        Some(Self {
            id: record.first_str(&["_id", "id", "userId"])?,
            name: record.first_str(&["name", "fullName", "full_name"]),
            email: record.first_str(&["email", "emailAddress"]),
            role: record.first_str(&["role"]),
            status: record.first_str(&["status"]),
            is_online,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConversionResponse {
    pub success: bool,
    pub data: Option<Vec<RawLead>>,
    #[serde(default)]
    pub cached: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LeadsResponse {
    pub success: bool,
    pub data: Option<Vec<RawLead>>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TeamResponse {
    pub success: bool,
    pub members: Option<Vec<Value>>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Result of the aggregate conversion query
#[derive(Debug, Clone, Default)]
pub struct ConversionPage {
    pub leads: Vec<RawLead>,
    /// Whether the server answered from its own cache
    pub cached: bool,
}

/// Body of POST /leads/bulk-assign
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAssignRequest {
    pub lead_ids: Vec<String>,
    pub assign_to: Option<AssignTarget>,
    pub notes: String,
}

/// Server outcome of a bulk assignment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkAssignResults {
    #[serde(default)]
    pub assigned: u32,
    #[serde(default)]
    pub failed: u32,
    #[serde(default)]
    pub errors: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BulkAssignResponse {
    pub success: bool,
    pub results: Option<BulkAssignResults>,
    #[serde(default)]
    pub message: Option<String>,
}
