//! ============================================================================
//! API Module - Transport boundary to the lead-management API
//! ============================================================================
//! `LeadApi` is the seam the fetch pipelines and the sync service depend on.
//! `HttpLeadApi` implements it over reqwest; errors are classified here, at
//! the boundary, into `ApiError` so no caller inspects message text.
//! ============================================================================

mod http;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use http::HttpLeadApi;
pub use types::{
    BulkAssignRequest, BulkAssignResults, ConversionPage, ConversionQuery, RawLead,
    RawTeamMember, SortOrder, StatusQuery,
};

use async_trait::async_trait;

/// Typed failure taxonomy for API calls
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// Connection, DNS, timeout, or body transfer failure
    #[error("Network error: {0}")]
    Network(String),

    /// Request rejected as invalid (4xx)
    #[error("Validation error ({status}): {message}")]
    Validation { status: u16, message: String },

    /// Server-side failure (5xx, or a `success: false` envelope)
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Response body did not match the expected envelope
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl ApiError {
    /// Whether a later refresh has a reasonable chance of succeeding
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Network(_) => true,
            ApiError::Server { status, .. } => *status >= 500,
            ApiError::Validation { status, .. } => *status == 408 || *status == 429,
            ApiError::Malformed(_) => false,
        }
    }
}

/// Operations the sync layer needs from the remote API
#[async_trait]
pub trait LeadApi: Send + Sync {
    /// GET /leads/conversion
    async fn conversion_leads(&self, query: &ConversionQuery) -> Result<ConversionPage, ApiError>;

    /// GET /leads?status=...
    async fn leads_by_status(&self, query: &StatusQuery) -> Result<Vec<RawLead>, ApiError>;

    /// GET /team-members
    async fn team_members(&self) -> Result<Vec<RawTeamMember>, ApiError>;

    /// POST /leads/bulk-assign
    async fn bulk_assign(&self, request: &BulkAssignRequest) -> Result<BulkAssignResults, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ApiError::Network("connection refused".into()).is_transient());
        assert!(ApiError::Server { status: 503, message: String::new() }.is_transient());
        assert!(!ApiError::Server { status: 200, message: "rejected".into() }.is_transient());
        assert!(ApiError::Validation { status: 429, message: String::new() }.is_transient());
        assert!(!ApiError::Validation { status: 422, message: String::new() }.is_transient());
        assert!(!ApiError::Malformed("eof".into()).is_transient());
    }
}
