//! ============================================================================
//! HTTP Lead API - reqwest implementation of `LeadApi`
//! ============================================================================
//! Handles the lead-management REST endpoints:
//! - Aggregate conversion leads
//! - Per-status lead pages (also used for per-agent counts)
//! - Team members
//! - Bulk assignment
//! ============================================================================

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::types::{
    BulkAssignRequest, BulkAssignResponse, BulkAssignResults, ConversionPage, ConversionQuery,
    ConversionResponse, LeadsResponse, RawLead, RawTeamMember, StatusQuery, TeamResponse,
};
use super::{ApiError, LeadApi};
use crate::config::SyncConfig;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// Lead-management API client
pub struct HttpLeadApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpLeadApi {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self::with_client(base_url, token, reqwest::Client::new())
    }

    /// Build a client honouring the configured timeout
    pub fn from_config(config: &SyncConfig) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("leadsync/1.0")
            .timeout(config.http_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client ({}), using defaults without timeout", e);
                reqwest::Client::new()
            });

        Self::with_client(config.api_base_url.clone(), config.api_token.clone(), client)
    }

    fn with_client(base_url: impl Into<String>, token: Option<String>, client: reqwest::Client) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request and decode the JSON body, classifying every failure
    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<T, ApiError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| classify_transport(&e))?;

        if !status.is_success() {
            warn!("{} failed with HTTP {}", what, status);
            return Err(classify_status(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| ApiError::Malformed(format!("{} response: {}", what, e)))
    }
}

fn classify_transport(e: &reqwest::Error) -> ApiError {
    if e.is_decode() {
        return ApiError::Malformed(e.to_string());
    }
    if let Some(status) = e.status() {
        return classify_status(status, "");
    }
    ApiError::Network(e.to_string())
}

fn classify_status(status: StatusCode, body: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message.or(b.error))
        .unwrap_or_else(|| body.chars().take(200).collect());

    if status.is_client_error() {
        ApiError::Validation {
            status: status.as_u16(),
            message,
        }
    } else {
        ApiError::Server {
            status: status.as_u16(),
            message,
        }
    }
}

fn rejected(message: Option<String>, what: &str) -> ApiError {
    ApiError::Server {
        status: StatusCode::OK.as_u16(),
        message: message.unwrap_or_else(|| format!("{} reported success=false", what)),
    }
}

#[async_trait]
impl LeadApi for HttpLeadApi {
    async fn conversion_leads(&self, query: &ConversionQuery) -> Result<ConversionPage, ApiError> {
        debug!("Fetching conversion leads (limit {})", query.limit);

        let request = self
            .client
            .get(format!("{}/leads/conversion", self.base_url))
            .query(&[
                ("useCache", query.use_cache.to_string()),
                ("limit", query.limit.to_string()),
                ("sortBy", query.sort_by.clone()),
                ("sortOrder", query.sort_order.as_str().to_string()),
            ]);

        let response: ConversionResponse = self.execute(request, "Conversion leads").await?;
        if !response.success {
            return Err(rejected(response.message, "Conversion leads"));
        }
        let leads = response
            .data
            .ok_or_else(|| ApiError::Malformed("conversion response has no data".into()))?;

        info!("Fetched {} conversion leads (server cached: {})", leads.len(), response.cached);
        Ok(ConversionPage {
            leads,
            cached: response.cached,
        })
    }

    async fn leads_by_status(&self, query: &StatusQuery) -> Result<Vec<RawLead>, ApiError> {
        debug!("Fetching {} leads (limit {})", query.status.as_str(), query.limit);

        let mut params = vec![
            ("status", query.status.as_str().to_string()),
            ("limit", query.limit.to_string()),
            ("offset", query.offset.to_string()),
            ("sortBy", query.sort_by.clone()),
            ("sortOrder", query.sort_order.as_str().to_string()),
        ];
        if let Some(assignee) = &query.assigned_to {
            params.push(("assignedTo", assignee.clone()));
        }

        let request = self
            .client
            .get(format!("{}/leads", self.base_url))
            .query(&params);

        let response: LeadsResponse = self.execute(request, "Leads by status").await?;
        if !response.success {
            return Err(rejected(response.message, "Leads by status"));
        }
        response
            .data
            .ok_or_else(|| ApiError::Malformed("leads response has no data".into()))
    }

    async fn team_members(&self) -> Result<Vec<RawTeamMember>, ApiError> {
        debug!("Fetching team members");

        let request = self.client.get(format!("{}/team-members", self.base_url));
        let response: TeamResponse = self.execute(request, "Team members").await?;
        if !response.success {
            return Err(rejected(response.message, "Team members"));
        }
        let rows = response
            .members
            .ok_or_else(|| ApiError::Malformed("team response has no members".into()))?;

        let total = rows.len();
        let members: Vec<RawTeamMember> = rows.into_iter().filter_map(RawTeamMember::from_value).collect();
        if members.len() < total {
            warn!("Skipped {} team members without an identifier", total - members.len());
        }
        Ok(members)
    }

    async fn bulk_assign(&self, request: &BulkAssignRequest) -> Result<BulkAssignResults, ApiError> {
        info!("Bulk assigning {} leads", request.lead_ids.len());

        let http_request = self
            .client
            .post(format!("{}/leads/bulk-assign", self.base_url))
            .json(request);

        let response: BulkAssignResponse = self.execute(http_request, "Bulk assign").await?;
        if !response.success {
            return Err(rejected(response.message, "Bulk assign"));
        }
        let results = response.results.unwrap_or_default();

        info!("Bulk assign: {} assigned, {} failed", results.assigned, results.failed);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::SortOrder;
    use crate::types::{AssignTarget, LeadStatus};
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn conversion_query() -> ConversionQuery {
        ConversionQuery {
            use_cache: true,
            limit: 10_000,
            sort_by: "createdAt".into(),
            sort_order: SortOrder::Desc,
        }
    }

    #[tokio::test]
    async fn test_conversion_leads_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/leads/conversion")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("useCache".into(), "true".into()),
                Matcher::UrlEncoded("limit".into(), "10000".into()),
                Matcher::UrlEncoded("sortOrder".into(), "desc".into()),
            ]))
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "success": true,
                    "cached": true,
                    "data": [{ "_id": "L1", "name": "Ada" }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let api = HttpLeadApi::new(server.url(), Some("secret".into()));
        let page = api.conversion_leads(&conversion_query()).await.unwrap();

        assert!(page.cached);
        assert_eq!(page.leads.len(), 1);
        assert_eq!(page.leads[0].first_str(&["_id"]).as_deref(), Some("L1"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_status_query_carries_assignee() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/leads")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("status".into(), "INTERESTED".into()),
                Matcher::UrlEncoded("offset".into(), "0".into()),
                Matcher::UrlEncoded("assignedTo".into(), "a@x.com".into()),
            ]))
            .with_status(200)
            .with_body(json!({ "success": true, "data": [] }).to_string())
            .create_async()
            .await;

        let api = HttpLeadApi::new(server.url(), None);
        let leads = api
            .leads_by_status(&StatusQuery {
                status: LeadStatus::Interested,
                limit: 10_000,
                offset: 0,
                sort_by: "createdAt".into(),
                sort_order: SortOrder::Desc,
                assigned_to: Some("a@x.com".into()),
            })
            .await
            .unwrap();

        assert!(leads.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_classified() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/leads/conversion")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body(json!({ "message": "maintenance" }).to_string())
            .create_async()
            .await;

        let api = HttpLeadApi::new(server.url(), None);
        let err = api.conversion_leads(&conversion_query()).await.unwrap_err();

        assert_eq!(
            err,
            ApiError::Server {
                status: 503,
                message: "maintenance".into()
            }
        );
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_client_error_is_validation() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/team-members")
            .with_status(422)
            .with_body(json!({ "error": "bad filter" }).to_string())
            .create_async()
            .await;

        let api = HttpLeadApi::new(server.url(), None);
        let err = api.team_members().await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Validation {
                status: 422,
                message: "bad filter".into()
            }
        );
    }

    #[tokio::test]
    async fn test_team_rows_with_duplicate_id_keys_decode() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/team-members")
            .with_status(200)
            .with_body(
                json!({
                    "success": true,
                    "members": [
                        { "_id": "m1", "id": "m1", "name": "Mia", "fullName": "Mia Obi",
                          "email": "mia@x.com", "role": "marketing" },
                        { "name": "No Id", "role": "marketing" },
                        { "id": "m2", "fullName": "Obi", "role": "marketing", "isOnline": true }
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let api = HttpLeadApi::new(server.url(), None);
        let members = api.team_members().await.unwrap();

        let ids: Vec<&str> = members.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
        assert_eq!(members[0].name.as_deref(), Some("Mia"));
        assert_eq!(members[1].name.as_deref(), Some("Obi"));
        assert_eq!(members[1].is_online, Some(true));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/leads/conversion")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>gateway</html>")
            .create_async()
            .await;

        let api = HttpLeadApi::new(server.url(), None);
        let err = api.conversion_leads(&conversion_query()).await.unwrap_err();
        assert!(matches!(err, ApiError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_missing_data_is_malformed() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/leads/conversion")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({ "success": true }).to_string())
            .create_async()
            .await;

        let api = HttpLeadApi::new(server.url(), None);
        let err = api.conversion_leads(&conversion_query()).await.unwrap_err();
        assert!(matches!(err, ApiError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_unsuccessful_envelope_is_server_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/team-members")
            .with_status(200)
            .with_body(json!({ "success": false, "message": "not allowed" }).to_string())
            .create_async()
            .await;

        let api = HttpLeadApi::new(server.url(), None);
        let err = api.team_members().await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Server {
                status: 200,
                message: "not allowed".into()
            }
        );
    }

    #[tokio::test]
    async fn test_from_config_applies_timeout() {
        // Accepts connections but never answers
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let config = SyncConfig {
            api_base_url: format!("http://{}/", listener.local_addr().unwrap()),
            api_token: None,
            cache_path: None,
            target_role: "marketing".into(),
            http_timeout: std::time::Duration::from_millis(200),
        };

        let api = HttpLeadApi::from_config(&config);
        assert!(!api.base_url().ends_with('/'));

        let started = std::time::Instant::now();
        let err = api.team_members().await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
        drop(listener);
    }

    #[tokio::test]
    async fn test_connection_refused_is_network() {
        let api = HttpLeadApi::new("http://127.0.0.1:1", None);
        let err = api.team_members().await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
    }

    #[tokio::test]
    async fn test_bulk_assign_posts_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/leads/bulk-assign")
            .match_body(Matcher::PartialJson(json!({
                "leadIds": ["L1", "L2"],
                "assignTo": { "email": "a@x.com", "name": "A" }
            })))
            .with_status(200)
            .with_body(
                json!({
                    "success": true,
                    "results": { "assigned": 1, "failed": 1, "errors": [{ "leadId": "L2" }] }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let api = HttpLeadApi::new(format!("{}/", server.url()), None);
        let results = api
            .bulk_assign(&BulkAssignRequest {
                lead_ids: vec!["L1".into(), "L2".into()],
                assign_to: Some(AssignTarget {
                    email: "a@x.com".into(),
                    name: "A".into(),
                }),
                notes: "handover".into(),
            })
            .await
            .unwrap();

        assert_eq!(results.assigned, 1);
        assert_eq!(results.failed, 1);
        assert_eq!(results.errors.len(), 1);
        mock.assert_async().await;
    }
}
