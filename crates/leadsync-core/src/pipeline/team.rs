//! ============================================================================
//! Team Fetch Pipeline - Marketing agents ranked by free capacity
//! ============================================================================
//! The root team fetch must succeed; per-agent count lookups may not, and a
//! failed count contributes zero rather than dropping the agent.
//! ============================================================================

use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::{ApiError, LeadApi, RawLead, RawTeamMember, SortOrder, StatusQuery};
use crate::config::{AGENT_CAPACITY, BULK_PAGE_SIZE, DEFAULT_TARGET_ROLE};
use crate::types::{LeadStatus, Presence, TeamMember};

const ONLINE_STATUSES: &[&str] = &["active", "online", "available"];

/// Fetches team members in one role and computes their workload
pub struct TeamFetchPipeline {
    api: Arc<dyn LeadApi>,
    target_role: String,
    capacity: u32,
}

impl TeamFetchPipeline {
    pub fn new(api: Arc<dyn LeadApi>) -> Self {
        Self::with_role(api, DEFAULT_TARGET_ROLE)
    }

    pub fn with_role(api: Arc<dyn LeadApi>, target_role: impl Into<String>) -> Self {
        Self {
            api,
            target_role: target_role.into(),
            capacity: AGENT_CAPACITY,
        }
    }

    /// Agents in the target role, most available first
    pub async fn fetch_marketing_agents(&self) -> Result<Vec<TeamMember>, ApiError> {
        let members = self.api.team_members().await?;
        let agents: Vec<RawTeamMember> = members
            .into_iter()
            .filter(|m| {
                m.role
                    .as_deref()
                    .is_some_and(|role| role.eq_ignore_ascii_case(&self.target_role))
            })
            .collect();
        debug!("{} team members hold role {}", agents.len(), self.target_role);

        let mut ranked: Vec<TeamMember> =
            join_all(agents.iter().map(|agent| self.build_member(agent))).await;
        rank_by_availability(&mut ranked);

        info!("Loaded {} {} agents", ranked.len(), self.target_role);
        Ok(ranked)
    }

    async fn build_member(&self, agent: &RawTeamMember) -> TeamMember {
        let email = agent.email.clone().unwrap_or_default();
        let assigned_count = self.assigned_count(agent).await;

        TeamMember {
            id: agent.id.clone(),
            name: agent.name.clone().unwrap_or_else(|| email.clone()),
            email,
            presence: presence_of(agent),
            assigned_count,
            capacity: self.capacity,
        }
    }

    /// Sum of conversion-status leads assigned to `agent`; failed statuses count zero
    async fn assigned_count(&self, agent: &RawTeamMember) -> u32 {
        let assignee = agent.email.clone().unwrap_or_else(|| agent.id.clone());
        let queries: Vec<StatusQuery> = LeadStatus::CONVERSION
            .iter()
            .map(|status| StatusQuery {
                status: *status,
                limit: BULK_PAGE_SIZE,
                offset: 0,
                sort_by: "createdAt".to_string(),
                sort_order: SortOrder::Desc,
                assigned_to: Some(assignee.clone()),
            })
            .collect();

        let results = join_all(queries.iter().map(|q| self.api.leads_by_status(q))).await;

        queries
            .iter()
            .zip(results)
            .map(|(query, result)| match result {
                Ok(leads) => leads.iter().filter(|l| is_assigned_to(l, agent)).count() as u32,
                Err(e) => {
                    warn!(
                        "Count of {} leads for {} failed: {} - counting as 0",
                        query.status.as_str(),
                        assignee,
                        e
                    );
                    0
                }
            })
            .sum()
    }
}

fn is_assigned_to(lead: &RawLead, agent: &RawTeamMember) -> bool {
    let (assignee, _) = lead.person(&["assignedTo", "assigned_to", "assignedAgent"]);
    match assignee {
        Some(assignee) => {
            agent
                .email
                .as_deref()
                .is_some_and(|email| email.eq_ignore_ascii_case(&assignee))
                || assignee == agent.id
        }
        None => false,
    }
}

fn presence_of(agent: &RawTeamMember) -> Presence {
    let online = agent.is_online.unwrap_or(false)
        || agent
            .status
            .as_deref()
            .is_some_and(|s| ONLINE_STATUSES.iter().any(|o| s.eq_ignore_ascii_case(o)));
    if online {
        Presence::Online
    } else {
        Presence::Offline
    }
}

/// Stable sort by availability ratio, highest first
pub fn rank_by_availability(members: &mut [TeamMember]) {
    members.sort_by(|a, b| b.availability().total_cmp(&a.availability()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{member, raw, FakeLeadApi};
    use serde_json::json;

    fn assigned(id: &str, status: &str, assignee: &str) -> RawLead {
        raw(json!({ "_id": id, "status": status, "assignedTo": assignee }))
    }

    fn seeded() -> Arc<FakeLeadApi> {
        let api = Arc::new(FakeLeadApi::new());
        api.set_team(Ok(vec![
            member("m1", "busy@x.com", "marketing"),
            member("m2", "free@x.com", "Marketing"),
            member("m3", "sales@x.com", "sales"),
            member("m4", "mid@x.com", "marketing"),
        ]));
        api.set_status(
            LeadStatus::Contacted,
            vec![
                assigned("C1", "CONTACTED", "busy@x.com"),
                assigned("C2", "CONTACTED", "busy@x.com"),
                assigned("C3", "CONTACTED", "mid@x.com"),
                assigned("C4", "CONTACTED", "sales@x.com"),
            ],
        );
        api.set_status(
            LeadStatus::Interested,
            vec![
                assigned("I1", "INTERESTED", "busy@x.com"),
                raw(json!({ "_id": "I2", "status": "INTERESTED",
                            "assignedTo": { "email": "BUSY@x.com", "name": "Busy" } })),
            ],
        );
        api
    }

    #[tokio::test]
    async fn test_filters_role_and_ranks() {
        let pipeline = TeamFetchPipeline::new(seeded());
        let agents = pipeline.fetch_marketing_agents().await.unwrap();

        let ids: Vec<_> = agents.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m4", "m1"]);

        let counts: Vec<_> = agents.iter().map(|a| a.assigned_count).collect();
        assert_eq!(counts, vec![0, 1, 4]);
        assert!(agents.iter().all(|a| a.capacity == AGENT_CAPACITY));
        assert!(agents.iter().all(|a| a.presence == Presence::Online));
    }

    #[tokio::test]
    async fn test_partial_count_failure_uses_successful_status() {
        let api = seeded();
        api.fail_count(LeadStatus::Interested, "busy@x.com");

        let agents = TeamFetchPipeline::new(api).fetch_marketing_agents().await.unwrap();
        let busy = agents.iter().find(|a| a.id == "m1").unwrap();
        assert_eq!(busy.assigned_count, 2);
    }

    #[tokio::test]
    async fn test_all_counts_failing_keeps_agent() {
        let api = seeded();
        api.fail_count(LeadStatus::Contacted, "mid@x.com");
        api.fail_count(LeadStatus::Interested, "mid@x.com");

        let agents = TeamFetchPipeline::new(api).fetch_marketing_agents().await.unwrap();
        let mid = agents.iter().find(|a| a.id == "m4").unwrap();
        assert_eq!(mid.assigned_count, 0);
        assert_eq!(agents.len(), 3);
    }

    #[tokio::test]
    async fn test_root_failure_propagates() {
        let api = seeded();
        api.set_team(Err(ApiError::Network("connection reset".into())));

        let result = TeamFetchPipeline::new(api).fetch_marketing_agents().await;
        assert!(matches!(result, Err(ApiError::Network(_))));
    }

    #[tokio::test]
    async fn test_custom_role() {
        let agents = TeamFetchPipeline::with_role(seeded(), "sales")
            .fetch_marketing_agents()
            .await
            .unwrap();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].assigned_count, 1);
    }

    #[test]
    fn test_presence_derivation() {
        let mut agent = member("m1", "a@x.com", "marketing");
        assert_eq!(presence_of(&agent), Presence::Online);

        agent.status = Some("inactive".into());
        assert_eq!(presence_of(&agent), Presence::Offline);

        agent.is_online = Some(true);
        assert_eq!(presence_of(&agent), Presence::Online);
    }
}
