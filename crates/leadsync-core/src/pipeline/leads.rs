//! ============================================================================
//! Lead Fetch Pipeline - Conversion leads with per-status fallback
//! ============================================================================
//! 1. Ask the aggregate conversion endpoint for everything at once.
//! 2. If that fails, fetch each conversion status concurrently and merge.
//! 3. Enrich every record identically on both paths (country, field names).
//! ============================================================================

use futures_util::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::{ApiError, ConversionQuery, LeadApi, RawLead, SortOrder, StatusQuery};
use crate::config::BULK_PAGE_SIZE;
use crate::country::CountryResolver;
use crate::types::{Assignment, Lead, LeadStatus};

const SORT_FIELD: &str = "createdAt";

const ID_KEYS: &[&str] = &["_id", "id", "leadId"];
const NAME_KEYS: &[&str] = &["name", "fullName", "full_name", "leadName"];
const EMAIL_KEYS: &[&str] = &["email", "emailAddress", "email_address", "contactEmail"];
const PHONE_KEYS: &[&str] = &["phone", "phoneNumber", "phone_number", "mobile", "contactNumber"];
const CREATED_KEYS: &[&str] = &["createdAt", "created_at", "dateCreated"];
const ASSIGNEE_KEYS: &[&str] = &["assignedTo", "assigned_to", "assignedAgent"];

/// Which strategy produced a batch of leads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchSource {
    Primary,
    Fallback,
    /// Both strategies failed; the batch is empty
    Unavailable,
}

/// Leads plus how they were obtained
#[derive(Debug, Clone)]
pub struct LeadFetchReport {
    pub leads: Vec<Lead>,
    pub source: FetchSource,
    /// Every failure encountered, primary first
    pub failures: Vec<ApiError>,
}

/// Fetches and enriches conversion leads
pub struct LeadFetchPipeline {
    api: Arc<dyn LeadApi>,
    resolver: CountryResolver,
    page_size: u32,
}

impl LeadFetchPipeline {
    pub fn new(api: Arc<dyn LeadApi>) -> Self {
        Self {
            api,
            resolver: CountryResolver::new(),
            page_size: BULK_PAGE_SIZE,
        }
    }

    /// Best-effort conversion leads; never fails, empty only if every path failed
    pub async fn fetch_conversion_leads(&self) -> Vec<Lead> {
        self.fetch_with_report().await.leads
    }

    pub async fn fetch_with_report(&self) -> LeadFetchReport {
        let query = ConversionQuery {
            use_cache: true,
            limit: self.page_size,
            sort_by: SORT_FIELD.to_string(),
            sort_order: SortOrder::Desc,
        };

        let primary_error = match self.api.conversion_leads(&query).await {
            Ok(page) => {
                let leads = self.enrich_all(page.leads);
                debug!("Primary conversion path returned {} leads", leads.len());
                return LeadFetchReport {
                    leads,
                    source: FetchSource::Primary,
                    failures: Vec::new(),
                };
            }
            Err(e) => e,
        };

        warn!("Conversion endpoint failed ({}), falling back to per-status fetch", primary_error);
        let (raw, mut failures) = self.fetch_per_status().await;
        failures.insert(0, primary_error);

        // Every leg failed: nothing usable was assembled
        if failures.len() > LeadStatus::CONVERSION.len() {
            warn!("All conversion lead sources failed");
            return LeadFetchReport {
                leads: Vec::new(),
                source: FetchSource::Unavailable,
                failures,
            };
        }

        let leads = self.enrich_all(raw);
        info!(
            "Fallback assembled {} leads ({} failed legs)",
            leads.len(),
            failures.len() - 1
        );
        LeadFetchReport {
            leads,
            source: FetchSource::Fallback,
            failures,
        }
    }

    /// One concurrent request per conversion status, concatenated in status order
    async fn fetch_per_status(&self) -> (Vec<RawLead>, Vec<ApiError>) {
        let queries: Vec<StatusQuery> = LeadStatus::CONVERSION
            .iter()
            .map(|status| StatusQuery {
                status: *status,
                limit: self.page_size,
                offset: 0,
                sort_by: SORT_FIELD.to_string(),
                sort_order: SortOrder::Desc,
                assigned_to: None,
            })
            .collect();

        let results = join_all(queries.iter().map(|q| self.api.leads_by_status(q))).await;

        let mut merged = Vec::new();
        let mut failures = Vec::new();
        for (query, result) in queries.iter().zip(results) {
            match result {
                Ok(leads) => {
                    debug!("{} leg returned {} leads", query.status.as_str(), leads.len());
                    merged.extend(leads);
                }
                Err(e) => {
                    warn!("{} leg failed: {}", query.status.as_str(), e);
                    failures.push(e);
                }
            }
        }
        (merged, failures)
    }

    fn enrich_all(&self, raw: Vec<RawLead>) -> Vec<Lead> {
        let mut seen = HashSet::new();
        let mut leads: Vec<Lead> = raw
            .iter()
            .filter_map(|r| self.enrich(r))
            .filter(|lead| seen.insert(lead.id.clone()))
            .collect();
        sort_newest_first(&mut leads);
        leads
    }

    /// Normalize one raw record; records without an identifier are dropped
    pub fn enrich(&self, raw: &RawLead) -> Option<Lead> {
        let Some(id) = raw.first_str(ID_KEYS) else {
            debug!("Skipping lead without identifier");
            return None;
        };

        let name = raw.first_str(NAME_KEYS).unwrap_or_else(|| {
            [raw.first_str(&["firstName"]), raw.first_str(&["lastName"])]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ")
        });
        let phone = raw.first_str(PHONE_KEYS).unwrap_or_default();
        let (assigned_to, assignee_name) = raw.person(ASSIGNEE_KEYS);
        let (assigned_by, assigned_by_name) = raw.person(&["assignedBy", "assigned_by"]);

        Some(Lead {
            country_code: self.resolver.resolve_code(&phone),
            id,
            name,
            email: raw.first_str(EMAIL_KEYS).unwrap_or_default(),
            phone,
            status: raw
                .first_str(&["status"])
                .map(|s| LeadStatus::parse(&s))
                .unwrap_or(LeadStatus::Unknown),
            created_at: raw.timestamp(CREATED_KEYS),
            assignment: Assignment {
                assigned_to_name: assignee_name.or_else(|| raw.first_str(&["assignedToName"])),
                assigned_to,
                assigned_by_name: assigned_by_name.or_else(|| raw.first_str(&["assignedByName"])),
                assigned_by,
                assigned_at: raw.timestamp(&["assignedAt", "assigned_at"]),
                previous_assignee: raw.person(&["previousAssignee"]).0,
                notes: raw.first_str(&["assignmentNotes", "notes"]),
            },
            timeline: Vec::new(),
            optimistic: false,
        })
    }
}

/// Stable sort by creation time, newest first; undated leads go last
pub fn sort_newest_first(leads: &mut [Lead]) {
    leads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
