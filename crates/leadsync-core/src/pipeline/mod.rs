//! Fetch pipelines feeding the sync cache.

mod leads;
mod team;

pub use leads::{sort_newest_first, FetchSource, LeadFetchPipeline, LeadFetchReport};
pub use team::{rank_by_availability, TeamFetchPipeline};
