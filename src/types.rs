use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single recorded view of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewEvent {
    pub resource_id: i64,
    pub client_identity: String,
    pub timestamp: DateTime<Utc>,
}

/// Read-time aggregate over a resource's view log.
///
/// `views_per_day` is keyed by UTC calendar date (`YYYY-MM-DD`); a sorted map
/// keeps the serialized form stable for equal summaries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub total_views: u64,
    pub unique_clients: u64,
    pub views_per_day: BTreeMap<String, u64>,
}

/// Response of `get_analytics`: the summary plus whether it came from cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsResponse {
    pub cached: bool,
    #[serde(flatten)]
    pub summary: AnalyticsSummary,
}
