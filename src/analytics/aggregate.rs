use crate::types::{AnalyticsSummary, ViewEvent};
use std::collections::{BTreeMap, HashSet};

/// Summarize a resource's view log.
///
/// All three metrics are order-independent reductions, so the result only
/// depends on the multiset of events passed in.
pub fn compute(events: &[ViewEvent]) -> AnalyticsSummary {
    let mut clients = HashSet::new();
    let mut views_per_day: BTreeMap<String, u64> = BTreeMap::new();

    for event in events {
        clients.insert(event.client_identity.as_str());
        let day = event.timestamp.date_naive().format("%Y-%m-%d").to_string();
        *views_per_day.entry(day).or_insert(0) += 1;
    }

    AnalyticsSummary {
        total_views: events.len() as u64,
        unique_clients: clients.len() as u64,
        views_per_day,
    }
}
