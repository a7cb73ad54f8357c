use serde::{Deserialize, Serialize};

use crate::models::{RankCounts, Service};
use crate::staleness::is_stale;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ServiceStats {
    pub total: usize,
    pub avg_score: u32,
    pub ranks: RankCounts,
    pub api_count: usize,
    pub stale_count: usize,
    pub installed_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// Orient an ascending comparison.
    pub fn apply(self, ordering: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

pub fn count_by_rank<'a>(services: impl IntoIterator<Item = &'a Service>) -> RankCounts {
    let mut counts = RankCounts::default();
    for service in services {
        counts.increment(service.rank);
    }
    counts
}

/// Rounded mean score; 0 for an empty set.
pub fn average_score<'a>(services: impl IntoIterator<Item = &'a Service>) -> u32 {
    let (sum, count) = services
        .into_iter()
        .fold((0.0, 0usize), |(sum, n), s| (sum + s.score, n + 1));
    if count == 0 {
        return 0;
    }
    (sum / count as f64).round().max(0.0) as u32
}

pub fn service_stats(services: &[Service], fingerprint: Option<&str>) -> ServiceStats {
    ServiceStats {
        total: services.len(),
        avg_score: average_score(services),
        ranks: count_by_rank(services),
        api_count: services.iter().filter(|s| s.has_api).count(),
        stale_count: services.iter().filter(|s| is_stale(s, fingerprint)).count(),
        installed_count: services.iter().filter(|s| s.installed).count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_service_stats() {
        let services: Vec<Service> = serde_json::from_value(json!([
            {"org": "a", "repo": "one", "score": 92, "has_api": true, "installed": true, "checks_hash": "h1"},
            {"org": "a", "repo": "two", "score": 61, "checks_hash": "h0"},
            {"org": "a", "repo": "three", "score": 40, "installed": true, "checks_hash": "h1"}
        ]))
        .unwrap();

        let stats = service_stats(&services, Some("h1"));
        assert_eq!(stats.total, 3);
        assert_eq!(stats.avg_score, 64);
        assert_eq!(stats.ranks.platinum, 1);
        assert_eq!(stats.ranks.silver, 1);
        assert_eq!(stats.ranks.bronze, 1);
        assert_eq!(stats.api_count, 1);
        assert_eq!(stats.stale_count, 1);
        assert_eq!(stats.installed_count, 2);
    }

    #[test]
    fn test_empty_stats() {
        let stats = service_stats(&[], None);
        assert_eq!(stats, ServiceStats::default());
        assert_eq!(average_score(std::iter::empty()), 0);
    }
}
