//! Check adoption: how many services pass a given check, overall and per team.
//! An excluded check is removed from both numerator and denominator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::NO_TEAM;
use crate::models::{CheckMetadata, CheckOutcome, Rank, Service};
use crate::staleness::percent;
use crate::statistics::SortDirection;

/// Per-service status for one check. Declaration order is the display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceCheckStatus {
    Pass,
    Fail,
    Excluded,
    Unknown,
}

/// Exclusion wins over any recorded outcome; the outcome is not consulted.
pub fn classify(service: &Service, check_id: &str) -> ServiceCheckStatus {
    if service.is_excluded(check_id) {
        return ServiceCheckStatus::Excluded;
    }
    match service.outcome(check_id) {
        CheckOutcome::Pass => ServiceCheckStatus::Pass,
        CheckOutcome::Fail => ServiceCheckStatus::Fail,
        CheckOutcome::Unknown => ServiceCheckStatus::Unknown,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CheckAdoption {
    pub total: usize,
    pub active_total: usize,
    pub passing: usize,
    pub failing: usize,
    pub excluded: usize,
    pub unknown: usize,
    pub percentage: u32,
}

impl CheckAdoption {
    fn record(&mut self, status: ServiceCheckStatus) {
        self.total += 1;
        match status {
            ServiceCheckStatus::Pass => self.passing += 1,
            ServiceCheckStatus::Fail => self.failing += 1,
            ServiceCheckStatus::Excluded => self.excluded += 1,
            ServiceCheckStatus::Unknown => self.unknown += 1,
        }
        self.active_total = self.total - self.excluded;
        self.percentage = percent(self.passing, self.active_total);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceCheckInfo {
    pub org: String,
    pub repo: String,
    pub name: String,
    pub score: f64,
    pub rank: Rank,
    pub check_status: ServiceCheckStatus,
    pub exclusion_reason: Option<String>,
}

impl ServiceCheckInfo {
    fn new(service: &Service, check_id: &str, status: ServiceCheckStatus) -> Self {
        Self {
            org: service.org.clone(),
            repo: service.repo.clone(),
            name: service.name.clone(),
            score: service.score,
            rank: service.rank,
            check_status: status,
            exclusion_reason: match status {
                ServiceCheckStatus::Excluded => service.exclusion_reason(check_id).map(String::from),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeamCheckAdoption {
    #[serde(flatten)]
    pub stats: CheckAdoption,
    /// Sorted pass, fail, excluded, unknown; then by descending score.
    pub services: Vec<ServiceCheckInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamAdoptionEntry {
    pub team_name: String,
    #[serde(flatten)]
    pub adoption: TeamCheckAdoption,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckAdoptionEntry {
    pub check_id: String,
    pub name: String,
    pub category: Option<String>,
    pub weight: u32,
    #[serde(flatten)]
    pub adoption: CheckAdoption,
}

pub fn overall_adoption(services: &[Service], check_id: &str) -> CheckAdoption {
    let mut stats = CheckAdoption::default();
    for service in services {
        stats.record(classify(service, check_id));
    }
    stats
}

pub fn adoption_by_team(services: &[Service], check_id: &str) -> BTreeMap<String, TeamCheckAdoption> {
    let mut teams: BTreeMap<String, TeamCheckAdoption> = BTreeMap::new();

    for service in services {
        let team = service.team_name().unwrap_or(NO_TEAM);
        let status = classify(service, check_id);
        let entry = teams.entry(team.to_string()).or_default();
        entry.stats.record(status);
        entry
            .services
            .push(ServiceCheckInfo::new(service, check_id, status));
    }

    for entry in teams.values_mut() {
        entry.services.sort_by(|a, b| {
            a.check_status
                .cmp(&b.check_status)
                .then_with(|| b.score.total_cmp(&a.score))
        });
    }

    teams
}

/// Order teams by adoption percentage. Ties keep their map order.
pub fn sort_teams_by_adoption(
    teams: BTreeMap<String, TeamCheckAdoption>,
    direction: SortDirection,
) -> Vec<TeamAdoptionEntry> {
    let mut entries: Vec<TeamAdoptionEntry> = teams
        .into_iter()
        .map(|(team_name, adoption)| TeamAdoptionEntry {
            team_name,
            adoption,
        })
        .collect();

    entries.sort_by(|a, b| {
        direction.apply(a.adoption.stats.percentage.cmp(&b.adoption.stats.percentage))
    });
    entries
}

pub fn all_checks_adoption(services: &[Service], checks: &[CheckMetadata]) -> Vec<CheckAdoptionEntry> {
    checks
        .iter()
        .map(|check| CheckAdoptionEntry {
            check_id: check.id.clone(),
            name: check.name.clone(),
            category: check.category.clone(),
            weight: check.weight,
            adoption: overall_adoption(services, &check.id),
        })
        .collect()
}

pub fn excluded_services_for_check(services: &[Service], check_id: &str) -> Vec<ServiceCheckInfo> {
    services
        .iter()
        .filter(|s| s.is_excluded(check_id))
        .map(|s| ServiceCheckInfo::new(s, check_id, ServiceCheckStatus::Excluded))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckFilter {
    Pass,
    Fail,
}

/// Services whose recorded outcome matches every required outcome.
pub fn filter_by_check_criteria<'a>(
    services: &'a [Service],
    filters: &BTreeMap<String, CheckFilter>,
) -> Vec<&'a Service> {
    services
        .iter()
        .filter(|service| {
            filters.iter().all(|(check_id, required)| {
                let actual = service.outcome(check_id);
                match required {
                    CheckFilter::Pass => actual == CheckOutcome::Pass,
                    CheckFilter::Fail => actual == CheckOutcome::Fail,
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn services(value: serde_json::Value) -> Vec<Service> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_exclusion_scenario() {
        let services = services(json!([
            {"org": "a", "repo": "one", "checks_hash": "abc", "excluded_checks": [], "check_results": {"c1": "pass"}},
            {"org": "a", "repo": "two", "checks_hash": "xyz", "excluded_checks": [{"check": "c1"}], "check_results": {}}
        ]));

        let stale: Vec<bool> = services
            .iter()
            .map(|s| crate::staleness::is_stale(s, Some("abc")))
            .collect();
        assert_eq!(stale, vec![false, true]);

        let adoption = overall_adoption(&services, "c1");
        assert_eq!(
            adoption,
            CheckAdoption {
                total: 2,
                active_total: 1,
                passing: 1,
                failing: 0,
                excluded: 1,
                unknown: 0,
                percentage: 100,
            }
        );
    }

    #[test]
    fn test_exclusion_ignores_recorded_outcome() {
        let services = services(json!([
            {"org": "a", "repo": "one", "check_results": {"c1": "fail"}, "excluded_checks": [{"check": "c1", "reason": "no api"}]}
        ]));
        let adoption = overall_adoption(&services, "c1");
        assert_eq!(adoption.failing, 0);
        assert_eq!(adoption.excluded, 1);
        assert_eq!(adoption.active_total, 0);
        assert_eq!(adoption.percentage, 0);
    }

    #[test]
    fn test_counts_always_partition_total() {
        let services = services(json!([
            {"org": "a", "repo": "1", "check_results": {"c1": "pass"}},
            {"org": "a", "repo": "2", "check_results": {"c1": "fail"}},
            {"org": "a", "repo": "3", "check_results": {"c1": "skipped"}},
            {"org": "a", "repo": "4", "check_results": {}},
            {"org": "a", "repo": "5", "excluded_checks": [{"check": "c1", "reason": "n/a"}]},
            {"org": "a", "repo": "6", "check_results": {"c1": "pass"}}
        ]));

        let a = overall_adoption(&services, "c1");
        assert_eq!(a.excluded + a.passing + a.failing + a.unknown, a.total);
        assert_eq!(a.active_total, a.total - a.excluded);
        assert_eq!(a.unknown, 2);
        assert_eq!(a.percentage, 40);
    }

    #[test]
    fn test_empty_set_is_zero() {
        assert_eq!(overall_adoption(&[], "c1"), CheckAdoption::default());
        assert!(adoption_by_team(&[], "c1").is_empty());
    }

    #[test]
    fn test_by_team_groups_and_orders_services() {
        let services = services(json!([
            {"org": "a", "repo": "u", "score": 99, "team": "Core", "check_results": {}},
            {"org": "a", "repo": "x", "score": 90, "team": "Core", "excluded_checks": [{"check": "c1", "reason": "legacy"}]},
            {"org": "a", "repo": "f", "score": 50, "team": "Core", "check_results": {"c1": "fail"}},
            {"org": "a", "repo": "p1", "score": 40, "team": "Core", "check_results": {"c1": "pass"}},
            {"org": "a", "repo": "p2", "score": 70, "team": {"primary": "Core"}, "check_results": {"c1": "pass"}},
            {"org": "a", "repo": "lone", "score": 10, "check_results": {"c1": "pass"}}
        ]));

        let teams = adoption_by_team(&services, "c1");
        assert_eq!(teams.len(), 2);

        let core = &teams["Core"];
        assert_eq!(core.stats.total, 5);
        assert_eq!(core.stats.active_total, 4);
        assert_eq!(core.stats.percentage, 50);
        let order: Vec<&str> = core.services.iter().map(|s| s.repo.as_str()).collect();
        assert_eq!(order, vec!["p2", "p1", "f", "x", "u"]);
        assert_eq!(core.services[3].exclusion_reason.as_deref(), Some("legacy"));
        assert!(core.services[0].exclusion_reason.is_none());

        let none = &teams[NO_TEAM];
        assert_eq!(none.stats.percentage, 100);
    }

    #[test]
    fn test_by_team_is_idempotent() {
        let services = services(json!([
            {"org": "a", "repo": "1", "score": 60, "team": "B", "check_results": {"c1": "pass"}},
            {"org": "a", "repo": "2", "score": 60, "team": "B", "check_results": {"c1": "pass"}},
            {"org": "a", "repo": "3", "score": 20, "team": "A", "check_results": {"c1": "fail"}}
        ]));
        assert_eq!(adoption_by_team(&services, "c1"), adoption_by_team(&services, "c1"));
    }

    #[test]
    fn test_sort_teams_by_adoption() {
        let services = services(json!([
            {"org": "a", "repo": "1", "team": "Low", "check_results": {"c1": "fail"}},
            {"org": "a", "repo": "2", "team": "High", "check_results": {"c1": "pass"}},
            {"org": "a", "repo": "3", "team": "Mid", "check_results": {"c1": "pass"}},
            {"org": "a", "repo": "4", "team": "Mid", "check_results": {"c1": "fail"}},
            {"org": "a", "repo": "5", "team": "Also High", "check_results": {"c1": "pass"}}
        ]));

        let desc = sort_teams_by_adoption(adoption_by_team(&services, "c1"), SortDirection::Desc);
        let names: Vec<&str> = desc.iter().map(|e| e.team_name.as_str()).collect();
        assert_eq!(names, vec!["Also High", "High", "Mid", "Low"]);

        let asc = sort_teams_by_adoption(adoption_by_team(&services, "c1"), SortDirection::Asc);
        assert_eq!(asc[0].team_name, "Low");
        assert_eq!(asc[3].adoption.stats.percentage, 100);
    }

    #[test]
    fn test_all_checks_and_excluded_list() {
        let services = services(json!([
            {"org": "a", "repo": "1", "check_results": {"readme": "pass", "license": "fail"}},
            {"org": "a", "repo": "2", "excluded_checks": [{"check": "license", "reason": "internal"}]}
        ]));
        let checks: Vec<CheckMetadata> = serde_json::from_value(json!([
            {"id": "readme", "name": "README", "category": "Docs"},
            {"id": "license", "name": "License", "weight": 5}
        ]))
        .unwrap();

        let all = all_checks_adoption(&services, &checks);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].adoption.percentage, 50);
        assert_eq!(all[1].adoption.excluded, 1);
        assert_eq!(all[1].weight, 5);

        let excluded = excluded_services_for_check(&services, "license");
        assert_eq!(excluded.len(), 1);
        assert_eq!(excluded[0].exclusion_reason.as_deref(), Some("internal"));
    }

    #[test]
    fn test_filter_by_check_criteria() {
        let services = services(json!([
            {"org": "a", "repo": "1", "check_results": {"readme": "pass", "license": "fail"}},
            {"org": "a", "repo": "2", "check_results": {"readme": "pass", "license": "pass"}},
            {"org": "a", "repo": "3", "check_results": {}}
        ]));

        let mut filters = BTreeMap::new();
        assert_eq!(filter_by_check_criteria(&services, &filters).len(), 3);

        filters.insert("readme".to_string(), CheckFilter::Pass);
        filters.insert("license".to_string(), CheckFilter::Fail);
        let matched = filter_by_check_criteria(&services, &filters);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].repo, "1");
    }
}
