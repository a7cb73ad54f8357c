//! Per-team aggregates and their merge with the published teams registry.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::models::{Rank, RankCounts, Service, TeamsRegistry};
use crate::staleness::is_stale;
use crate::statistics::{average_score, count_by_rank, SortDirection};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeamStats {
    pub name: String,
    pub service_count: usize,
    pub average_score: u32,
    pub rank_distribution: RankCounts,
    pub stale_count: usize,
    pub installed_count: usize,
    pub github_org: Option<String>,
    pub github_slug: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamSortKey {
    Name,
    ServiceCount,
    AverageScore,
    StaleCount,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedTeam {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub aliases: Vec<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub statistics: TeamStats,
}

/// Stats for every team that owns at least one service, keyed by primary
/// team name. Unowned services are not counted anywhere.
pub fn stats_for(services: &[Service], fingerprint: Option<&str>) -> BTreeMap<String, TeamStats> {
    let mut grouped: BTreeMap<&str, Vec<&Service>> = BTreeMap::new();
    for service in services {
        if let Some(team) = service.team_name() {
            grouped.entry(team).or_default().push(service);
        }
    }

    grouped
        .into_iter()
        .map(|(name, members)| {
            let linked = members
                .iter()
                .filter_map(|s| s.team.as_ref())
                .find(|t| t.has_github_info());

            let stats = TeamStats {
                name: name.to_string(),
                service_count: members.len(),
                average_score: average_score(members.iter().copied()),
                rank_distribution: count_by_rank(members.iter().copied()),
                stale_count: members.iter().filter(|s| is_stale(s, fingerprint)).count(),
                installed_count: members.iter().filter(|s| s.installed).count(),
                github_org: linked.and_then(|t| t.github_org.clone()),
                github_slug: linked.and_then(|t| t.github_slug.clone()),
            };
            (name.to_string(), stats)
        })
        .collect()
}

pub fn services_without_team(services: &[Service]) -> Vec<&Service> {
    services.iter().filter(|s| s.team.is_none()).collect()
}

/// Services owned by `team`, as primary or secondary owner.
pub fn services_for_team<'a>(services: &'a [Service], team: &str) -> Vec<&'a Service> {
    services
        .iter()
        .filter(|s| s.all_teams().iter().any(|t| t == team))
        .collect()
}

/// Every team name mentioned by any service, sorted.
pub fn unique_teams(services: &[Service]) -> Vec<String> {
    services
        .iter()
        .flat_map(|s| s.all_teams().iter().cloned())
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}

pub fn sort_team_stats(mut teams: Vec<TeamStats>, key: TeamSortKey, direction: SortDirection) -> Vec<TeamStats> {
    teams.sort_by(|a, b| {
        let ordering = match key {
            TeamSortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            TeamSortKey::ServiceCount => a.service_count.cmp(&b.service_count),
            TeamSortKey::AverageScore => a.average_score.cmp(&b.average_score),
            TeamSortKey::StaleCount => a.stale_count.cmp(&b.stale_count),
        };
        direction.apply(ordering)
    });
    teams
}

pub fn team_rank(average_score: u32) -> Rank {
    Rank::from_score(f64::from(average_score))
}

/// Non-zero rank buckets in rank order, e.g. "2 Gold, 1 Bronze".
pub fn rank_summary(counts: &RankCounts) -> String {
    let parts: Vec<String> = Rank::ALL
        .iter()
        .filter(|rank| counts.get(**rank) > 0)
        .map(|rank| format!("{} {}", counts.get(*rank), rank.label()))
        .collect();
    if parts.is_empty() {
        "No services".to_string()
    } else {
        parts.join(", ")
    }
}

/// Registry id for a team that only exists in computed stats. Each run of
/// whitespace becomes one hyphen, including at the edges.
pub fn derived_team_id(name: &str) -> String {
    let mut id = String::with_capacity(name.len());
    let mut in_space = false;
    for c in name.to_lowercase().chars() {
        if c.is_whitespace() {
            if !in_space {
                id.push('-');
            }
            in_space = true;
        } else {
            id.push(c);
            in_space = false;
        }
    }
    id
}

/// `base`, or `base-2`, `base-3`... when the id is already taken.
fn free_team_id(merged: &BTreeMap<String, MergedTeam>, base: String) -> String {
    if !merged.contains_key(&base) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !merged.contains_key(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Every registry team (zero stats when it owns nothing) plus every computed
/// team no registry entry took, keyed by team id. No computed team is lost:
/// one whose derived id is already taken gets a suffixed id.
pub fn merge_with_registry(
    registry: Option<&TeamsRegistry>,
    computed: &BTreeMap<String, TeamStats>,
) -> BTreeMap<String, MergedTeam> {
    let mut merged = BTreeMap::new();
    let mut consumed: BTreeSet<&str> = BTreeSet::new();

    if let Some(registry) = registry {
        for (id, entry) in &registry.teams {
            let name = entry.name.clone().unwrap_or_else(|| id.clone());
            let matched = computed
                .get_key_value(&name)
                .filter(|(computed_name, _)| !consumed.contains(computed_name.as_str()))
                .or_else(|| {
                    computed.iter().find(|(computed_name, _)| {
                        !consumed.contains(computed_name.as_str())
                            && derived_team_id(computed_name) == *id
                    })
                });

            let statistics = match matched {
                Some((computed_name, stats)) => {
                    consumed.insert(computed_name.as_str());
                    stats.clone()
                }
                None => TeamStats {
                    name: name.clone(),
                    ..TeamStats::default()
                },
            };
            merged.insert(
                id.clone(),
                MergedTeam {
                    id: id.clone(),
                    name,
                    description: entry.description.clone(),
                    aliases: entry.aliases.clone(),
                    metadata: entry.metadata.clone(),
                    statistics,
                },
            );
        }
    }

    for (name, stats) in computed {
        if consumed.contains(name.as_str()) {
            continue;
        }
        let id = free_team_id(&merged, derived_team_id(name));
        merged.insert(
            id.clone(),
            MergedTeam {
                id,
                name: name.clone(),
                description: None,
                aliases: Vec::new(),
                metadata: serde_json::Map::new(),
                statistics: stats.clone(),
            },
        );
    }

    merged
}
