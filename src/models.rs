use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// --- Ranks ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Platinum,
    Gold,
    Silver,
    Bronze,
}

impl Rank {
    pub const ALL: [Rank; 4] = [Rank::Platinum, Rank::Gold, Rank::Silver, Rank::Bronze];

    pub fn from_score(score: f64) -> Rank {
        if score >= 90.0 {
            Rank::Platinum
        } else if score >= 75.0 {
            Rank::Gold
        } else if score >= 50.0 {
            Rank::Silver
        } else {
            Rank::Bronze
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Rank::Platinum => "Platinum",
            Rank::Gold => "Gold",
            Rank::Silver => "Silver",
            Rank::Bronze => "Bronze",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankCounts {
    pub platinum: usize,
    pub gold: usize,
    pub silver: usize,
    pub bronze: usize,
}

impl RankCounts {
    pub fn get(&self, rank: Rank) -> usize {
        match rank {
            Rank::Platinum => self.platinum,
            Rank::Gold => self.gold,
            Rank::Silver => self.silver,
            Rank::Bronze => self.bronze,
        }
    }

    pub fn increment(&mut self, rank: Rank) {
        match rank {
            Rank::Platinum => self.platinum += 1,
            Rank::Gold => self.gold += 1,
            Rank::Silver => self.silver += 1,
            Rank::Bronze => self.bronze += 1,
        }
    }
}

// --- Check outcomes ---

/// Recorded result of one check for one service. Anything other than
/// pass/fail (error, skipped, a status we do not know) reads as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckOutcome {
    Pass,
    Fail,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedCheck {
    pub check: String,
    #[serde(default)]
    pub reason: String,
}

// --- Team reference ---

/// Canonical team assignment. Registry data carries either a bare team name
/// or a structured object; both are normalized into this shape on ingestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamRef {
    pub primary: String,
    pub all: Vec<String>,
    pub github_org: Option<String>,
    pub github_slug: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawTeam {
    Name(String),
    Info {
        #[serde(default)]
        primary: Option<String>,
        #[serde(default)]
        all: Option<Vec<String>>,
        #[serde(default)]
        github_org: Option<String>,
        #[serde(default)]
        github_slug: Option<String>,
    },
}

impl TeamRef {
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        TeamRef {
            primary: name.clone(),
            all: vec![name],
            github_org: None,
            github_slug: None,
        }
    }

    fn from_raw(raw: RawTeam) -> Option<TeamRef> {
        match raw {
            RawTeam::Name(name) => {
                let name = name.trim();
                (!name.is_empty()).then(|| TeamRef::named(name))
            }
            RawTeam::Info {
                primary,
                all,
                github_org,
                github_slug,
            } => {
                let mut all: Vec<String> = all
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|t| !t.trim().is_empty())
                    .collect();
                let primary = primary
                    .filter(|p| !p.trim().is_empty())
                    .or_else(|| all.first().cloned())?;
                if !all.contains(&primary) {
                    all.insert(0, primary.clone());
                }
                Some(TeamRef {
                    primary,
                    all,
                    github_org: github_org.filter(|s| !s.is_empty()),
                    github_slug: github_slug.filter(|s| !s.is_empty()),
                })
            }
        }
    }

    /// True when the registry provided GitHub linking info for this team.
    pub fn has_github_info(&self) -> bool {
        self.github_org.is_some() || self.github_slug.is_some()
    }
}

// --- Installation ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrState {
    Open,
    Merged,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallationPr {
    pub number: u64,
    pub url: String,
    pub state: PrState,
    #[serde(default)]
    pub updated_at: Option<String>,
}

// --- Service ---

/// One scored repository, as published by the scoring pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ServiceRecord")]
pub struct Service {
    pub org: String,
    pub repo: String,
    pub name: String,
    pub score: f64,
    pub rank: Rank,
    pub check_results: BTreeMap<String, CheckOutcome>,
    pub excluded_checks: Vec<ExcludedCheck>,
    pub checks_hash: Option<String>,
    pub checks_count: Option<u32>,
    pub installed: bool,
    pub installation_pr: Option<InstallationPr>,
    pub last_updated: Option<DateTime<Utc>>,
    pub default_branch: Option<String>,
    pub has_api: bool,
    pub team: Option<TeamRef>,
}

/// Wire shape of a service; tolerant of nulls and missing fields.
#[derive(Deserialize)]
struct ServiceRecord {
    org: String,
    repo: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    rank: Option<Rank>,
    #[serde(default)]
    check_results: Option<BTreeMap<String, CheckOutcome>>,
    #[serde(default)]
    excluded_checks: Option<Vec<ExcludedCheck>>,
    #[serde(default)]
    checks_hash: Option<String>,
    #[serde(default)]
    checks_count: Option<u32>,
    #[serde(default)]
    installed: Option<bool>,
    #[serde(default)]
    installation_pr: Option<InstallationPr>,
    #[serde(default)]
    last_updated: Option<String>,
    #[serde(default)]
    default_branch: Option<String>,
    #[serde(default)]
    has_api: Option<bool>,
    #[serde(default)]
    team: Option<RawTeam>,
}

impl From<ServiceRecord> for Service {
    fn from(record: ServiceRecord) -> Self {
        let score = record.score.unwrap_or(0.0);
        Service {
            name: record.name.unwrap_or_else(|| record.repo.clone()),
            org: record.org,
            repo: record.repo,
            score,
            rank: record.rank.unwrap_or_else(|| Rank::from_score(score)),
            check_results: record.check_results.unwrap_or_default(),
            excluded_checks: record.excluded_checks.unwrap_or_default(),
            checks_hash: record.checks_hash.filter(|h| !h.is_empty()),
            checks_count: record.checks_count,
            installed: record.installed.unwrap_or(false),
            installation_pr: record.installation_pr,
            last_updated: record
                .last_updated
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            default_branch: record.default_branch,
            has_api: record.has_api.unwrap_or(false),
            team: record.team.and_then(TeamRef::from_raw),
        }
    }
}

impl Service {
    pub fn key(&self) -> String {
        format!("{}/{}", self.org, self.repo)
    }

    pub fn team_name(&self) -> Option<&str> {
        self.team.as_ref().map(|t| t.primary.as_str())
    }

    pub fn all_teams(&self) -> &[String] {
        self.team.as_ref().map(|t| t.all.as_slice()).unwrap_or(&[])
    }

    pub fn is_excluded(&self, check_id: &str) -> bool {
        self.excluded_checks.iter().any(|e| e.check == check_id)
    }

    pub fn exclusion_reason(&self, check_id: &str) -> Option<&str> {
        self.excluded_checks
            .iter()
            .find(|e| e.check == check_id)
            .map(|e| e.reason.as_str())
    }

    pub fn outcome(&self, check_id: &str) -> CheckOutcome {
        self.check_results
            .get(check_id)
            .copied()
            .unwrap_or(CheckOutcome::Unknown)
    }
}

/// Consolidated `registry/all-services.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceRegistry {
    #[serde(default)]
    pub services: Option<Vec<Service>>,
    #[serde(default)]
    pub generated_at: Option<String>,
}

/// Per-service `registry/{org}/{repo}.json` installation metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryEntry {
    #[serde(default)]
    pub installation_pr: Option<InstallationPr>,
    #[serde(default)]
    pub default_branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub check_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub weight: u32,
    pub status: String,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub duration: f64,
}

/// `results/{org}/{repo}/results.json` merged with its registry entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDetail {
    #[serde(flatten)]
    pub service: Service,
    #[serde(default)]
    pub checks: Vec<CheckResult>,
}

// --- Checks manifest ---

pub const DEFAULT_CHECK_WEIGHT: u32 = 10;

fn default_check_weight() -> u32 {
    DEFAULT_CHECK_WEIGHT
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckMetadata {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_check_weight")]
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecksManifest {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub checks: Vec<CheckMetadata>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub checks_hash: Option<String>,
}

impl ChecksManifest {
    pub fn check(&self, check_id: &str) -> Option<&CheckMetadata> {
        self.checks.iter().find(|c| c.id == check_id)
    }

    /// Checks grouped by category, in declared category order, with any
    /// undeclared categories appended in first-seen order.
    pub fn by_category(&self) -> Vec<(String, Vec<&CheckMetadata>)> {
        let mut groups: Vec<(String, Vec<&CheckMetadata>)> = Vec::new();
        for check in &self.checks {
            let category = check.category.as_deref().unwrap_or("Other");
            match groups.iter_mut().find(|(name, _)| name == category) {
                Some((_, members)) => members.push(check),
                None => groups.push((category.to_string(), vec![check])),
            }
        }

        let position = |name: &str| {
            self.categories
                .iter()
                .position(|c| c == name)
                .unwrap_or(usize::MAX)
        };
        groups.sort_by_key(|(name, _)| position(name));
        groups
    }
}

/// `current-checks.json`: the published fingerprint of the live check suite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentChecks {
    pub checks_hash: String,
    #[serde(default)]
    pub checks_count: Option<u32>,
    #[serde(default)]
    pub generated_at: Option<String>,
}

// --- Teams registry ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// `teams/all-teams.json`, keyed by team id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamsRegistry {
    #[serde(default)]
    pub teams: BTreeMap<String, TeamEntry>,
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub generated_at: Option<String>,
}

// --- Workflow runs ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    Waiting,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunConclusion {
    Success,
    Failure,
    Cancelled,
    Skipped,
    TimedOut,
    ActionRequired,
    Neutral,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    pub status: RunStatus,
    #[serde(default)]
    pub conclusion: Option<RunConclusion>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub run_started_at: Option<DateTime<Utc>>,
    pub html_url: String,
    #[serde(default)]
    pub head_branch: Option<String>,
    #[serde(default)]
    pub head_sha: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRunsPage {
    #[serde(default)]
    pub workflow_runs: Vec<WorkflowRun>,
    #[serde(default)]
    pub total_count: u64,
}
