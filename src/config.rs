use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Scorecards sync: keeps registry, checks and workflow data fresh for the dashboard.
#[derive(Parser, Debug, Clone)]
#[command(name = "scorecards-sync")]
pub struct CliArgs {
    /// Owner of the scorecards repository
    #[arg(short = 'o', long = "repo-owner")]
    pub repo_owner: String,

    /// Name of the scorecards repository
    #[arg(short = 'r', long = "repo-name", default_value = DEFAULT_REPO_NAME)]
    pub repo_name: String,

    /// Branch holding the published catalog
    #[arg(short = 'b', long = "catalog-branch", default_value = DEFAULT_CATALOG_BRANCH)]
    pub catalog_branch: String,

    /// GitHub REST API base URL
    #[arg(long = "api-base", default_value = GITHUB_API_BASE)]
    pub api_base: String,

    /// Public raw-content mirror base URL
    #[arg(long = "mirror-base", default_value = RAW_MIRROR_BASE)]
    pub mirror_base: String,

    /// HTTP port for the local dashboard API
    #[arg(long = "port", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Settings file (poll interval preferences)
    #[arg(long = "settings-file")]
    pub settings_file: Option<PathBuf>,

    /// Per-request fetch timeout in seconds (0 waits indefinitely)
    #[arg(long = "fetch-timeout-secs", default_value_t = DEFAULT_FETCH_TIMEOUT_SECS)]
    pub fetch_timeout_secs: u64,

    /// Personal access token, kept in memory only
    #[arg(long = "token", env = "SCORECARDS_GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub repo_owner: String,
    pub repo_name: String,
    pub catalog_branch: String,
    pub api_base: String,
    pub mirror_base: String,
    pub port: u16,
    pub settings_path: PathBuf,
    pub fetch_timeout: Option<Duration>,
}

// Repository defaults
pub const DEFAULT_REPO_NAME: &str = "scorecards";
pub const DEFAULT_CATALOG_BRANCH: &str = "catalog";
pub const GITHUB_API_BASE: &str = "https://api.github.com";
pub const RAW_MIRROR_BASE: &str = "https://raw.githubusercontent.com";
pub const DEFAULT_PORT: u16 = 8787;

// Request constants
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
pub const RAW_ACCEPT_HEADER: &str = "application/vnd.github.raw";
pub const JSON_ACCEPT_HEADER: &str = "application/vnd.github.v3+json";
pub const USER_AGENT: &str = concat!("scorecards-sync/", env!("CARGO_PKG_VERSION"));
pub const WORKFLOW_RUNS_PER_PAGE: u32 = 25;

// Cache TTLs
pub const CHECKS_MANIFEST_TTL_SECS: u64 = 300; // 5 minutes
pub const CURRENT_CHECKS_TTL_SECS: u64 = 10;
pub const TEAMS_REGISTRY_TTL_SECS: u64 = 60;
pub const WORKFLOW_RUNS_TTL_SECS: u64 = 15;

// Polling constants
pub const WORKFLOW_POLL_DEFAULT_MS: u64 = 30_000;
pub const WORKFLOW_POLL_MIN_MS: u64 = 10_000;
pub const WORKFLOW_POLL_MAX_MS: u64 = 120_000;
pub const WIDGET_RECENT_HOURS: i64 = 24;
pub const SERVICE_RECENT_HOURS: i64 = 168; // 7 days
pub const OFFLINE_AFTER_CONSECUTIVE_FAILURES: u32 = 3;

// Resource paths on the catalog branch
pub const ALL_SERVICES_PATH: &str = "registry/all-services.json";
pub const ALL_TEAMS_PATH: &str = "teams/all-teams.json";
pub const ALL_CHECKS_PATH: &str = "all-checks.json";
pub const CURRENT_CHECKS_PATH: &str = "current-checks.json";

pub const NO_TEAM: &str = "No Team";

impl SyncConfig {
    pub fn from_args(args: CliArgs) -> Self {
        let settings_path = args.settings_file.unwrap_or_else(default_settings_path);
        let fetch_timeout = match args.fetch_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        SyncConfig {
            repo_owner: args.repo_owner,
            repo_name: args.repo_name,
            catalog_branch: args.catalog_branch,
            api_base: args.api_base.trim_end_matches('/').to_string(),
            mirror_base: args.mirror_base.trim_end_matches('/').to_string(),
            port: args.port,
            settings_path,
            fetch_timeout,
        }
    }

    /// Authenticated contents URL for a catalog path.
    pub fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}?ref={}",
            self.api_base, self.repo_owner, self.repo_name, path, self.catalog_branch
        )
    }

    /// Mirror URL for a catalog path, without the cache-busting parameter.
    pub fn mirror_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.mirror_base, self.repo_owner, self.repo_name, self.catalog_branch, path
        )
    }

    pub fn api_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.api_base, endpoint)
    }
}

fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("scorecards-sync")
        .join("settings.json")
}

/// Accepts 0 (disabled) or an interval within the selector bounds.
pub fn is_valid_poll_interval(interval_ms: u64) -> bool {
    interval_ms == 0 || (WORKFLOW_POLL_MIN_MS..=WORKFLOW_POLL_MAX_MS).contains(&interval_ms)
}
