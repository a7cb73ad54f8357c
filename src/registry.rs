use futures::future::join_all;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::TimedCache;
use crate::config::{
    ALL_CHECKS_PATH, ALL_SERVICES_PATH, ALL_TEAMS_PATH, CHECKS_MANIFEST_TTL_SECS,
    CURRENT_CHECKS_PATH, CURRENT_CHECKS_TTL_SECS, TEAMS_REGISTRY_TTL_SECS,
};
use crate::error::SyncError;
use crate::fetch::HybridFetchClient;
use crate::models::{
    ChecksManifest, CurrentChecks, RegistryEntry, Service, ServiceDetail, ServiceRegistry,
    TeamEntry, TeamsRegistry,
};

#[derive(Debug, Clone)]
pub struct LoadedServices {
    pub services: Vec<Service>,
    pub used_api: bool,
}

#[derive(Debug, Clone)]
pub struct LoadedTeams {
    pub teams: Option<Arc<TeamsRegistry>>,
    pub used_api: bool,
}

#[derive(Deserialize)]
struct GitTree {
    #[serde(default)]
    tree: Vec<GitTreeItem>,
}

#[derive(Deserialize)]
struct GitTreeItem {
    path: String,
    #[serde(rename = "type", default)]
    kind: String,
}

/// Typed access to the catalog branch. Manifest, fingerprint and team
/// registry reads go through their own TTL caches.
pub struct RegistryClient {
    fetcher: Arc<HybridFetchClient>,
    manifest: TimedCache<Arc<ChecksManifest>>,
    current: TimedCache<Arc<CurrentChecks>>,
    teams: TimedCache<Arc<TeamsRegistry>>,
}

impl RegistryClient {
    pub fn new(fetcher: Arc<HybridFetchClient>) -> Self {
        Self::with_ttls(
            fetcher,
            Duration::from_secs(CHECKS_MANIFEST_TTL_SECS),
            Duration::from_secs(CURRENT_CHECKS_TTL_SECS),
            Duration::from_secs(TEAMS_REGISTRY_TTL_SECS),
        )
    }

    pub fn with_ttls(
        fetcher: Arc<HybridFetchClient>,
        manifest_ttl: Duration,
        current_ttl: Duration,
        teams_ttl: Duration,
    ) -> Self {
        Self {
            fetcher,
            manifest: TimedCache::new(manifest_ttl),
            current: TimedCache::new(current_ttl),
            teams: TimedCache::new(teams_ttl),
        }
    }

    /// Load every service, preferring the consolidated registry file and
    /// falling back to discovering the per-service files on the branch.
    pub async fn load_services(&self) -> Result<LoadedServices, SyncError> {
        match self.fetcher.fetch_json::<ServiceRegistry>(ALL_SERVICES_PATH).await {
            Ok((ServiceRegistry { services: Some(services), generated_at }, used_api)) => {
                info!(
                    "Loaded {} services from consolidated registry (generated at {})",
                    services.len(),
                    generated_at.as_deref().unwrap_or("unknown")
                );
                return Ok(LoadedServices { services, used_api });
            }
            Ok(_) => warn!("Consolidated registry has no service list, discovering files"),
            Err(e) => warn!("Failed to load consolidated registry ({}), discovering files", e),
        }

        self.discover_services().await
    }

    async fn discover_services(&self) -> Result<LoadedServices, SyncError> {
        let config = self.fetcher.config();
        let endpoint = format!(
            "/repos/{}/{}/git/trees/{}?recursive=1",
            config.repo_owner, config.repo_name, config.catalog_branch
        );
        let tree: GitTree = self.fetcher.api_get_json(&endpoint).await?;

        let paths: Vec<String> = tree
            .tree
            .into_iter()
            .filter(|item| item.kind.is_empty() || item.kind == "blob")
            .map(|item| item.path)
            .filter(|path| {
                path.starts_with("registry/")
                    && path.ends_with(".json")
                    && path != ALL_SERVICES_PATH
            })
            .collect();

        if paths.is_empty() {
            return Err(SyncError::NoServices);
        }

        let results = join_all(
            paths
                .iter()
                .map(|path| self.fetcher.fetch_json::<Service>(path)),
        )
        .await;

        let mut used_api = false;
        let mut services = Vec::with_capacity(results.len());
        for (path, result) in paths.iter().zip(results) {
            match result {
                Ok((service, api)) => {
                    used_api |= api;
                    services.push(service);
                }
                Err(e) => debug!("Skipping registry file {}: {}", path, e),
            }
        }

        info!("Loaded {} services via tree discovery", services.len());
        Ok(LoadedServices { services, used_api })
    }

    /// Scoring detail for one service, with installation metadata from its
    /// registry entry merged in when that entry is readable.
    pub async fn load_service_detail(
        &self,
        org: &str,
        repo: &str,
    ) -> Result<ServiceDetail, SyncError> {
        let results_path = format!("results/{}/{}/results.json", org, repo);
        let registry_path = format!("registry/{}/{}.json", org, repo);

        let (results, entry) = futures::join!(
            self.fetcher.fetch_json::<ServiceDetail>(&results_path),
            self.fetcher.fetch_json::<RegistryEntry>(&registry_path),
        );

        let (mut detail, _) = results?;
        match entry {
            Ok((entry, _)) => {
                if entry.installation_pr.is_some() {
                    detail.service.installation_pr = entry.installation_pr;
                }
                if entry.default_branch.is_some() {
                    detail.service.default_branch = entry.default_branch;
                }
            }
            Err(e) => debug!("No registry entry for {}/{}: {}", org, repo, e),
        }
        Ok(detail)
    }

    pub async fn load_checks(&self) -> Result<Arc<ChecksManifest>, SyncError> {
        self.manifest
            .get_or_fetch(ALL_CHECKS_PATH, || async {
                let (manifest, _) = self.fetcher.fetch_json::<ChecksManifest>(ALL_CHECKS_PATH).await?;
                info!("Loaded {} checks (version {})", manifest.checks.len(), manifest.version);
                Ok::<_, SyncError>(Arc::new(manifest))
            })
            .await
    }

    /// The published fingerprint of the live check suite. Any failure reads
    /// as unknown, which never marks a service stale.
    pub async fn current_fingerprint(&self) -> Option<String> {
        let result = self
            .current
            .get_or_fetch(CURRENT_CHECKS_PATH, || async {
                let (current, _) = self
                    .fetcher
                    .fetch_json::<CurrentChecks>(CURRENT_CHECKS_PATH)
                    .await?;
                debug!(
                    "Current checks hash {} ({} checks, generated at {})",
                    current.checks_hash,
                    current.checks_count.unwrap_or(0),
                    current.generated_at.as_deref().unwrap_or("unknown")
                );
                Ok::<_, SyncError>(Arc::new(current))
            })
            .await;

        match result {
            Ok(current) if !current.checks_hash.is_empty() => Some(current.checks_hash.clone()),
            Ok(_) => None,
            Err(e) => {
                warn!("Error fetching current checks hash: {}", e);
                None
            }
        }
    }

    /// Team registry; a failed load yields no registry rather than an error.
    pub async fn load_teams(&self, force_refresh: bool) -> LoadedTeams {
        if !force_refresh {
            if let Some(teams) = self.teams.get_fresh(ALL_TEAMS_PATH).await {
                debug!("Using cached teams data");
                return LoadedTeams {
                    teams: Some(teams),
                    used_api: false,
                };
            }
        }

        match self.fetcher.fetch_json::<TeamsRegistry>(ALL_TEAMS_PATH).await {
            Ok((teams, used_api)) => {
                info!(
                    "Loaded {} teams from registry (generated at {})",
                    teams.count.unwrap_or(teams.teams.len()),
                    teams.generated_at.as_deref().unwrap_or("unknown")
                );
                let teams = Arc::new(teams);
                self.teams.insert(ALL_TEAMS_PATH, teams.clone()).await;
                LoadedTeams {
                    teams: Some(teams),
                    used_api,
                }
            }
            Err(e) => {
                warn!("Failed to load teams registry: {}", e);
                LoadedTeams {
                    teams: None,
                    used_api: false,
                }
            }
        }
    }

    pub async fn load_team(&self, team_id: &str) -> Result<TeamEntry, SyncError> {
        let path = format!("teams/{}.json", team_id);
        let (team, _) = self.fetcher.fetch_json::<TeamEntry>(&path).await?;
        Ok(team)
    }

    pub async fn clear_checks_cache(&self) {
        self.manifest.invalidate(ALL_CHECKS_PATH).await;
        self.current.invalidate(CURRENT_CHECKS_PATH).await;
    }
}
