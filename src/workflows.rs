//! Live workflow-run lists for the polled surfaces. Each surface holds the
//! last good run list for its scope; a tick replaces it wholesale.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::TimedCache;
use crate::config::{
    OFFLINE_AFTER_CONSECUTIVE_FAILURES, SERVICE_RECENT_HOURS, WIDGET_RECENT_HOURS,
    WORKFLOW_RUNS_PER_PAGE, WORKFLOW_RUNS_TTL_SECS,
};
use crate::error::SyncError;
use crate::fetch::HybridFetchClient;
use crate::models::{RunStatus, WorkflowRun, WorkflowRunsPage};
use crate::polling::{PollScope, PollTask};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunFilter {
    #[default]
    All,
    InProgress,
    Queued,
    Completed,
}

impl RunFilter {
    pub fn matches(&self, run: &WorkflowRun) -> bool {
        match self {
            RunFilter::All => true,
            RunFilter::InProgress => run.status == RunStatus::InProgress,
            RunFilter::Queued => run.status == RunStatus::Queued,
            RunFilter::Completed => run.status == RunStatus::Completed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterCounts {
    pub all: usize,
    pub in_progress: usize,
    pub queued: usize,
    pub completed: usize,
}

impl FilterCounts {
    pub fn of(runs: &[WorkflowRun]) -> Self {
        let count = |filter: RunFilter| runs.iter().filter(|r| filter.matches(r)).count();
        FilterCounts {
            all: runs.len(),
            in_progress: count(RunFilter::InProgress),
            queued: count(RunFilter::Queued),
            completed: count(RunFilter::Completed),
        }
    }

    /// Runs still waiting on a result.
    pub fn badge(&self) -> usize {
        self.in_progress + self.queued
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunsView {
    pub scope: String,
    pub filter: RunFilter,
    pub runs: Vec<WorkflowRun>,
    pub counts: FilterCounts,
    pub badge_count: usize,
    pub error: Option<String>,
    pub offline: bool,
    pub last_success: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Surface {
    runs: Arc<Vec<WorkflowRun>>,
    error: Option<String>,
    consecutive_failures: u32,
    last_success: Option<DateTime<Utc>>,
}

/// Runs created strictly after `now - window`, newest first.
pub fn recent_runs(runs: Vec<WorkflowRun>, window: chrono::Duration, now: DateTime<Utc>) -> Vec<WorkflowRun> {
    let cutoff = now - window;
    let mut recent: Vec<WorkflowRun> = runs.into_iter().filter(|r| r.created_at > cutoff).collect();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    recent
}

pub struct WorkflowMonitor {
    fetcher: Arc<HybridFetchClient>,
    runs: TimedCache<Arc<Vec<WorkflowRun>>>,
    surfaces: RwLock<HashMap<PollScope, Surface>>,
}

impl WorkflowMonitor {
    pub fn new(fetcher: Arc<HybridFetchClient>) -> Self {
        Self::with_ttl(fetcher, Duration::from_secs(WORKFLOW_RUNS_TTL_SECS))
    }

    pub fn with_ttl(fetcher: Arc<HybridFetchClient>, ttl: Duration) -> Self {
        Self {
            fetcher,
            runs: TimedCache::new(ttl),
            surfaces: RwLock::new(HashMap::new()),
        }
    }

    /// Register a surface. Reopening an open surface keeps its data.
    pub async fn open(&self, scope: &PollScope) {
        self.surfaces
            .write()
            .await
            .entry(scope.clone())
            .or_default();
        debug!("Opened workflow surface {}", scope);
    }

    /// Forget a surface; responses that arrive afterwards are dropped.
    pub async fn close(&self, scope: &PollScope) {
        if self.surfaces.write().await.remove(scope).is_some() {
            debug!("Closed workflow surface {}", scope);
        }
    }

    pub async fn is_open(&self, scope: &PollScope) -> bool {
        self.surfaces.read().await.contains_key(scope)
    }

    pub async fn open_scopes(&self) -> Vec<PollScope> {
        self.surfaces.read().await.keys().cloned().collect()
    }

    /// Fetch the scope's runs and apply them to its surface. A closed
    /// surface is neither fetched nor updated.
    pub async fn poll(&self, scope: &PollScope) -> Result<(), SyncError> {
        if !self.is_open(scope).await {
            debug!("Skipping poll for closed surface {}", scope);
            return Ok(());
        }

        let key = scope.to_string();
        let result = self
            .runs
            .get_or_fetch(&key, || async {
                let runs = self.fetch_runs(scope).await?;
                Ok::<_, SyncError>(Arc::new(runs))
            })
            .await;

        let mut surfaces = self.surfaces.write().await;
        let Some(surface) = surfaces.get_mut(scope) else {
            debug!("Discarding late workflow runs for closed surface {}", scope);
            return Ok(());
        };

        match result {
            Ok(runs) => {
                debug!("Applied {} workflow runs to {}", runs.len(), scope);
                surface.runs = runs;
                surface.error = None;
                surface.consecutive_failures = 0;
                surface.last_success = Some(Utc::now());
                Ok(())
            }
            Err(e) => {
                surface.consecutive_failures += 1;
                surface.error = Some(e.to_string());
                warn!(
                    "Workflow poll for {} failed ({} in a row): {}",
                    scope, surface.consecutive_failures, e
                );
                Err(e)
            }
        }
    }

    /// Poll past the run-list TTL.
    pub async fn refresh(&self, scope: &PollScope) -> Result<(), SyncError> {
        self.runs.invalidate(&scope.to_string()).await;
        self.poll(scope).await
    }

    pub async fn view(&self, scope: &PollScope, filter: RunFilter) -> Option<RunsView> {
        let surfaces = self.surfaces.read().await;
        let surface = surfaces.get(scope)?;
        let counts = FilterCounts::of(&surface.runs);

        Some(RunsView {
            scope: scope.to_string(),
            filter,
            runs: surface
                .runs
                .iter()
                .filter(|r| filter.matches(r))
                .cloned()
                .collect(),
            counts,
            badge_count: counts.badge(),
            error: surface.error.clone(),
            offline: surface.consecutive_failures >= OFFLINE_AFTER_CONSECUTIVE_FAILURES,
            last_success: surface.last_success,
        })
    }

    async fn fetch_runs(&self, scope: &PollScope) -> Result<Vec<WorkflowRun>, SyncError> {
        if !self.fetcher.tokens().has_token().await {
            return Err(SyncError::MissingToken);
        }

        let config = self.fetcher.config();
        let (org, repo, window_hours) = match scope {
            PollScope::GlobalActionsWidget => {
                (config.repo_owner.as_str(), config.repo_name.as_str(), WIDGET_RECENT_HOURS)
            }
            PollScope::Service { org, repo } => (org.as_str(), repo.as_str(), SERVICE_RECENT_HOURS),
        };

        let endpoint = format!(
            "/repos/{}/{}/actions/runs?per_page={}",
            org, repo, WORKFLOW_RUNS_PER_PAGE
        );
        let page: WorkflowRunsPage = self.fetcher.api_get_json(&endpoint).await?;
        let total = page.total_count;
        let runs = recent_runs(page.workflow_runs, chrono::Duration::hours(window_hours), Utc::now());
        info!(
            "Fetched workflow runs for {}: {} recent of {} total",
            scope,
            runs.len(),
            total
        );
        Ok(runs)
    }
}

impl PollTask for WorkflowMonitor {
    fn tick<'a>(&'a self, scope: &'a PollScope) -> BoxFuture<'a, ()> {
        async move {
            // Recorded on the surface; the schedule keeps running.
            let _ = self.poll(scope).await;
        }
        .boxed()
    }
}
