use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

use crate::auth::TokenStore;
use crate::config::{is_valid_poll_interval, SyncConfig, WORKFLOW_POLL_DEFAULT_MS};
use crate::error::SyncError;
use crate::fetch::{HttpTransport, HybridFetchClient, ReqwestTransport};
use crate::models::Service;
use crate::polling::{PollScope, PollingScheduler};
use crate::registry::RegistryClient;
use crate::settings::{load_settings, save_settings, PersistentSettings};
use crate::workflows::WorkflowMonitor;

pub type SharedState = Arc<DashboardState>;

/// Last successful service load.
#[derive(Debug, Clone, Default)]
pub struct ServicesSnapshot {
    pub services: Arc<Vec<Service>>,
    pub used_api: bool,
    pub loaded_at: Option<DateTime<Utc>>,
}

/// Everything the dashboard shares: token, fetch client, caches, run-list
/// surfaces and their poll timers. Built with `create`, torn down with
/// `dispose`.
pub struct DashboardState {
    pub config: Arc<SyncConfig>,
    pub tokens: Arc<TokenStore>,
    pub fetcher: Arc<HybridFetchClient>,
    pub registry: RegistryClient,
    pub workflows: Arc<WorkflowMonitor>,
    pub scheduler: PollingScheduler,
    pub services: RwLock<ServicesSnapshot>,
    pub settings: RwLock<PersistentSettings>,
}

impl DashboardState {
    /// Build state backed by the real HTTP client.
    pub fn create(config: SyncConfig, token: Option<&str>) -> Result<SharedState, SyncError> {
        let transport = ReqwestTransport::new(config.fetch_timeout)?;
        Ok(Self::with_transport(config, Arc::new(transport), token))
    }

    pub fn with_transport(
        config: SyncConfig,
        transport: Arc<dyn HttpTransport>,
        token: Option<&str>,
    ) -> SharedState {
        let settings = load_settings(&config.settings_path);
        let config = Arc::new(config);
        let tokens = Arc::new(TokenStore::with_token(token));
        let fetcher = Arc::new(HybridFetchClient::new(
            config.clone(),
            transport,
            tokens.clone(),
        ));
        let workflows = Arc::new(WorkflowMonitor::new(fetcher.clone()));
        let scheduler = PollingScheduler::new(workflows.clone());

        Arc::new(Self {
            config,
            tokens,
            registry: RegistryClient::new(fetcher.clone()),
            fetcher,
            workflows,
            scheduler,
            services: RwLock::new(ServicesSnapshot::default()),
            settings: RwLock::new(settings),
        })
    }

    /// Cancel every poll timer. Run-list surfaces stay readable.
    pub fn dispose(&self) {
        let active = self.scheduler.active_scopes().len();
        self.scheduler.stop_all();
        info!("Dashboard state disposed ({} poll timers cancelled)", active);
    }

    // --- Services ---

    pub async fn refresh_services(&self) -> Result<usize, SyncError> {
        let loaded = self.registry.load_services().await?;
        let count = loaded.services.len();
        *self.services.write().await = ServicesSnapshot {
            services: Arc::new(loaded.services),
            used_api: loaded.used_api,
            loaded_at: Some(Utc::now()),
        };
        info!(
            "Service snapshot refreshed: {} services (via {})",
            count,
            if loaded.used_api { "API" } else { "mirror" }
        );
        Ok(count)
    }

    /// The current snapshot, loading it on first use.
    pub async fn services(&self) -> Result<Arc<Vec<Service>>, SyncError> {
        {
            let snapshot = self.services.read().await;
            if snapshot.loaded_at.is_some() {
                return Ok(snapshot.services.clone());
            }
        }
        self.refresh_services().await?;
        Ok(self.services.read().await.services.clone())
    }

    // --- Workflow surfaces ---

    pub async fn widget_interval(&self) -> Duration {
        let ms = self
            .settings
            .read()
            .await
            .widget_poll_interval_ms
            .unwrap_or(WORKFLOW_POLL_DEFAULT_MS);
        Duration::from_millis(ms)
    }

    pub async fn service_interval(&self) -> Duration {
        let ms = self
            .settings
            .read()
            .await
            .service_workflow_poll_interval_ms
            .unwrap_or(WORKFLOW_POLL_DEFAULT_MS);
        Duration::from_millis(ms)
    }

    pub async fn open_widget(&self) {
        let scope = PollScope::GlobalActionsWidget;
        self.workflows.open(&scope).await;
        self.scheduler.start(scope, self.widget_interval().await);
    }

    pub async fn close_widget(&self) {
        self.close_scope(&PollScope::GlobalActionsWidget).await;
    }

    pub async fn open_service_workflows(&self, org: &str, repo: &str) {
        let scope = PollScope::service(org, repo);
        self.workflows.open(&scope).await;
        self.scheduler.start(scope, self.service_interval().await);
    }

    pub async fn close_service_workflows(&self, org: &str, repo: &str) {
        self.close_scope(&PollScope::service(org, repo)).await;
    }

    /// Timer first, then the surface. A fetch still in flight is discarded
    /// when it resolves.
    async fn close_scope(&self, scope: &PollScope) {
        self.scheduler.stop(scope);
        self.workflows.close(scope).await;
    }

    pub async fn set_widget_interval(&self, interval_ms: u64) -> Result<(), SyncError> {
        if !is_valid_poll_interval(interval_ms) {
            return Err(SyncError::InvalidInterval(interval_ms));
        }
        self.update_settings(|s| s.widget_poll_interval_ms = Some(interval_ms))
            .await;

        let scope = PollScope::GlobalActionsWidget;
        if self.workflows.is_open(&scope).await {
            self.scheduler
                .restart(scope, Duration::from_millis(interval_ms));
        }
        Ok(())
    }

    /// Applies to every open service tab.
    pub async fn set_service_interval(&self, interval_ms: u64) -> Result<(), SyncError> {
        if !is_valid_poll_interval(interval_ms) {
            return Err(SyncError::InvalidInterval(interval_ms));
        }
        self.update_settings(|s| s.service_workflow_poll_interval_ms = Some(interval_ms))
            .await;

        let interval = Duration::from_millis(interval_ms);
        for scope in self.workflows.open_scopes().await {
            if matches!(scope, PollScope::Service { .. }) {
                self.scheduler.restart(scope, interval);
            }
        }
        Ok(())
    }

    async fn update_settings(&self, apply: impl FnOnce(&mut PersistentSettings)) {
        let mut settings = self.settings.write().await;
        apply(&mut settings);
        save_settings(&self.config.settings_path, &settings);
    }
}
