use futures::future::BoxFuture;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// A polled surface. Each scope owns at most one recurring timer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PollScope {
    GlobalActionsWidget,
    Service { org: String, repo: String },
}

impl PollScope {
    pub fn service(org: impl Into<String>, repo: impl Into<String>) -> Self {
        PollScope::Service {
            org: org.into(),
            repo: repo.into(),
        }
    }
}

impl fmt::Display for PollScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollScope::GlobalActionsWidget => write!(f, "global-actions-widget"),
            PollScope::Service { org, repo } => write!(f, "service:{}/{}", org, repo),
        }
    }
}

/// Work performed on every tick. Failures are the task's to record; a tick
/// never ends the schedule.
pub trait PollTask: Send + Sync {
    fn tick<'a>(&'a self, scope: &'a PollScope) -> BoxFuture<'a, ()>;
}

/// Cancellable handle to one recurring timer. Dropping the handle cancels it.
/// Cancelling stops future ticks only; a fetch already running finishes.
#[derive(Debug)]
pub struct PollHandle {
    task: JoinHandle<()>,
    period: Duration,
}

impl PollHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Owns every poll timer, keyed by scope. Installing a timer always removes
/// and cancels the previous one for that scope first.
pub struct PollingScheduler {
    task: Arc<dyn PollTask>,
    handles: Mutex<HashMap<PollScope, PollHandle>>,
}

impl PollingScheduler {
    pub fn new(task: Arc<dyn PollTask>) -> Self {
        Self {
            task,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch now, then every `interval`. A zero interval fetches once and
    /// leaves the scope without a timer.
    pub fn start(&self, scope: PollScope, interval: Duration) {
        self.stop(&scope);

        if interval.is_zero() {
            info!("Polling disabled for {}, fetching once", scope);
            let task = self.task.clone();
            tokio::spawn(async move { task.tick(&scope).await });
            return;
        }

        info!("Starting poll for {} every {:?}", scope, interval);
        self.install(scope, interval, Instant::now());
    }

    /// Replace the scope's timer with one at the new interval. The first tick
    /// comes one full interval later. A zero interval only stops polling.
    pub fn restart(&self, scope: PollScope, interval: Duration) {
        self.stop(&scope);

        if interval.is_zero() {
            info!("Polling disabled for {}", scope);
            return;
        }

        info!("Restarting poll for {} every {:?}", scope, interval);
        self.install(scope, interval, Instant::now() + interval);
    }

    /// Cancel the scope's timer. Safe on a scope with no timer.
    pub fn stop(&self, scope: &PollScope) {
        if let Some(handle) = self.handles().remove(scope) {
            debug!("Stopped poll for {}", scope);
            handle.cancel();
        }
    }

    pub fn stop_all(&self) {
        let drained: Vec<(PollScope, PollHandle)> = self.handles().drain().collect();
        for (scope, handle) in drained {
            debug!("Stopped poll for {}", scope);
            handle.cancel();
        }
    }

    pub fn is_active(&self, scope: &PollScope) -> bool {
        self.handles().contains_key(scope)
    }

    pub fn active_scopes(&self) -> Vec<PollScope> {
        self.handles().keys().cloned().collect()
    }

    pub fn interval_of(&self, scope: &PollScope) -> Option<Duration> {
        self.handles().get(scope).map(PollHandle::period)
    }

    fn install(&self, scope: PollScope, period: Duration, first_tick: Instant) {
        let task = self.task.clone();
        let tick_scope = scope.clone();
        let join = tokio::spawn(async move {
            let mut ticker = interval_at(first_tick, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                debug!("Poll tick for {}", tick_scope);
                let task = task.clone();
                let scope = tick_scope.clone();
                // Aborting the timer drops this JoinHandle, which detaches the
                // fetch instead of cancelling it.
                let _ = tokio::spawn(async move { task.tick(&scope).await }).await;
            }
        });

        let handle = PollHandle { task: join, period };
        if let Some(previous) = self.handles().insert(scope, handle) {
            previous.cancel();
        }
    }

    fn handles(&self) -> MutexGuard<'_, HashMap<PollScope, PollHandle>> {
        self.handles.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        self.stop_all();
    }
}
