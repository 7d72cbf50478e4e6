use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::Result;
use crate::service::data_service::normalize;
use crate::service::GitHubDataService;

const DATASETS: [&str; 4] = ["stats", "repositories", "contributions", "pinned"];

const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome of refreshing every dataset for one handle.
#[derive(Debug, Clone, Default)]
pub struct RefreshReport {
    pub refreshed: Vec<&'static str>,
    pub failed: Vec<(&'static str, String)>,
}

impl RefreshReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn record<T>(&mut self, dataset: &'static str, result: Result<crate::service::Fetched<T>>) {
        match result {
            Ok(fetched) => match fetched.error {
                Some(error) => self.failed.push((dataset, error)),
                None => self.refreshed.push(dataset),
            },
            Err(e) => self.failed.push((dataset, e.to_string())),
        }
    }
}

/// Background timer owned by the service.
pub(crate) struct RefreshTask {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl RefreshTask {
    pub(crate) async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.handle.await {
            if !e.is_cancelled() {
                tracing::warn!("Auto-refresh task ended abnormally: {}", e);
            }
        }
    }
}

impl GitHubDataService {
    /// Refetches profile stats, repositories, contributions and pinned
    /// repositories for `handle`, ignoring freshness. Failures fall back to
    /// the cache like any other read and are listed in the report.
    pub async fn refresh_all(&self, handle: &str) -> RefreshReport {
        let mut report = RefreshReport::default();
        let handle = match normalize(handle) {
            Ok(handle) => handle,
            Err(e) => {
                for dataset in DATASETS {
                    report.failed.push((dataset, e.to_string()));
                }
                return report;
            }
        };
        let limit = self.config.pinned_limit;

        let (stats, repos, contributions, pinned) = tokio::join!(
            self.stats(&handle, true),
            self.repositories(&handle, true),
            self.contributions(&handle, true),
            self.pinned(&handle, limit, true),
        );

        report.record("stats", stats);
        report.record("repositories", repos);
        report.record("contributions", contributions);
        report.record("pinned", pinned);

        if report.is_complete() {
            tracing::info!("Refreshed all GitHub data for {}", handle);
        } else {
            tracing::warn!("Refresh for {} incomplete: {:?}", handle, report.failed);
        }
        report
    }

    /// Starts refreshing the default handle every `interval`, the first run
    /// immediately. Returns false, changing nothing, when already running.
    pub fn start_auto_refresh(self: &Arc<Self>, interval: Duration) -> bool {
        let mut slot = match self.refresher.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if slot.as_ref().is_some_and(|task| !task.handle.is_finished()) {
            tracing::debug!("Auto-refresh already running");
            return false;
        }

        let interval = interval.max(MIN_INTERVAL);
        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(refresh_loop(Arc::downgrade(self), interval, shutdown_rx));
        *slot = Some(RefreshTask { shutdown, handle });

        tracing::info!("Auto-refresh started every {:?} for {}", interval, self.config.default_handle);
        true
    }

    /// Signals the timer to stop. Returns false when it was not running.
    pub fn stop_auto_refresh(&self) -> bool {
        match self.take_refresh_task() {
            Some(task) => {
                let _ = task.shutdown.send(());
                tracing::info!("Auto-refresh stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_auto_refreshing(&self) -> bool {
        self.refresher
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|task| !task.handle.is_finished()))
            .unwrap_or(false)
    }

    pub(crate) fn take_refresh_task(&self) -> Option<RefreshTask> {
        match self.refresher.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

/// Each refresh runs as its own task; a tick that finds the previous one
/// still running is skipped, so a hung request never stalls the timer.
async fn refresh_loop(service: Weak<GitHubDataService>, interval: Duration, mut shutdown: oneshot::Receiver<()>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut current: Option<JoinHandle<()>> = None;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                if current.as_ref().is_some_and(|task| !task.is_finished()) {
                    tracing::debug!("Previous refresh still running, skipping tick");
                    continue;
                }

                let Some(service) = service.upgrade() else { break };
                current = Some(tokio::spawn(async move {
                    let handle = service.config.default_handle.clone();
                    service.refresh_all(&handle).await;
                }));
            }
        }
    }

    if let Some(task) = current {
        task.abort();
    }
}
