pub mod image_sweep;
pub mod word_of_day_warmup;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::config::WorkerConfig;
use crate::state::AppState;

/// Timeout for individual worker invocations (5 minutes).
const WORKER_TIMEOUT: Duration = Duration::from_secs(300);

/// Drain period before scheduler shutdown to let in-flight tasks complete.
#[cfg(test)]
const DRAIN_TIMEOUT: Duration = Duration::from_millis(10);
#[cfg(not(test))]
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerName {
    ImageSweep,
    WordOfDayWarmup,
}

impl WorkerName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ImageSweep => "image_sweep",
            Self::WordOfDayWarmup => "word_of_day_warmup",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub name: WorkerName,
    pub cron: &'static str,
    pub enabled: bool,
}

pub struct WorkerManager {
    state: AppState,
    shutdown_rx: broadcast::Receiver<()>,
    config: WorkerConfig,
}

impl WorkerManager {
    pub fn new(state: AppState, shutdown_rx: broadcast::Receiver<()>, config: &WorkerConfig) -> Self {
        Self {
            state,
            shutdown_rx,
            config: config.clone(),
        }
    }

    /// Every job this instance would run, with its cron schedule (UTC, seconds first).
    pub fn planned_jobs(&self) -> Vec<JobSpec> {
        if !self.config.is_leader {
            return Vec::new();
        }

        vec![
            JobSpec {
                name: WorkerName::ImageSweep,
                cron: "0 */5 * * * *",
                enabled: self.config.enable_image_sweep,
            },
            JobSpec {
                name: WorkerName::WordOfDayWarmup,
                cron: "0 5 0 * * *",
                enabled: self.config.enable_word_of_day_warmup,
            },
        ]
    }

    pub async fn start(mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !self.config.is_leader {
            tracing::info!("Worker leader disabled; skipping worker startup");
            return Ok(());
        }

        let mut scheduler = JobScheduler::new().await?;
        self.register_jobs(&scheduler).await;
        scheduler.start().await?;

        tracing::info!("Worker manager started");
        let _ = self.shutdown_rx.recv().await;

        tracing::info!(
            "Worker manager shutting down, draining for {}s",
            DRAIN_TIMEOUT.as_secs()
        );
        tokio::time::sleep(DRAIN_TIMEOUT).await;
        let _ = scheduler.shutdown().await;
        Ok(())
    }

    async fn register_jobs(&self, scheduler: &JobScheduler) {
        for spec in self.planned_jobs() {
            let name_str = spec.name.as_str();
            if !spec.enabled {
                tracing::info!(name = name_str, "Skipping disabled worker");
                continue;
            }

            let state = self.state.clone();
            match spec.name {
                WorkerName::ImageSweep => {
                    add_job(scheduler, spec.cron, name_str, move || {
                        let state = state.clone();
                        async move {
                            image_sweep::run(&state).await;
                        }
                    })
                    .await;
                }
                WorkerName::WordOfDayWarmup => {
                    add_job(scheduler, spec.cron, name_str, move || {
                        let state = state.clone();
                        async move {
                            word_of_day_warmup::run(&state).await;
                        }
                    })
                    .await;
                }
            }
            tracing::info!(name = name_str, cron = spec.cron, "Registered worker");
        }
    }
}

/// Add a job to the scheduler with an overlap guard and timeout wrapper.
async fn add_job<Fut, F>(scheduler: &JobScheduler, cron: &str, name: &'static str, mut run: F)
where
    F: FnMut() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let running = Arc::new(AtomicBool::new(false));

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let guard = running.clone();

        if guard
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!(worker = name, "Skipping worker invocation: previous run still in progress");
            return Box::pin(async {});
        }

        let fut = run();
        Box::pin(async move {
            if tokio::time::timeout(WORKER_TIMEOUT, fut).await.is_err() {
                tracing::error!(
                    worker = name,
                    timeout_secs = WORKER_TIMEOUT.as_secs(),
                    "Worker timed out"
                );
            }
            guard.store(false, Ordering::SeqCst);
        })
    });

    match job {
        Ok(job) => {
            if let Err(err) = scheduler.add(job).await {
                tracing::error!(error = %err, cron, worker = name, "Failed to add worker job");
            }
        }
        Err(err) => tracing::error!(error = %err, cron, worker = name, "Failed to create worker job"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::broadcast;

    use super::*;
    use crate::config::Config;
    use crate::services::comfyui::ComfyUiClient;
    use crate::services::llm::MockCompletionClient;
    use crate::services::storage::memory::MemoryStorage;
    use crate::state::Clients;
    use crate::store::Store;

    fn manager(tmp: &tempfile::TempDir, worker: WorkerConfig) -> WorkerManager {
        let cfg = Config::from_env();
        let store = Arc::new(Store::open(tmp.path().join("workers.sled").to_str().unwrap()).unwrap());
        let clients = Clients {
            llm: Arc::new(MockCompletionClient::new()),
            image_api: Arc::new(ComfyUiClient::new(&cfg.image).unwrap()),
            storage: Arc::new(MemoryStorage::default()),
        };
        let (tx, _) = broadcast::channel(2);
        let state = AppState::new(store, &cfg, clients, tx.clone());
        WorkerManager::new(state, tx.subscribe(), &worker)
    }

    #[tokio::test]
    async fn follower_plans_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = manager(
            &tmp,
            WorkerConfig {
                is_leader: false,
                enable_image_sweep: true,
                enable_word_of_day_warmup: true,
            },
        );
        assert!(manager.planned_jobs().is_empty());
        manager.start().await.unwrap();
    }

    #[tokio::test]
    async fn leader_respects_toggles() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = manager(
            &tmp,
            WorkerConfig {
                is_leader: true,
                enable_image_sweep: true,
                enable_word_of_day_warmup: false,
            },
        );
        let jobs = manager.planned_jobs();
        assert_eq!(jobs.len(), 2);
        let sweep = jobs.iter().find(|j| j.name == WorkerName::ImageSweep).unwrap();
        assert!(sweep.enabled);
        assert_eq!(sweep.cron, "0 */5 * * * *");
        let warmup = jobs.iter().find(|j| j.name == WorkerName::WordOfDayWarmup).unwrap();
        assert!(!warmup.enabled);
    }
}
