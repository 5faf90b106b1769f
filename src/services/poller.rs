//! Bounded, cancellable polling of image job status.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::services::comfyui::{Artifact, ImageJobApi};

#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Status checks before giving up with `Pending`.
    pub max_attempts: u32,
    /// Wait after the first unsuccessful check.
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Growth factor for the wait; `1.0` keeps it fixed.
    pub multiplier: f64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(4000),
            max_delay: Duration::from_secs(30),
            multiplier: 1.0,
        }
    }
}

impl PollConfig {
    pub fn with_attempts(&self, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..self.clone()
        }
    }
}

/// Next wait, clamped to `max_delay`.
pub fn next_delay(current: Duration, config: &PollConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier.max(1.0)) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Ready(Artifact),
    /// Budget spent or polling cancelled; the job may still finish later.
    Pending,
    Failed(String),
}

/// First image of `outputs[node]` for the job, if any.
pub fn extract_artifact(history: &serde_json::Value, job_id: &str, node: &str) -> Option<Artifact> {
    let image = history
        .get(job_id)?
        .get("outputs")?
        .get(node)?
        .get("images")?
        .get(0)?;
    let filename = image.get("filename")?.as_str()?.trim();
    if filename.is_empty() {
        return None;
    }
    Some(Artifact {
        filename: filename.to_string(),
        subfolder: image
            .get("subfolder")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
    })
}

/// Error reported by the service for a job that will never produce output.
pub fn job_error(history: &serde_json::Value, job_id: &str) -> Option<String> {
    let status = history.get(job_id)?.get("status")?;
    if status.get("status_str").and_then(|v| v.as_str()) != Some("error") {
        return None;
    }
    let detail = status
        .get("messages")
        .and_then(|m| m.as_array())
        .and_then(|messages| {
            messages.iter().find_map(|msg| {
                let kind = msg.get(0)?.as_str()?;
                if kind != "execution_error" {
                    return None;
                }
                msg.get(1)?
                    .get("exception_message")?
                    .as_str()
                    .map(str::to_string)
            })
        });
    Some(detail.unwrap_or_else(|| "job failed".to_string()))
}

#[derive(Clone)]
pub struct JobPoller {
    api: Arc<dyn ImageJobApi>,
    output_node: String,
    config: PollConfig,
}

impl JobPoller {
    pub fn new(api: Arc<dyn ImageJobApi>, output_node: impl Into<String>, config: PollConfig) -> Self {
        Self {
            api,
            output_node: output_node.into(),
            config,
        }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    pub fn with_config(&self, config: PollConfig) -> Self {
        Self {
            config,
            ..self.clone()
        }
    }

    /// Check the job up to `max_attempts` times. Only "not ready yet" is retried;
    /// a transport error or an upstream error status ends the poll as `Failed`.
    pub async fn poll(&self, job_id: &str, cancel: &CancellationToken) -> PollOutcome {
        let mut delay = self.config.initial_delay;

        for attempt in 1..=self.config.max_attempts {
            let history = tokio::select! {
                _ = cancel.cancelled() => return PollOutcome::Pending,
                result = self.api.history(job_id) => result,
            };

            match history {
                Ok(history) => {
                    if let Some(artifact) = extract_artifact(&history, job_id, &self.output_node) {
                        tracing::debug!(job_id, attempt, filename = %artifact.filename, "image job ready");
                        return PollOutcome::Ready(artifact);
                    }
                    if let Some(reason) = job_error(&history, job_id) {
                        tracing::warn!(job_id, attempt, reason = %reason, "image job failed upstream");
                        return PollOutcome::Failed(reason);
                    }
                }
                Err(e) => {
                    tracing::warn!(job_id, attempt, error = %e, "image job status check failed");
                    return PollOutcome::Failed(e.to_string());
                }
            }

            if attempt == self.config.max_attempts {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => return PollOutcome::Pending,
                _ = tokio::time::sleep(delay) => {}
            }
            delay = next_delay(delay, &self.config);
        }

        tracing::debug!(job_id, attempts = self.config.max_attempts, "image job still pending");
        PollOutcome::Pending
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::services::comfyui::ImageApiError;

    /// Ready after `ready_after` history calls; records when each call happened.
    struct ScriptedApi {
        ready_after: usize,
        calls: AtomicUsize,
        call_times: Mutex<Vec<tokio::time::Instant>>,
    }

    impl ScriptedApi {
        fn new(ready_after: usize) -> Self {
            Self {
                ready_after,
                calls: AtomicUsize::new(0),
                call_times: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ImageJobApi for ScriptedApi {
        async fn submit(&self, _p: &str, _n: &str) -> Result<String, ImageApiError> {
            Ok("job".to_string())
        }

        async fn history(&self, job_id: &str) -> Result<serde_json::Value, ImageApiError> {
            self.call_times.lock().unwrap().push(tokio::time::Instant::now());
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.ready_after {
                Ok(serde_json::json!({
                    job_id: { "outputs": { "9": { "images": [{ "filename": "done.png", "subfolder": "" }] } } }
                }))
            } else {
                Ok(serde_json::json!({}))
            }
        }

        async fn fetch_artifact(&self, _a: &Artifact) -> Result<Vec<u8>, ImageApiError> {
            Ok(vec![1])
        }
    }

    struct FailingApi;

    #[async_trait]
    impl ImageJobApi for FailingApi {
        async fn submit(&self, _p: &str, _n: &str) -> Result<String, ImageApiError> {
            Ok("job".to_string())
        }

        async fn history(&self, job_id: &str) -> Result<serde_json::Value, ImageApiError> {
            Ok(serde_json::json!({
                job_id: { "status": { "status_str": "error", "messages": [
                    ["execution_error", { "exception_message": "CUDA out of memory" }]
                ] } }
            }))
        }

        async fn fetch_artifact(&self, _a: &Artifact) -> Result<Vec<u8>, ImageApiError> {
            Ok(vec![])
        }
    }

    fn config(max_attempts: u32) -> PollConfig {
        PollConfig {
            max_attempts,
            initial_delay: Duration::from_millis(4000),
            max_delay: Duration::from_secs(30),
            multiplier: 1.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ready_after_k_polls_with_fixed_delay() {
        let api = Arc::new(ScriptedApi::new(3));
        let poller = JobPoller::new(api.clone(), "9", config(5));

        let outcome = poller.poll("job", &CancellationToken::new()).await;
        assert_eq!(
            outcome,
            PollOutcome::Ready(Artifact {
                filename: "done.png".to_string(),
                subfolder: String::new()
            })
        );
        assert_eq!(api.calls.load(Ordering::SeqCst), 3);

        let times = api.call_times.lock().unwrap();
        assert_eq!(times[1] - times[0], Duration::from_millis(4000));
        assert_eq!(times[2] - times[1], Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_is_pending_without_trailing_sleep() {
        let api = Arc::new(ScriptedApi::new(usize::MAX));
        let poller = JobPoller::new(api.clone(), "9", config(3));

        let start = tokio::time::Instant::now();
        let outcome = poller.poll("job", &CancellationToken::new()).await;
        assert_eq!(outcome, PollOutcome::Pending);
        assert_eq!(api.calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(8000));
    }

    #[tokio::test]
    async fn zero_attempts_never_calls_upstream() {
        let api = Arc::new(ScriptedApi::new(1));
        let poller = JobPoller::new(api.clone(), "9", config(0));

        assert_eq!(poller.poll("job", &CancellationToken::new()).await, PollOutcome::Pending);
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn upstream_error_status_fails_immediately() {
        let poller = JobPoller::new(Arc::new(FailingApi), "9", config(5));
        let outcome = poller.poll("job", &CancellationToken::new()).await;
        assert_eq!(outcome, PollOutcome::Failed("CUDA out of memory".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_ends_as_pending() {
        let api = Arc::new(ScriptedApi::new(usize::MAX));
        let poller = JobPoller::new(api.clone(), "9", config(100));
        let cancel = CancellationToken::new();

        let child = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5000)).await;
            child.cancel();
        });

        assert_eq!(poller.poll("job", &cancel).await, PollOutcome::Pending);
        assert_eq!(api.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn backoff_grows_and_clamps() {
        let cfg = PollConfig {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(3),
            multiplier: 2.0,
        };
        assert_eq!(next_delay(Duration::from_secs(1), &cfg), Duration::from_secs(2));
        assert_eq!(next_delay(Duration::from_secs(2), &cfg), Duration::from_secs(3));
        assert_eq!(next_delay(Duration::from_secs(4), &config(1)), Duration::from_secs(4));
    }

    #[test]
    fn artifact_extraction_ignores_empty_or_other_nodes() {
        let history = serde_json::json!({
            "j": { "outputs": {
                "9": { "images": [{ "filename": "" }] },
                "10": { "images": [{ "filename": "other.png", "subfolder": "x" }] }
            } }
        });
        assert!(extract_artifact(&history, "j", "9").is_none());
        assert_eq!(extract_artifact(&history, "j", "10").unwrap().subfolder, "x");
        assert!(extract_artifact(&history, "missing", "10").is_none());
        assert!(job_error(&history, "j").is_none());
    }
}
