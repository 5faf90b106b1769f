use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::constants::IMAGE_CONTENT_TYPE;
use crate::services::comfyui::ImageJobApi;
use crate::services::poller::{JobPoller, PollOutcome};
use crate::services::storage::ObjectStorage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RelayOutcome {
    Uploaded { url: String },
    Pending,
    Failed { reason: String },
}

/// Lower-case, whitespace runs become `_`, path separators dropped.
/// A value that loses characters gets `~` plus the hex of the normalized text,
/// which keeps `"/"` and `"#"` apart. Plain slugs never contain `~`.
pub fn slug(value: &str) -> String {
    let normalized = value
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    let cleaned: String = normalized.chars().filter(|c| !is_reserved(*c)).collect();
    if cleaned.len() == normalized.len() {
        return cleaned;
    }

    format!("{cleaned}~{}", hex::encode(normalized.as_bytes()))
}

fn is_reserved(c: char) -> bool {
    matches!(c, '/' | '\\' | '?' | '#' | '~')
}

pub fn storage_key_for_word(prefix: &str, word: &str) -> String {
    join_key(prefix, &format!("{}.png", slug(word)))
}

pub fn storage_key_for_subject_word(prefix: &str, subject: &str, word: &str) -> String {
    join_key(prefix, &format!("{}/{}.png", slug(subject), slug(word)))
}

fn join_key(prefix: &str, rest: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        rest.to_string()
    } else {
        format!("{prefix}/{rest}")
    }
}

/// Moves a finished job's output into durable storage.
#[derive(Clone)]
pub struct ImageRelay {
    poller: JobPoller,
    api: Arc<dyn ImageJobApi>,
    storage: Arc<dyn ObjectStorage>,
}

impl ImageRelay {
    pub fn new(poller: JobPoller, api: Arc<dyn ImageJobApi>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            poller,
            api,
            storage,
        }
    }

    pub fn poller(&self) -> &JobPoller {
        &self.poller
    }

    pub fn with_poller(&self, poller: JobPoller) -> Self {
        Self {
            poller,
            ..self.clone()
        }
    }

    pub async fn relay(&self, job_id: &str, storage_key: &str, cancel: &CancellationToken) -> RelayOutcome {
        let artifact = match self.poller.poll(job_id, cancel).await {
            PollOutcome::Ready(artifact) => artifact,
            PollOutcome::Pending => return RelayOutcome::Pending,
            PollOutcome::Failed(reason) => return RelayOutcome::Failed { reason },
        };

        let bytes = match self.api.fetch_artifact(&artifact).await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => {
                return RelayOutcome::Failed {
                    reason: format!("artifact {} is empty", artifact.filename),
                }
            }
            Err(e) => {
                tracing::warn!(job_id, filename = %artifact.filename, error = %e, "artifact fetch failed");
                return RelayOutcome::Failed {
                    reason: format!("failed to fetch image: {e}"),
                };
            }
        };

        match self.storage.put(storage_key, bytes, IMAGE_CONTENT_TYPE).await {
            Ok(url) => {
                tracing::info!(job_id, key = storage_key, "image relayed to storage");
                RelayOutcome::Uploaded { url }
            }
            Err(e) => {
                tracing::warn!(job_id, key = storage_key, error = %e, "image upload failed");
                RelayOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
