use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use vocab_backend::services::comfyui::{Artifact, ImageApiError, ImageJobApi};
use vocab_backend::store::operations::words::{WordDetails, WordEntry};
use vocab_backend::store::Store;

pub const OUTPUT_NODE: &str = "9";

/// Scripted image service: each job answers "not ready" for `pending_polls`
/// status checks, then reports an artifact (or an error when `failing`).
#[derive(Debug, Default)]
pub struct FakeImageApi {
    pending_polls: usize,
    failing: bool,
    submits: AtomicUsize,
    fetches: AtomicUsize,
    history_calls: Mutex<HashMap<String, usize>>,
}

impl FakeImageApi {
    pub fn ready_after(pending_polls: usize) -> Self {
        Self {
            pending_polls,
            ..Self::default()
        }
    }

    pub fn never_ready() -> Self {
        Self::ready_after(usize::MAX)
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn submit_count(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn polls_for(&self, job_id: &str) -> usize {
        self.history_calls
            .lock()
            .unwrap()
            .get(job_id)
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ImageJobApi for FakeImageApi {
    async fn submit(&self, _positive: &str, _negative: &str) -> Result<String, ImageApiError> {
        let n = self.submits.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("job-{n}"))
    }

    async fn history(&self, job_id: &str) -> Result<Value, ImageApiError> {
        let calls = {
            let mut map = self.history_calls.lock().unwrap();
            let entry = map.entry(job_id.to_string()).or_default();
            *entry += 1;
            *entry
        };

        if self.failing {
            return Ok(json!({
                job_id: {
                    "status": {
                        "status_str": "error",
                        "messages": [["execution_error", {"exception_message": "sampler crashed"}]]
                    }
                }
            }));
        }
        if calls <= self.pending_polls {
            return Ok(json!({}));
        }
        Ok(json!({
            job_id: {
                "outputs": {
                    OUTPUT_NODE: {"images": [{"filename": format!("{job_id}.png"), "subfolder": ""}]}
                }
            }
        }))
    }

    async fn fetch_artifact(&self, artifact: &Artifact) -> Result<Vec<u8>, ImageApiError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(format!("png:{}", artifact.filename).into_bytes())
    }
}

pub fn seed_words(store: &Store, count: usize) -> Vec<WordEntry> {
    (0..count)
        .map(|idx| {
            let entry = WordEntry::new(WordDetails {
                word: format!("word{idx:02}"),
                meaning: format!("meaning {idx}"),
                positive_prompt: format!("picture of word {idx}"),
                ..WordDetails::default()
            });
            store.insert_word(&entry).expect("seed word");
            entry
        })
        .collect()
}
