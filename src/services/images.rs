//! Bulk and single-word image orchestration over the word collection.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::response::AppError;
use crate::services::comfyui::ImageJobSubmitter;
use crate::services::dictionary::WordService;
use crate::services::relay::{storage_key_for_word, ImageRelay, RelayOutcome};
use crate::state::AppState;
use crate::store::operations::words::WordEntry;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DefineStatus {
    Ready,
    Submitted,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefineResult {
    pub term: String,
    pub status: DefineStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_id: Option<String>,
    #[serde(rename = "imageURL", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl DefineResult {
    fn failed(term: &str, reason: impl Into<String>) -> Self {
        Self {
            term: term.to_string(),
            status: DefineStatus::Failed,
            prompt_id: None,
            image_url: None,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ImageStatus {
    Ready,
    Pending,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageStatusResult {
    pub word: String,
    pub status: ImageStatus,
    #[serde(rename = "imageURL", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ImageStatusResult {
    pub(crate) fn new(word: &str, status: ImageStatus) -> Self {
        Self {
            word: word.to_string(),
            status,
            image_url: None,
            reason: None,
        }
    }

    pub(crate) fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub(crate) fn with_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }
}

#[derive(Debug, Clone)]
pub enum WordImageOutcome {
    Ready(WordEntry),
    Pending { word: String, prompt_id: String },
}

#[derive(Clone)]
pub struct ImageService {
    store: Arc<Store>,
    words: WordService,
    submitter: ImageJobSubmitter,
    relay: ImageRelay,
    cancel: CancellationToken,
    key_prefix: String,
}

impl ImageService {
    pub fn new(
        store: Arc<Store>,
        words: WordService,
        submitter: ImageJobSubmitter,
        relay: ImageRelay,
        cancel: CancellationToken,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            words,
            submitter,
            relay,
            cancel,
            key_prefix: key_prefix.into(),
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.store_arc(),
            WordService::from_state(state),
            state.submitter(),
            state.relay(),
            state.cancel_token().clone(),
            state.config().storage.key_prefix.clone(),
        )
    }

    pub fn with_relay(&self, relay: ImageRelay) -> Self {
        Self {
            relay,
            ..self.clone()
        }
    }

    /// Define every term and make sure an image job exists for it.
    /// Failures are reported per term.
    pub async fn define_many(&self, terms: &[String]) -> Vec<DefineResult> {
        let mut results = Vec::with_capacity(terms.len());
        for term in terms {
            results.push(self.define_one(term).await);
        }
        results
    }

    async fn define_one(&self, term: &str) -> DefineResult {
        let entry = match self.words.lookup(term).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(term, error = %e, "define failed");
                return DefineResult::failed(term, e.to_string());
            }
        };
        let term = entry.term().to_string();

        if entry.has_image() {
            return DefineResult {
                term,
                status: DefineStatus::Ready,
                prompt_id: None,
                image_url: entry.image_url,
                reason: None,
            };
        }

        if let Some(prompt_id) = &entry.prompt_id {
            return DefineResult {
                term,
                status: DefineStatus::Submitted,
                prompt_id: Some(prompt_id.clone()),
                image_url: None,
                reason: None,
            };
        }

        match self.submit_job(&entry).await {
            Ok(updated) => DefineResult {
                term,
                status: if updated.has_image() {
                    DefineStatus::Ready
                } else {
                    DefineStatus::Submitted
                },
                prompt_id: updated.prompt_id,
                image_url: updated.image_url,
                reason: None,
            },
            Err(e) => DefineResult::failed(&term, e.message),
        }
    }

    async fn submit_job(&self, entry: &WordEntry) -> Result<WordEntry, AppError> {
        let job_id = self.submitter.submit_for(&entry.details).await.map_err(|e| {
            tracing::warn!(term = entry.term(), error = %e, "image job submission failed");
            AppError::internal(&format!("image job submission failed: {e}"))
        })?;
        Ok(self.store.set_word_job(entry.term(), &job_id)?)
    }

    /// Collect finished images for the given words and persist their URLs.
    pub async fn image_statuses(&self, words: &[String]) -> Vec<ImageStatusResult> {
        let mut results = Vec::with_capacity(words.len());
        for word in words {
            results.push(self.image_status(word).await);
        }
        results
    }

    async fn image_status(&self, word: &str) -> ImageStatusResult {
        let entry = match self.store.get_word(word) {
            Ok(Some(entry)) => entry,
            Ok(None) => return ImageStatusResult::new(word, ImageStatus::Skipped).with_reason("not found"),
            Err(e) => return ImageStatusResult::new(word, ImageStatus::Failed).with_reason(e.to_string()),
        };

        if let Some(url) = entry.image_url.as_deref().filter(|u| !u.is_empty()) {
            return ImageStatusResult::new(word, ImageStatus::Ready).with_url(url);
        }
        let Some(job_id) = entry.prompt_id.as_deref() else {
            return ImageStatusResult::new(word, ImageStatus::Skipped).with_reason("no image job");
        };

        match self.relay_word(entry.term(), job_id).await {
            Ok(RelayOutcome::Uploaded { url }) => {
                ImageStatusResult::new(word, ImageStatus::Ready).with_url(url)
            }
            Ok(RelayOutcome::Pending) => {
                ImageStatusResult::new(word, ImageStatus::Pending).with_reason("image not ready yet")
            }
            Ok(RelayOutcome::Failed { reason }) => {
                ImageStatusResult::new(word, ImageStatus::Failed).with_reason(reason)
            }
            Err(e) => ImageStatusResult::new(word, ImageStatus::Failed).with_reason(e.message),
        }
    }

    /// Relay one job and record the URL on success.
    pub async fn relay_word(&self, term: &str, job_id: &str) -> Result<RelayOutcome, AppError> {
        let key = storage_key_for_word(&self.key_prefix, term);
        let outcome = self.relay.relay(job_id, &key, &self.cancel).await;
        match &outcome {
            RelayOutcome::Uploaded { url } => {
                self.store.attach_word_image(term, url)?;
            }
            RelayOutcome::Failed { reason } => {
                tracing::warn!(term, job_id, reason = %reason, "dropping failed image job");
                self.store.clear_word_job(term, job_id)?;
            }
            RelayOutcome::Pending => {}
        }
        Ok(outcome)
    }

    /// Define if needed, submit a job if needed, then wait for the image.
    pub async fn word_image(&self, term: &str) -> Result<WordImageOutcome, AppError> {
        let mut entry = self.words.lookup(term).await?;
        if entry.has_image() {
            return Ok(WordImageOutcome::Ready(entry));
        }
        if entry.prompt_id.is_none() {
            entry = self.submit_job(&entry).await?;
            if entry.has_image() {
                return Ok(WordImageOutcome::Ready(entry));
            }
        }
        let job_id = entry
            .prompt_id
            .clone()
            .ok_or_else(|| AppError::internal("image job id missing after submission"))?;

        match self.relay_word(entry.term(), &job_id).await? {
            RelayOutcome::Uploaded { .. } => {
                let stored = self
                    .store
                    .get_word(entry.term())?
                    .ok_or_else(|| AppError::not_found("Word not found"))?;
                Ok(WordImageOutcome::Ready(stored))
            }
            RelayOutcome::Pending => Ok(WordImageOutcome::Pending {
                word: entry.term().to_string(),
                prompt_id: job_id,
            }),
            RelayOutcome::Failed { reason } => Err(AppError::bad_gateway("IMAGE_JOB_FAILED", &reason)),
        }
    }
}
