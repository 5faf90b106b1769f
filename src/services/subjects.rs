use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::response::AppError;
use crate::services::comfyui::ImageJobSubmitter;
use crate::services::dictionary::WordService;
use crate::services::images::{ImageStatus, ImageStatusResult};
use crate::services::relay::{storage_key_for_subject_word, ImageRelay, RelayOutcome};
use crate::state::AppState;
use crate::store::operations::subjects::{SubjectWord, SubjectWordGroup};
use crate::store::Store;
use crate::validation::clean_terms;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedTerm {
    pub word: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectUpdate {
    pub subject: String,
    pub added_words: Vec<String>,
    pub skipped_words: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_words: Vec<FailedTerm>,
    pub group: Option<SubjectWordGroup>,
}

#[derive(Clone)]
pub struct SubjectService {
    store: Arc<Store>,
    words: WordService,
    submitter: ImageJobSubmitter,
    relay: ImageRelay,
    cancel: CancellationToken,
    key_prefix: String,
}

impl SubjectService {
    pub fn from_state(state: &AppState) -> Self {
        Self {
            store: state.store_arc(),
            words: WordService::from_state(state),
            submitter: state.submitter(),
            relay: state.relay(),
            cancel: state.cancel_token().clone(),
            key_prefix: state.config().storage.key_prefix.clone(),
        }
    }

    pub fn get(&self, subject: &str) -> Result<SubjectWordGroup, AppError> {
        let subject = required_subject(subject)?;
        self.store
            .get_subject(subject)?
            .ok_or_else(|| AppError::not_found("Subject not found"))
    }

    /// Define new terms in the subject's context and append them to its group.
    /// Terms already in the group are reported as skipped.
    pub async fn add_words<S: AsRef<str>>(&self, subject: &str, raw_terms: &[S]) -> Result<SubjectUpdate, AppError> {
        let subject = required_subject(subject)?;
        let terms = clean_terms(raw_terms);
        if terms.is_empty() {
            return Err(AppError::bad_request("NO_VALID_WORDS", "No valid words provided"));
        }

        let existing = self.store.get_subject(subject)?;
        let mut skipped = Vec::new();
        let mut defined = Vec::new();
        let mut failed = Vec::new();

        for term in terms {
            if existing.as_ref().is_some_and(|g| g.contains(&term)) {
                skipped.push(term);
                continue;
            }
            match self.words.lookup_in_subject(&term, subject).await {
                Ok(details) => defined.push(SubjectWord::new(details)),
                Err(e) => {
                    tracing::warn!(subject, term = %term, error = %e, "subject word definition failed");
                    failed.push(FailedTerm {
                        word: term,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if defined.is_empty() {
            return Ok(SubjectUpdate {
                subject: subject.to_string(),
                added_words: Vec::new(),
                skipped_words: skipped,
                failed_words: failed,
                group: existing,
            });
        }

        let outcome = self.store.append_subject_words(subject, defined)?;
        skipped.extend(outcome.skipped);
        tracing::info!(subject, added = outcome.added.len(), skipped = skipped.len(), "subject words appended");

        Ok(SubjectUpdate {
            subject: subject.to_string(),
            added_words: outcome.added,
            skipped_words: skipped,
            failed_words: failed,
            group: Some(outcome.group),
        })
    }

    /// Make sure each listed word of the group has an image, relaying finished jobs.
    pub async fn assign_images<S: AsRef<str>>(
        &self,
        subject: &str,
        raw_terms: &[S],
    ) -> Result<Vec<ImageStatusResult>, AppError> {
        let group = self.get(subject)?;
        let terms = clean_terms(raw_terms);
        if terms.is_empty() {
            return Err(AppError::bad_request("NO_VALID_WORDS", "No valid words provided"));
        }

        let mut results = Vec::with_capacity(terms.len());
        for term in terms {
            let Some(word) = group.find(&term) else {
                results.push(
                    ImageStatusResult::new(&term, ImageStatus::Skipped).with_reason("not in subject"),
                );
                continue;
            };
            results.push(self.assign_one(&group.subject, &term, word).await);
        }
        Ok(results)
    }

    async fn assign_one(&self, subject: &str, term: &str, word: &SubjectWord) -> ImageStatusResult {
        if let Some(url) = word.image_url.as_deref().filter(|u| !u.is_empty()) {
            return ImageStatusResult::new(term, ImageStatus::Ready).with_url(url);
        }

        let job_id = match &word.prompt_id {
            Some(id) => id.clone(),
            None => match self.submit_job(subject, term, word).await {
                Ok(id) => id,
                Err(reason) => {
                    return ImageStatusResult::new(term, ImageStatus::Failed).with_reason(reason)
                }
            },
        };

        let key = storage_key_for_subject_word(&self.key_prefix, subject, term);
        match self.relay.relay(&job_id, &key, &self.cancel).await {
            RelayOutcome::Uploaded { url } => {
                let stored = self.store.update_subject_word(subject, term, |w| {
                    w.image_url = Some(url.clone());
                    w.prompt_id = None;
                });
                match stored {
                    Ok(_) => ImageStatusResult::new(term, ImageStatus::Ready).with_url(url),
                    Err(e) => ImageStatusResult::new(term, ImageStatus::Failed).with_reason(e.to_string()),
                }
            }
            RelayOutcome::Pending => {
                ImageStatusResult::new(term, ImageStatus::Pending).with_reason("image not ready yet")
            }
            RelayOutcome::Failed { reason } => {
                let cleared = self.store.update_subject_word(subject, term, |w| {
                    if w.prompt_id.as_deref() == Some(job_id.as_str()) {
                        w.prompt_id = None;
                    }
                });
                if let Err(e) = cleared {
                    tracing::warn!(subject, term, error = %e, "could not drop failed image job");
                }
                ImageStatusResult::new(term, ImageStatus::Failed).with_reason(reason)
            }
        }
    }

    async fn submit_job(&self, subject: &str, term: &str, word: &SubjectWord) -> Result<String, String> {
        let job_id = self
            .submitter
            .submit_for(&word.details)
            .await
            .map_err(|e| format!("image job submission failed: {e}"))?;
        self.store
            .update_subject_word(subject, term, |w| {
                if w.image_url.is_none() {
                    w.prompt_id = Some(job_id.clone());
                }
            })
            .map_err(|e| e.to_string())?;
        Ok(job_id)
    }
}

fn required_subject(subject: &str) -> Result<&str, AppError> {
    let subject = subject.trim();
    if subject.is_empty() {
        return Err(AppError::bad_request("VALIDATION_ERROR", "Subject is required"));
    }
    Ok(subject)
}
