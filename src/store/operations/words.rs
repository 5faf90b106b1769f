use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError};

/// Structured dictionary breakdown as produced by the LLM.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WordDetails {
    pub word: String,
    pub part_of_speech: String,
    pub pronunciation: String,
    pub word_forms: Vec<String>,
    pub meaning: String,
    pub example_sentence: String,
    pub synonyms: Vec<String>,
    pub antonyms: Vec<String>,
    pub memory_trick: String,
    pub origin: String,
    pub positive_prompt: String,
    pub negative_prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordEntry {
    #[serde(flatten)]
    pub details: WordDetails,
    #[serde(rename = "imageURL", default)]
    pub image_url: Option<String>,
    /// Id of the image-generation job; cleared once the image is stored.
    #[serde(default)]
    pub prompt_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WordEntry {
    pub fn new(details: WordDetails) -> Self {
        let now = Utc::now();
        Self {
            details,
            image_url: None,
            prompt_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn term(&self) -> &str {
        &self.details.word
    }

    pub fn has_image(&self) -> bool {
        self.image_url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct WordQuery {
    /// 1-based page number.
    pub page: u64,
    pub limit: u64,
    pub search: Option<String>,
}

impl Store {
    pub fn get_word(&self, term: &str) -> Result<Option<WordEntry>, StoreError> {
        let key = keys::word_key(term);
        match self.words.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// Insert a new word. The stored term is always the normalized key; a second
    /// insert of the same term fails with `Conflict`.
    pub fn insert_word(&self, entry: &WordEntry) -> Result<(), StoreError> {
        let key = keys::word_key(entry.term());
        if key.is_empty() {
            return Err(StoreError::Validation("word must not be empty".to_string()));
        }
        let mut entry = entry.clone();
        entry.details.word = key.clone();
        Self::insert_new(&self.words, "word", &key, &entry)
    }

    /// Record the image job id. Words that already carry an image are returned unchanged.
    pub fn set_word_job(&self, term: &str, job_id: &str) -> Result<WordEntry, StoreError> {
        let key = keys::word_key(term);
        let updated = Self::update_json::<WordEntry, _>(&self.words, "word", &key, |current| {
            let mut entry = current.ok_or_else(|| not_found(&key))?;
            if entry.has_image() {
                return Ok(None);
            }
            entry.prompt_id = Some(job_id.to_string());
            entry.updated_at = Utc::now();
            Ok(Some(entry))
        })?;

        match updated {
            Some(entry) => Ok(entry),
            None => self.get_word(&key)?.ok_or_else(|| not_found(&key)),
        }
    }

    /// Forget a dead job so the next define or image request submits a new one.
    /// Only clears when the stored id still matches `job_id`.
    pub fn clear_word_job(&self, term: &str, job_id: &str) -> Result<WordEntry, StoreError> {
        let key = keys::word_key(term);
        let updated = Self::update_json::<WordEntry, _>(&self.words, "word", &key, |current| {
            let mut entry = current.ok_or_else(|| not_found(&key))?;
            if entry.prompt_id.as_deref() != Some(job_id) {
                return Ok(None);
            }
            entry.prompt_id = None;
            entry.updated_at = Utc::now();
            Ok(Some(entry))
        })?;

        match updated {
            Some(entry) => Ok(entry),
            None => self.get_word(&key)?.ok_or_else(|| not_found(&key)),
        }
    }

    /// Store the durable image URL and drop the job id.
    pub fn attach_word_image(&self, term: &str, image_url: &str) -> Result<WordEntry, StoreError> {
        let key = keys::word_key(term);
        Self::update_json::<WordEntry, _>(&self.words, "word", &key, |current| {
            let mut entry = current.ok_or_else(|| not_found(&key))?;
            entry.image_url = Some(image_url.to_string());
            entry.prompt_id = None;
            entry.updated_at = Utc::now();
            Ok(Some(entry))
        })?
        .ok_or_else(|| not_found(&key))
    }

    /// Returns whether a record was actually removed.
    pub fn delete_word(&self, term: &str) -> Result<bool, StoreError> {
        let key = keys::word_key(term);
        Ok(self.words.remove(key.as_bytes())?.is_some())
    }

    pub fn count_words(&self) -> Result<u64, StoreError> {
        Ok(self.words.len() as u64)
    }

    /// Page through words in term order, optionally filtered by a
    /// case-insensitive substring of the term. Returns the page and the filtered total.
    pub fn list_words(&self, query: &WordQuery) -> Result<(Vec<WordEntry>, u64), StoreError> {
        let limit = query.limit.max(1) as usize;
        let offset = usize::try_from(query.page.max(1) - 1)
            .unwrap_or(usize::MAX)
            .saturating_mul(limit);
        let needle = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut total = 0u64;
        let mut items = Vec::new();
        // 键即为小写词条，sled 迭代顺序即字母序
        for item in self.words.iter() {
            let (key, value) = item?;
            if let Some(needle) = &needle {
                if !String::from_utf8_lossy(&key).contains(needle.as_str()) {
                    continue;
                }
            }
            if total as usize >= offset && items.len() < limit {
                items.push(Self::deserialize::<WordEntry>(&value)?);
            }
            total += 1;
        }

        Ok((items, total))
    }

    /// Words that have a job in flight but no image yet.
    pub fn words_pending_image(&self, limit: usize) -> Result<Vec<WordEntry>, StoreError> {
        let mut pending = Vec::new();
        for item in self.words.iter() {
            let (_, value) = item?;
            let entry: WordEntry = Self::deserialize(&value)?;
            if !entry.has_image() && entry.prompt_id.is_some() {
                pending.push(entry);
            }
            if pending.len() >= limit {
                break;
            }
        }
        Ok(pending)
    }
}

fn not_found(key: &str) -> StoreError {
    StoreError::NotFound {
        entity: "word".to_string(),
        key: key.to_string(),
    }
}
