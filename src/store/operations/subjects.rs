use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::operations::words::WordDetails;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectWord {
    #[serde(flatten)]
    pub details: WordDetails,
    #[serde(rename = "imageURL", default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub prompt_id: Option<String>,
}

impl SubjectWord {
    pub fn new(details: WordDetails) -> Self {
        Self {
            details,
            image_url: None,
            prompt_id: None,
        }
    }

    pub fn has_image(&self) -> bool {
        self.image_url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectWordGroup {
    /// Label as last written by a client; lookups ignore case.
    pub subject: String,
    pub words: Vec<SubjectWord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubjectWordGroup {
    pub fn contains(&self, term: &str) -> bool {
        let term = keys::normalize_term(term);
        self.words
            .iter()
            .any(|w| keys::normalize_term(&w.details.word) == term)
    }

    pub fn find(&self, term: &str) -> Option<&SubjectWord> {
        let term = keys::normalize_term(term);
        self.words
            .iter()
            .find(|w| keys::normalize_term(&w.details.word) == term)
    }

    fn find_mut(&mut self, term: &str) -> Option<&mut SubjectWord> {
        let term = keys::normalize_term(term);
        self.words
            .iter_mut()
            .find(|w| keys::normalize_term(&w.details.word) == term)
    }
}

#[derive(Debug, Clone)]
pub struct AppendOutcome {
    pub group: SubjectWordGroup,
    pub added: Vec<String>,
    pub skipped: Vec<String>,
}

impl Store {
    pub fn get_subject(&self, subject: &str) -> Result<Option<SubjectWordGroup>, StoreError> {
        let key = keys::subject_key(subject);
        match self.subjects.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// Append words to a subject group, creating it on first contribution.
    /// Terms already present (case-insensitive), or repeated within `words`, are skipped.
    pub fn append_subject_words(
        &self,
        subject: &str,
        words: Vec<SubjectWord>,
    ) -> Result<AppendOutcome, StoreError> {
        let key = keys::subject_key(subject);
        if key.is_empty() {
            return Err(StoreError::Validation("subject must not be empty".to_string()));
        }

        let mut added = Vec::new();
        let mut skipped = Vec::new();
        let label = subject.trim().to_string();

        let group = Self::update_json::<SubjectWordGroup, _>(&self.subjects, "subject", &key, |current| {
            added.clear();
            skipped.clear();

            let now = Utc::now();
            let mut group = current.unwrap_or_else(|| SubjectWordGroup {
                subject: label.clone(),
                words: Vec::new(),
                created_at: now,
                updated_at: now,
            });
            group.subject = label.clone();

            for word in &words {
                let term = keys::normalize_term(&word.details.word);
                if term.is_empty() {
                    continue;
                }
                if group.contains(&term) {
                    skipped.push(term);
                    continue;
                }
                let mut word = word.clone();
                word.details.word = term.clone();
                group.words.push(word);
                added.push(term);
            }
            group.updated_at = now;
            Ok(Some(group))
        })?
        .ok_or_else(|| StoreError::NotFound {
            entity: "subject".to_string(),
            key: key.clone(),
        })?;

        Ok(AppendOutcome {
            group,
            added,
            skipped,
        })
    }

    /// Mutate a single word of a subject group in place.
    pub fn update_subject_word<F>(
        &self,
        subject: &str,
        term: &str,
        mut apply: F,
    ) -> Result<SubjectWord, StoreError>
    where
        F: FnMut(&mut SubjectWord),
    {
        let key = keys::subject_key(subject);
        let term = keys::normalize_term(term);

        let group = Self::update_json::<SubjectWordGroup, _>(&self.subjects, "subject", &key, |current| {
            let mut group = current.ok_or_else(|| StoreError::NotFound {
                entity: "subject".to_string(),
                key: key.clone(),
            })?;
            let word = group.find_mut(&term).ok_or_else(|| StoreError::NotFound {
                entity: "subject_word".to_string(),
                key: term.clone(),
            })?;
            apply(word);
            group.updated_at = Utc::now();
            Ok(Some(group))
        })?;

        group
            .as_ref()
            .and_then(|g| g.find(&term).cloned())
            .ok_or_else(|| StoreError::NotFound {
                entity: "subject_word".to_string(),
                key: term.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn word(term: &str) -> SubjectWord {
        SubjectWord::new(WordDetails {
            word: term.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn append_creates_group_and_skips_duplicates() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("subjects").to_str().unwrap()).unwrap();

        let first = store
            .append_subject_words("Biology", vec![word("cell"), word("Gene")])
            .unwrap();
        assert_eq!(first.added, vec!["cell", "gene"]);
        assert!(first.skipped.is_empty());

        let second = store
            .append_subject_words("biology", vec![word("CELL"), word("enzyme"), word("enzyme")])
            .unwrap();
        assert_eq!(second.added, vec!["enzyme"]);
        assert_eq!(second.skipped, vec!["cell", "enzyme"]);
        assert_eq!(second.group.words.len(), 3);
        assert_eq!(second.group.subject, "biology");

        let stored = store.get_subject("BIOLOGY").unwrap().unwrap();
        assert_eq!(stored.words.len(), 3);
    }

    #[test]
    fn update_subject_word_in_place() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("subjects2").to_str().unwrap()).unwrap();
        store
            .append_subject_words("physics", vec![word("force")])
            .unwrap();

        let updated = store
            .update_subject_word("Physics", "FORCE", |w| {
                w.image_url = Some("https://cdn.test/force.png".to_string())
            })
            .unwrap();
        assert!(updated.has_image());

        let err = store
            .update_subject_word("physics", "mass", |_| {})
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
