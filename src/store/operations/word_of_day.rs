use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{Store, StoreError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordOfDay {
    /// `YYYY-MM-DD`, unique.
    pub date: String,
    pub word: String,
    pub meaning: String,
    pub created_at: DateTime<Utc>,
}

impl Store {
    pub fn get_word_of_day(&self, date: &str) -> Result<Option<WordOfDay>, StoreError> {
        match self.word_of_day.get(date.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// First writer for a date wins; later writers get the stored entry back.
    pub fn insert_word_of_day(&self, entry: &WordOfDay) -> Result<WordOfDay, StoreError> {
        match Self::insert_new(&self.word_of_day, "word_of_day", &entry.date, entry) {
            Ok(()) => Ok(entry.clone()),
            Err(StoreError::Conflict { .. }) => {
                self.get_word_of_day(&entry.date)?
                    .ok_or_else(|| StoreError::NotFound {
                        entity: "word_of_day".to_string(),
                        key: entry.date.clone(),
                    })
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn entry(word: &str) -> WordOfDay {
        WordOfDay {
            date: "2024-05-01".to_string(),
            word: word.to_string(),
            meaning: "m".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn first_writer_wins() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("wod").to_str().unwrap()).unwrap();

        let first = store.insert_word_of_day(&entry("petrichor")).unwrap();
        let second = store.insert_word_of_day(&entry("susurrus")).unwrap();

        assert_eq!(first.word, "petrichor");
        assert_eq!(second.word, "petrichor");
        assert_eq!(
            store.get_word_of_day("2024-05-01").unwrap().unwrap().word,
            "petrichor"
        );
    }
}
