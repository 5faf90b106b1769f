use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::response::AppError;
use crate::services::dictionary::WordService;
use crate::state::AppState;
use crate::store::keys::word_of_day_key;
use crate::store::operations::word_of_day::WordOfDay;
use crate::store::Store;

#[derive(Clone)]
pub struct WordOfDayService {
    store: Arc<Store>,
    words: WordService,
}

impl WordOfDayService {
    pub fn new(store: Arc<Store>, words: WordService) -> Self {
        Self { store, words }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(state.store_arc(), WordService::from_state(state))
    }

    pub async fn today(&self) -> Result<WordOfDay, AppError> {
        self.for_date(Utc::now().date_naive()).await
    }

    /// Stored pick for the date, or a fresh random word; never replaced once written.
    pub async fn for_date(&self, date: NaiveDate) -> Result<WordOfDay, AppError> {
        let key = word_of_day_key(date);
        if let Some(existing) = self.store.get_word_of_day(&key)? {
            return Ok(existing);
        }

        let word = self.words.random_word().await?;
        let entry = self.words.lookup(&word).await?;

        let pick = WordOfDay {
            date: key,
            word: entry.term().to_string(),
            meaning: entry.details.meaning.clone(),
            created_at: Utc::now(),
        };
        let stored = self.store.insert_word_of_day(&pick)?;
        if stored.word == pick.word {
            tracing::info!(date = %stored.date, word = %stored.word, "word of the day chosen");
        }
        Ok(stored)
    }
}
