pub mod keys;
pub mod migrate;
pub mod operations;
pub mod trees;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::Db;
use thiserror::Error;

use crate::constants::MAX_CAS_RETRIES;

#[derive(Debug)]
pub struct Store {
    db: Db,
    pub words: sled::Tree,
    pub subjects: sled::Tree,
    pub word_of_day: sled::Tree,
    pub users: sled::Tree,
    pub meta: sled::Tree,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("not found: entity={entity}, key={key}")]
    NotFound { entity: String, key: String },
    #[error("conflict: entity={entity}, key={key}")]
    Conflict { entity: String, key: String },
    #[error("CAS retry exhausted after {attempts} attempts: entity={entity}, key={key}")]
    CasRetryExhausted {
        entity: String,
        key: String,
        attempts: u32,
    },
    #[error("validation error: {0}")]
    Validation(String),
    #[error("migration error at version {version}: {message}")]
    Migration { version: u32, message: String },
}

impl Store {
    pub fn open(sled_path: &str) -> Result<Self, StoreError> {
        let db = sled::open(sled_path)?;
        let words = db.open_tree(trees::WORDS)?;
        let subjects = db.open_tree(trees::SUBJECTS)?;
        let word_of_day = db.open_tree(trees::WORD_OF_DAY)?;
        let users = db.open_tree(trees::USERS)?;
        let meta = db.open_tree(trees::META)?;

        Ok(Self {
            db,
            words,
            subjects,
            word_of_day,
            users,
            meta,
        })
    }

    pub fn run_migrations(&self) -> Result<(), StoreError> {
        migrate::run(self)
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    pub fn raw_db(&self) -> &Db {
        &self.db
    }

    pub(crate) fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(value)?)
    }

    pub(crate) fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Insert `value` only if `key` is absent. Returns `Conflict` otherwise.
    pub(crate) fn insert_new<T: Serialize>(
        tree: &sled::Tree,
        entity: &str,
        key: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let bytes = Self::serialize(value)?;
        let cas = tree.compare_and_swap(key.as_bytes(), None::<&[u8]>, Some(bytes))?;
        if cas.is_err() {
            return Err(StoreError::Conflict {
                entity: entity.to_string(),
                key: key.to_string(),
            });
        }
        Ok(())
    }

    /// Read-modify-write a JSON document with compare-and-swap.
    ///
    /// `apply` receives the current value (or `None`) and returns the new value;
    /// returning `Ok(None)` leaves the key untouched. The closure may run more than
    /// once when another writer wins the race.
    pub(crate) fn update_json<T, F>(
        tree: &sled::Tree,
        entity: &str,
        key: &str,
        mut apply: F,
    ) -> Result<Option<T>, StoreError>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(Option<T>) -> Result<Option<T>, StoreError>,
    {
        for _ in 0..MAX_CAS_RETRIES {
            let current_raw = tree.get(key.as_bytes())?;
            let current = match &current_raw {
                Some(raw) => Some(Self::deserialize::<T>(raw)?),
                None => None,
            };

            let Some(next) = apply(current)? else {
                return Ok(None);
            };
            let next_bytes = Self::serialize(&next)?;

            match tree.compare_and_swap(key.as_bytes(), current_raw, Some(next_bytes))? {
                Ok(()) => return Ok(Some(next)),
                Err(_) => {
                    tracing::debug!(entity, key, "CAS conflict, retrying");
                    continue;
                }
            }
        }

        Err(StoreError::CasRetryExhausted {
            entity: entity.to_string(),
            key: key.to_string(),
            attempts: MAX_CAS_RETRIES,
        })
    }
}
