use crate::store::operations::words::WordEntry;
use crate::store::{keys, Store, StoreError};

const VERSION_KEY: &str = "_meta:version";

type MigrationFn = fn(&Store) -> Result<(), StoreError>;

fn migrations() -> Vec<(&'static str, MigrationFn)> {
    vec![
        ("001_initial", m001_initial),
        ("002_normalize_word_keys", m002_normalize_word_keys),
    ]
}

/// Apply every migration newer than the stored schema version.
///
/// Each migration must be idempotent: the process can die after `func()` succeeds
/// but before `set_version()` persists, and the migration then runs again.
/// Versions only move forward.
pub fn run(store: &Store) -> Result<(), StoreError> {
    let current = get_current_version(store)?;
    let all = migrations();

    for (index, (name, func)) in all.iter().enumerate() {
        let version = (index + 1) as u32;
        if version > current {
            tracing::info!(version, name, "Running migration");
            func(store)?;
            set_version(store, version)?;
            tracing::info!(version, name, "Migration complete");
        } else {
            tracing::debug!(version, name, "Migration already applied, skipping");
        }
    }

    Ok(())
}

pub fn get_current_version(store: &Store) -> Result<u32, StoreError> {
    match store.meta.get(VERSION_KEY.as_bytes())? {
        Some(raw) => {
            let bytes: [u8; 4] = raw.as_ref().try_into().map_err(|_| StoreError::Migration {
                version: 0,
                message: "corrupt schema version".to_string(),
            })?;
            Ok(u32::from_be_bytes(bytes))
        }
        None => Ok(0),
    }
}

pub fn set_version(store: &Store, version: u32) -> Result<(), StoreError> {
    let current = get_current_version(store)?;
    if version < current {
        return Err(StoreError::Migration {
            version,
            message: format!("Refuse to downgrade from {} to {}", current, version),
        });
    }

    store
        .meta
        .insert(VERSION_KEY.as_bytes(), &version.to_be_bytes())?;
    Ok(())
}

fn m001_initial(_store: &Store) -> Result<(), StoreError> {
    Ok(())
}

/// Re-key word documents whose key is not the normalized term (imports written
/// before keys were lower-cased). The first document for a term wins.
fn m002_normalize_word_keys(store: &Store) -> Result<(), StoreError> {
    let mut moves = Vec::new();
    for item in store.words.iter() {
        let (key, value) = item?;
        let key_str = String::from_utf8_lossy(&key).to_string();
        let normalized = keys::word_key(&key_str);
        if normalized != key_str {
            moves.push((key.to_vec(), normalized, value.to_vec()));
        }
    }

    for (old_key, new_key, raw) in moves {
        let mut entry: WordEntry = Store::deserialize(&raw)?;
        entry.details.word = new_key.clone();
        let bytes = Store::serialize(&entry)?;
        let _ = store
            .words
            .compare_and_swap(new_key.as_bytes(), None::<&[u8]>, Some(bytes))?;
        store.words.remove(old_key)?;
    }

    Ok(())
}
