//! Durable object storage for generated images.
//!
//! `S3Storage` talks to any S3-compatible endpoint; `MemoryStorage` keeps
//! objects in-process for development and tests.

pub mod memory;
pub mod s3;

pub use memory::MemoryStorage;
pub use s3::S3Storage;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage is not configured: {0}")]
    NotConfigured(String),
    #[error("upload failed: {0}")]
    Upload(String),
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `data` under `key` and return its public URL.
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<String, StorageError>;

    fn public_url(&self, key: &str) -> String;
}

pub(crate) fn join_url(base_url: &str, key: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        key.trim_start_matches('/')
    )
}
