//! Durable body storage for report text.
//!
//! Report bodies never live in the relational store. They are written through a
//! [`BlobStore`] and only accepted once [`VerifiedWriter`] has read them back.

pub mod fs;
pub mod http;
pub mod retry;
pub mod verify;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

pub use fs::FsBlobStore;
pub use http::HttpBlobStore;
pub use retry::RetryPolicy;
pub use verify::VerifiedWriter;

#[derive(Debug, Clone, Copy, Default)]
pub struct PutOptions {
    /// Replace an existing blob at the same key. Stores reject the write otherwise.
    pub overwrite: bool,
}

#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes `content` at `key` and returns the URL it can be read back from.
    async fn put(&self, key: &str, content: &str, options: PutOptions) -> anyhow::Result<String>;
    /// Reads the content behind a URL previously returned by `put`, bypassing caches.
    async fn get(&self, url: &str) -> anyhow::Result<String>;
    async fn delete(&self, url: &str) -> anyhow::Result<()>;
    fn name(&self) -> &str;
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("blob write failed: {0}")]
    Write(anyhow::Error),

    #[error("blob read failed: {0}")]
    Read(anyhow::Error),

    #[error("blob content not verified after {attempts} attempts")]
    Unverified { attempts: u32 },
}

/// Storage key for a new report body: `reports/{owner}/{millis}-{title}.txt`.
pub fn blob_key(owner_id: Uuid, at: DateTime<Utc>, title: &str) -> String {
    format!(
        "reports/{}/{}-{}.txt",
        owner_id,
        at.timestamp_millis(),
        sanitize_title(title)
    )
}

fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}
