//! Durable store of every posting identity ever seen.
//!
//! Two interchangeable backends sit behind [`PostingStore`]:
//!
//! ```text
//! data/
//! ├── seen_postings.csv     # CsvStore: header + one row per identity key
//! └── job_data.db           # SqliteStore: seen_postings table, key is PRIMARY KEY
//! ```
//!
//! Both commit atomically. The CSV store rewrites through a temporary file
//! and renames it into place; SQLite wraps each batch in a transaction. A run
//! killed mid-commit leaves the previous state intact.
//!
//! A store that is missing or cannot be opened is a cold start: the run
//! begins empty and every scraped posting is new.

pub mod csv_file;
pub mod sqlite;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{IdentityKey, Posting, StoreBackend, StoreConfig};

// Re-export for convenience
pub use csv_file::CsvStore;
pub use sqlite::SqliteStore;

/// One row of the durable store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPosting {
    pub identity_key: IdentityKey,
    pub first_seen: DateTime<Utc>,
    pub source: String,
    pub title: String,
    pub url: String,
    pub category: String,
}

impl StoredPosting {
    pub fn from_posting(posting: &Posting, first_seen: DateTime<Utc>) -> Self {
        Self {
            identity_key: posting.identity_key.clone(),
            first_seen,
            source: posting.source.clone(),
            title: posting.title.clone(),
            url: posting.url.clone(),
            category: posting.category.clone(),
        }
    }
}

/// Trait for durable store backends.
///
/// Handles release their backing resource on drop, so every exit path
/// (including an aborted run) closes the file or connection.
#[async_trait]
pub trait PostingStore: Send + Sync {
    /// Human-readable backend and location, for logs.
    fn describe(&self) -> String;

    /// Whether an identity key has been recorded before.
    async fn exists(&self, key: &IdentityKey) -> Result<bool>;

    /// Record postings in one atomic commit.
    ///
    /// Keys already present are skipped, not errors. Returns the keys this
    /// call actually added, in input order.
    async fn insert_many(&self, postings: &[Posting]) -> Result<Vec<IdentityKey>>;

    /// Flush anything the backend still holds before the process exits.
    async fn persist(&self) -> Result<()>;

    /// Number of recorded identity keys.
    async fn count(&self) -> Result<usize>;

    /// Most recently recorded postings, newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<StoredPosting>>;
}

/// Open the configured store, falling back to a cold start.
///
/// An unreadable store file is moved aside (`<name>.corrupt-<timestamp>`)
/// so the run can start from an empty store instead of failing.
pub async fn open_store(config: &StoreConfig) -> Result<Box<dyn PostingStore>> {
    match load_backend(config.backend, &config.path).await {
        Ok(store) => Ok(store),
        Err(e) => {
            log::warn!(
                "Could not load {} store at {}: {}. Starting cold.",
                config.backend,
                config.path.display(),
                e
            );
            let aside = quarantine_path(&config.path);
            tokio::fs::rename(&config.path, &aside).await?;
            log::warn!("Previous store moved to {}", aside.display());
            load_backend(config.backend, &config.path).await
        }
    }
}

async fn load_backend(backend: StoreBackend, path: &Path) -> Result<Box<dyn PostingStore>> {
    let store: Box<dyn PostingStore> = match backend {
        StoreBackend::Csv => Box::new(CsvStore::load(path).await?),
        StoreBackend::Sqlite => Box::new(SqliteStore::open(path)?),
    };
    Ok(store)
}

fn quarantine_path(path: &Path) -> PathBuf {
    let stamp = Utc::now().format("%Y%m%d%H%M%S");
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".corrupt-{stamp}"));
    path.with_file_name(name)
}
