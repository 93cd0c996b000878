//! CSV file store.
//!
//! The file is the whole truth; the in-memory set only mirrors its keys so
//! `exists` is a hash lookup instead of a scan.
//!
//! ## Commit protocol
//!
//! 1. Stamp the store file (length, mtime and inode) and re-read it, so rows
//!    committed by a concurrent run are kept
//! 2. Append the new rows to that snapshot and write it to a temp file
//! 3. Re-stamp the store; if another writer renamed over it meanwhile, drop
//!    the temp file and start again from 1
//! 4. Otherwise rename the fsynced temp file over the store
//!
//! There is no file lock, so a rename landing between the re-stamp in 3 and
//! the rename in 4 is still lost. Its keys are then seen as new next run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{IdentityKey, Posting};
use crate::storage::{PostingStore, StoredPosting};

const COMMIT_ATTEMPTS: u32 = 3;

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Flat-file store backend.
pub struct CsvStore {
    path: PathBuf,
    keys: Mutex<HashSet<IdentityKey>>,
}

/// What the store file looked like when a commit read it.
#[derive(Debug, PartialEq, Eq)]
struct FileStamp {
    len: u64,
    modified: Option<SystemTime>,
    #[cfg(unix)]
    inode: u64,
}

impl FileStamp {
    async fn of(path: &Path) -> Result<Option<Self>> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(Some(Self {
                len: meta.len(),
                modified: meta.modified().ok(),
                #[cfg(unix)]
                inode: std::os::unix::fs::MetadataExt::ino(&meta),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

/// A merged snapshot sitting in a temp file, not yet renamed into place.
struct Staged {
    tmp: Option<PathBuf>,
    base: Option<FileStamp>,
    keys: HashSet<IdentityKey>,
    added: Vec<IdentityKey>,
}

impl CsvStore {
    /// Load the key index from `path`. A missing file is an empty store.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = read_records(&path).await?;
        log::info!(
            "Loaded {} known postings from {}",
            records.len(),
            path.display()
        );

        let keys = records.into_iter().map(|r| r.identity_key).collect();
        Ok(Self {
            path,
            keys: Mutex::new(keys),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write bytes to a fresh temp file next to the store and fsync it.
    async fn write_tmp(&self, bytes: &[u8]) -> Result<PathBuf> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.tmp_path();
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(tmp)
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(format!(
            ".{}.{}.tmp",
            std::process::id(),
            TMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        self.path.with_file_name(name)
    }

    /// Merge `postings` into the current file contents, staged in a temp file.
    async fn stage(&self, postings: &[Posting]) -> Result<Staged> {
        let base = FileStamp::of(&self.path).await?;
        let mut records = read_records(&self.path).await?;
        let mut keys: HashSet<IdentityKey> =
            records.iter().map(|r| r.identity_key.clone()).collect();

        let now = Utc::now();
        let mut added = Vec::new();
        for posting in postings {
            if keys.insert(posting.identity_key.clone()) {
                records.push(StoredPosting::from_posting(posting, now));
                added.push(posting.identity_key.clone());
            }
        }

        let tmp = if added.is_empty() {
            None
        } else {
            Some(self.write_tmp(&encode_records(&records)?).await?)
        };
        Ok(Staged {
            tmp,
            base,
            keys,
            added,
        })
    }

    /// Rename the staged file over the store, unless the store changed since
    /// it was read. Returns whether the snapshot was published.
    async fn publish(&self, staged: &Staged) -> Result<bool> {
        let Some(tmp) = &staged.tmp else {
            return Ok(true);
        };

        if FileStamp::of(&self.path).await? != staged.base {
            if let Err(e) = tokio::fs::remove_file(tmp).await {
                log::warn!("Could not remove stale {}: {}", tmp.display(), e);
            }
            return Ok(false);
        }

        tokio::fs::rename(tmp, &self.path).await?;
        Ok(true)
    }

    async fn commit(
        &self,
        keys: &mut HashSet<IdentityKey>,
        postings: &[Posting],
    ) -> Result<Vec<IdentityKey>> {
        for attempt in 1..=COMMIT_ATTEMPTS {
            let staged = self.stage(postings).await?;
            if self.publish(&staged).await? {
                *keys = staged.keys;
                return Ok(staged.added);
            }
            log::warn!(
                "{} changed during commit, merging again ({}/{})",
                self.path.display(),
                attempt,
                COMMIT_ATTEMPTS
            );
        }
        Err(AppError::store_write(
            "store file kept changing during commit",
        ))
    }
}

#[async_trait]
impl PostingStore for CsvStore {
    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }

    async fn exists(&self, key: &IdentityKey) -> Result<bool> {
        Ok(self.keys.lock().await.contains(key))
    }

    async fn insert_many(&self, postings: &[Posting]) -> Result<Vec<IdentityKey>> {
        let mut keys = self.keys.lock().await;
        if postings.iter().all(|p| keys.contains(&p.identity_key)) {
            return Ok(Vec::new());
        }

        self.commit(&mut keys, postings)
            .await
            .map_err(|e| AppError::store_write(format!("{}: {}", self.path.display(), e)))
    }

    async fn persist(&self) -> Result<()> {
        // Leave a header-only file behind on a quiet cold start so there is
        // something for the cache step to save.
        if tokio::fs::try_exists(&self.path).await? {
            return Ok(());
        }
        let tmp = self.write_tmp(&encode_records(&[])?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.keys.lock().await.len())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<StoredPosting>> {
        let mut records = read_records(&self.path).await?;
        records.sort_by(|a, b| b.first_seen.cmp(&a.first_seen));
        records.truncate(limit);
        Ok(records)
    }
}

/// Read every row; a missing file yields no rows and bad rows are skipped.
async fn read_records(path: &Path) -> Result<Vec<StoredPosting>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::warn!("No store found at {}", path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(AppError::Io(e)),
    };

    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let mut records = Vec::new();
    for (line, row) in reader.deserialize::<StoredPosting>().enumerate() {
        match row {
            Ok(record) => records.push(record),
            Err(e) => log::warn!("Skipping unreadable store row {}: {}", line + 2, e),
        }
    }
    Ok(records)
}

fn encode_records(records: &[StoredPosting]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(HEADER)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer
        .into_inner()
        .map_err(|e| AppError::store_write(e.to_string()))
}

const HEADER: [&str; 6] = ["identity_key", "first_seen", "source", "title", "url", "category"];
