//! SQLite store.
//!
//! One table, `seen_postings`, with the identity key as primary key. Each
//! `insert_many` is a single transaction of `INSERT OR IGNORE`s, so a batch
//! is either fully recorded or not at all, and a racing run's rows are left
//! alone.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{IdentityKey, Posting};
use crate::storage::{PostingStore, StoredPosting};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS seen_postings (
        identity_key TEXT PRIMARY KEY NOT NULL,
        first_seen   TEXT NOT NULL,
        source       TEXT NOT NULL,
        title        TEXT NOT NULL,
        url          TEXT NOT NULL,
        category     TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_seen_postings_first_seen ON seen_postings (first_seen);
";

/// SQLite store backend.
pub struct SqliteStore {
    location: String,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and ensure the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let store = Self::init(conn, path.display().to_string())?;
        log::info!("Opened SQLite store at {}", path.display());
        Ok(store)
    }

    /// Private in-memory database, for tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, ":memory:".to_string())
    }

    /// Location of a file-backed store, if any.
    pub fn path(&self) -> Option<PathBuf> {
        (self.location != ":memory:").then(|| PathBuf::from(&self.location))
    }

    fn init(conn: Connection, location: String) -> Result<Self> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        // Rollback journal keeps the database a single file between runs
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "DELETE", |row| row.get(0))?;
        log::debug!("SQLite journal mode: {}", mode);
        conn.pragma_update(None, "synchronous", "FULL")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            location,
            conn: Mutex::new(conn),
        })
    }

    fn write_batch(
        conn: &mut Connection,
        postings: &[Posting],
    ) -> rusqlite::Result<Vec<IdentityKey>> {
        let now = Utc::now();
        let tx = conn.transaction()?;
        let mut added = Vec::new();
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO seen_postings
                     (identity_key, first_seen, source, title, url, category)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for posting in postings {
                let rows = stmt.execute(params![
                    posting.identity_key.as_str(),
                    now,
                    posting.source,
                    posting.title,
                    posting.url,
                    posting.category,
                ])?;
                if rows > 0 {
                    added.push(posting.identity_key.clone());
                }
            }
        }
        tx.commit()?;
        Ok(added)
    }
}

#[async_trait]
impl PostingStore for SqliteStore {
    fn describe(&self) -> String {
        format!("sqlite:{}", self.location)
    }

    async fn exists(&self, key: &IdentityKey) -> Result<bool> {
        let conn = self.conn.lock().await;
        let found = conn
            .prepare_cached("SELECT 1 FROM seen_postings WHERE identity_key = ?1")?
            .query_row(params![key.as_str()], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    async fn insert_many(&self, postings: &[Posting]) -> Result<Vec<IdentityKey>> {
        if postings.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.lock().await;
        Self::write_batch(&mut conn, postings)
            .map_err(|e| AppError::store_write(format!("{}: {}", self.location, e)))
    }

    async fn persist(&self) -> Result<()> {
        // Commits are already durable; this only tidies the file before it
        // is cached.
        let conn = self.conn.lock().await;
        conn.execute_batch("PRAGMA optimize;")?;
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().await;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM seen_postings", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<StoredPosting>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT identity_key, first_seen, source, title, url, category
               FROM seen_postings
              ORDER BY first_seen DESC
              LIMIT ?1",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![limit], |row| {
            Ok(StoredPosting {
                identity_key: IdentityKey::new(row.get::<_, String>(0)?),
                first_seen: row.get::<_, DateTime<Utc>>(1)?,
                source: row.get(2)?,
                title: row.get(3)?,
                url: row.get(4)?,
                category: row.get(5)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawPosting;
    use crate::pipeline::normalize;
    use tempfile::TempDir;

    fn posting(title: &str, url: &str) -> Posting {
        let raw = RawPosting {
            title: Some(title.into()),
            url: Some(url.into()),
            ..RawPosting::new("globallogic", Utc::now())
        };
        normalize(&raw).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_exists() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = posting("Rust Dev", "https://x.io/1");

        assert!(!store.exists(&a.identity_key).await.unwrap());
        assert_eq!(store.insert_many(&[a.clone()]).await.unwrap().len(), 1);
        assert!(store.exists(&a.identity_key).await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = posting("Rust Dev", "https://x.io/1");
        let b = posting("Go Dev", "https://x.io/2");

        assert_eq!(store.insert_many(&[a.clone()]).await.unwrap().len(), 1);
        assert_eq!(
            store.insert_many(&[a.clone(), b.clone()]).await.unwrap(),
            vec![b.identity_key]
        );
        assert!(store.insert_many(&[a]).await.unwrap().is_empty());
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_reopen_keeps_rows() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data/job_data.db");
        let a = posting("Rust Dev", "https://x.io/1");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_many(&[a.clone()]).await.unwrap();
            store.persist().await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert!(store.exists(&a.identity_key).await.unwrap());
        assert_eq!(store.path(), Some(path));
    }

    #[tokio::test]
    async fn test_recent_returns_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_many(&[posting("A", "https://x.io/1"), posting("B", "https://x.io/2")])
            .await
            .unwrap();

        let recent = store.recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent.iter().all(|r| r.source == "globallogic"));
    }
}
