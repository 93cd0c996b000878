//! Batch deduplication against the durable store.
//!
//! Order of operations per batch:
//! 1. Drop repeats inside the batch (first occurrence wins)
//! 2. Partition against the store with `exists`
//! 3. Commit the new set with one `insert_many`
//! 4. Only then hand back the postings this commit actually added
//!
//! Nothing is returned unless this run committed it, so a failed write can
//! never lead to a notification, and a key a racing run recorded first is
//! left for that run to notify.

use std::collections::HashSet;

use crate::error::{AppError, Result};
use crate::models::{IdentityKey, Posting};
use crate::storage::PostingStore;

/// Splits scraped batches into known and new postings.
pub struct DedupEngine<'a> {
    store: &'a dyn PostingStore,
}

impl<'a> DedupEngine<'a> {
    pub fn new(store: &'a dyn PostingStore) -> Self {
        Self { store }
    }

    /// Return the postings in `batch` never seen before, after recording them.
    ///
    /// # Errors
    ///
    /// [`AppError::StoreWrite`] if the lookup or commit fails. The whole
    /// batch is then treated as unprocessed.
    pub async fn process(&self, batch: Vec<Posting>) -> Result<Vec<Posting>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let total = batch.len();
        let mut seen = HashSet::new();
        let distinct: Vec<Posting> = batch
            .into_iter()
            .filter(|p| seen.insert(p.identity_key.clone()))
            .collect();
        if distinct.len() < total {
            log::debug!(
                "Dropped {} in-batch duplicates",
                total - distinct.len()
            );
        }

        let mut fresh = Vec::new();
        for posting in distinct {
            let known = self
                .store
                .exists(&posting.identity_key)
                .await
                .map_err(|e| AppError::store_write(format!("existence check failed: {e}")))?;
            if !known {
                fresh.push(posting);
            }
        }

        if fresh.is_empty() {
            log::info!("No new postings in batch of {}", total);
            return Ok(fresh);
        }

        let inserted: HashSet<IdentityKey> = self
            .store
            .insert_many(&fresh)
            .await
            .map_err(|e| match e {
                AppError::StoreWrite(_) => e,
                other => AppError::store_write(other),
            })?
            .into_iter()
            .collect();
        if inserted.len() < fresh.len() {
            // Another run committed some of these between our check and write
            log::warn!(
                "Store recorded {} of {} new postings; the rest were committed concurrently",
                inserted.len(),
                fresh.len()
            );
            fresh.retain(|p| inserted.contains(&p.identity_key));
        }

        log::info!(
            "Committed {} new postings to {}",
            fresh.len(),
            self.store.describe()
        );
        Ok(fresh)
    }
}
