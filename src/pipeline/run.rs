//! One full scrape → dedup → notify cycle.

use std::fmt;
use std::time::Duration;

use futures::stream::{self, StreamExt};

use crate::error::{AppError, Result};
use crate::models::{CrawlerConfig, DeliveryOutcome, Posting};
use crate::pipeline::dedup::DedupEngine;
use crate::pipeline::dispatch::Dispatcher;
use crate::pipeline::normalize::normalize;
use crate::services::JobBoard;
use crate::storage::PostingStore;

/// Counters and per-posting outcomes of one run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub boards_ok: usize,
    pub boards_failed: usize,
    pub scraped: usize,
    pub malformed: usize,
    pub filtered: usize,
    pub new: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    pub outcomes: Vec<(Posting, DeliveryOutcome)>,
}

impl RunSummary {
    fn record_outcomes(&mut self, outcomes: Vec<(Posting, DeliveryOutcome)>) {
        for (_, outcome) in &outcomes {
            match outcome {
                DeliveryOutcome::Sent => self.sent += 1,
                DeliveryOutcome::Failed(_) => self.failed += 1,
                DeliveryOutcome::Skipped(_) => self.skipped += 1,
            }
        }
        self.outcomes = outcomes;
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "boards {}/{} ok, {} scraped ({} malformed, {} filtered), {} new: {} sent, {} failed, {} skipped",
            self.boards_ok,
            self.boards_ok + self.boards_failed,
            self.scraped,
            self.malformed,
            self.filtered,
            self.new,
            self.sent,
            self.failed,
            self.skipped
        )
    }
}

/// Run the pipeline once over `boards`.
///
/// Boards are fetched concurrently (at most `crawler.max_concurrent` at a
/// time, paced by `crawler.request_delay_ms`) but their postings are merged
/// in board order, so when two boards return the same listing the earlier
/// board's copy is the one kept.
///
/// # Errors
///
/// - [`AppError::AllBoardsUnavailable`] when every board failed
/// - [`AppError::StoreWrite`] when the new postings could not be committed;
///   nothing is dispatched in that case
pub async fn run_pipeline(
    boards: &[Box<dyn JobBoard>],
    store: &dyn PostingStore,
    dispatcher: &Dispatcher<'_>,
    crawler: &CrawlerConfig,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    let delay = Duration::from_millis(crawler.request_delay_ms);

    let mut board_stream = stream::iter(boards)
        .map(|board| async move { (board, board.fetch().await) })
        .buffered(crawler.max_concurrent.max(1));

    let mut batch = Vec::new();
    while let Some((board, result)) = board_stream.next().await {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let raws = match result {
            Ok(raws) => raws,
            Err(e) => {
                let e = match e {
                    AppError::ScrapeUnavailable { .. } => e,
                    other => AppError::unavailable(board.name(), other),
                };
                log::warn!("{}", e);
                summary.boards_failed += 1;
                continue;
            }
        };

        summary.boards_ok += 1;
        summary.scraped += raws.len();
        log::info!("{}: {} postings", board.name(), raws.len());

        for raw in &raws {
            match normalize(raw) {
                Ok(posting) if board.accepts(&posting) => batch.push(posting),
                Ok(posting) => {
                    log::debug!("{}: filtered out '{}'", board.name(), posting.title);
                    summary.filtered += 1;
                }
                Err(e) => {
                    log::warn!("{}", e);
                    summary.malformed += 1;
                }
            }
        }
    }

    if !boards.is_empty() && summary.boards_ok == 0 {
        return Err(AppError::AllBoardsUnavailable {
            count: boards.len(),
        });
    }

    let fresh = DedupEngine::new(store).process(batch).await?;
    summary.new = fresh.len();

    let outcomes = dispatcher.dispatch(fresh).await;
    summary.record_outcomes(outcomes);

    store.persist().await.map_err(AppError::store_write)?;

    log::info!("Run complete: {}", summary);
    Ok(summary)
}
