//! Service layer: the outside world the pipeline talks to.
//!
//! This module contains:
//! - Job boards (`GlobalLogicBoard`, `DouBoard`, `DjinniBoard`) behind [`JobBoard`]
//! - The Telegram Bot API client (`TelegramClient`)

mod djinni;
mod dou;
mod globallogic;
mod telegram;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{BoardConfig, BoardKind, CrawlerConfig, Posting, RawPosting};
use crate::utils::http::fetch_text;
use crate::utils::retry::retry_with_backoff;

pub use djinni::DjinniBoard;
pub use dou::DouBoard;
pub use globallogic::GlobalLogicBoard;
pub use telegram::TelegramClient;

/// A source of raw postings.
///
/// Implementations fetch and parse one listing page or feed. Any failure is
/// reported as an error for the whole board; the pipeline turns it into
/// `ScrapeUnavailable` and carries on with the other boards.
#[async_trait]
pub trait JobBoard: Send + Sync {
    /// Name used in logs and for `--board` selection.
    fn name(&self) -> &str;

    /// Fetch the current listing, oldest posting first.
    async fn fetch(&self) -> Result<Vec<RawPosting>>;

    /// Local check on a normalized posting from this board.
    fn accepts(&self, _posting: &Posting) -> bool {
        true
    }
}

/// Construct the board described by `config`.
pub fn build_board(
    config: &BoardConfig,
    client: Client,
    crawler: &CrawlerConfig,
) -> Box<dyn JobBoard> {
    let fetcher = PageFetcher {
        client,
        max_retries: crawler.max_retries,
        backoff_base_secs: crawler.backoff_base_secs,
    };
    match config.kind {
        BoardKind::GlobalLogic => Box::new(GlobalLogicBoard::new(config.clone(), fetcher)),
        BoardKind::Dou => Box::new(DouBoard::new(config.clone(), fetcher)),
        BoardKind::Djinni => Box::new(DjinniBoard::new(config.clone(), fetcher)),
    }
}

/// HTTP GET with the crawler's bounded retry policy.
#[derive(Clone)]
pub(crate) struct PageFetcher {
    client: Client,
    max_retries: u32,
    backoff_base_secs: u64,
}

impl PageFetcher {
    async fn get(&self, url: &str) -> Result<String> {
        log::debug!("GET {}", url);
        retry_with_backoff(self.max_retries, self.backoff_base_secs, || {
            fetch_text(&self.client, url)
        })
        .await
    }
}

pub(crate) fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Text content of the first match, whitespace-collapsed.
pub(crate) fn select_text(element: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    let text: String = element.select(selector).next()?.text().collect();
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

/// Strip HTML tags, decode entities and collapse whitespace.
pub(crate) fn strip_html(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
