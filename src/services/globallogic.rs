// src/services/globallogic.rs

//! GlobalLogic careers search page.

use async_trait::async_trait;
use chrono::Utc;
use scraper::Html;
use url::Url;

use crate::error::Result;
use crate::models::{BoardConfig, RawPosting, WorkModel};
use crate::services::{JobBoard, PageFetcher, parse_selector, select_text};
use crate::utils::resolve_url;

const BASE_URL: &str = "https://www.globallogic.com/career-search-page/";

/// Scrapes `div.career-pagelink` cards from the careers search.
pub struct GlobalLogicBoard {
    label: String,
    config: BoardConfig,
    fetcher: PageFetcher,
}

impl GlobalLogicBoard {
    pub(crate) fn new(config: BoardConfig, fetcher: PageFetcher) -> Self {
        Self {
            label: config.label(),
            config,
            fetcher,
        }
    }

    /// Search URL for the configured criteria.
    pub fn search_url(&self) -> Result<Url> {
        let mut url = Url::parse(self.config.base_url.as_deref().unwrap_or(BASE_URL))?;
        let filter = &self.config.filter;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("keywords", filter.keywords.as_deref().unwrap_or(""))
                .append_pair("experience", filter.experience.as_deref().unwrap_or(""))
                .append_pair("locations", filter.location.as_deref().unwrap_or(""))
                .append_pair("c", "");

            if filter.work_models.contains(&WorkModel::Freelance) {
                query.append_pair("freelance", "yes");
            }
            let models: Vec<&str> = filter
                .work_models
                .iter()
                .filter_map(|model| match model {
                    WorkModel::Remote => Some("Remote"),
                    WorkModel::Hybrid => Some("Hybrid"),
                    WorkModel::OnSite => Some("On-site"),
                    WorkModel::Freelance => None,
                })
                .collect();
            if !models.is_empty() {
                query.append_pair("workmodel", &models.join(","));
            }
        }
        Ok(url)
    }

    fn parse_listing(&self, html: &str, page_url: &Url) -> Result<Vec<RawPosting>> {
        let document = Html::parse_document(html);
        let card_sel = parse_selector("div.career-pagelink")?;
        let link_sel = parse_selector("p > a")?;
        let req_sel = parse_selector("p.id-num")?;

        let scraped_at = Utc::now();
        let mut postings = Vec::new();
        for card in document.select(&card_sel) {
            let Some(link) = card.select(&link_sel).next() else {
                log::debug!("{}: card without a title link", self.label);
                continue;
            };

            let mut raw = RawPosting::new(self.config.kind.source_name(), scraped_at);
            raw.title = select_text(&card, &link_sel);
            raw.url = link.value().attr("href").map(|href| resolve_url(page_url, href));
            raw.company = Some("GlobalLogic".to_string());
            raw.location = self.config.filter.location.clone();
            raw.experience_level = self.config.filter.experience.clone();
            raw.category = Some(self.config.category.clone());
            raw.summary = select_text(&card, &req_sel);
            postings.push(raw);
        }

        // Page lists newest first
        postings.reverse();
        Ok(postings)
    }
}

#[async_trait]
impl JobBoard for GlobalLogicBoard {
    fn name(&self) -> &str {
        &self.label
    }

    async fn fetch(&self) -> Result<Vec<RawPosting>> {
        let url = self.search_url()?;
        let html = self.fetcher.get(url.as_str()).await?;
        self.parse_listing(&html, &url)
    }
}
