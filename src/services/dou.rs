// src/services/dou.rs

//! jobs.dou.ua vacancy listings.

use async_trait::async_trait;
use chrono::Utc;
use scraper::Html;
use url::Url;

use crate::error::Result;
use crate::models::{BoardConfig, RawPosting, WorkModel};
use crate::services::{JobBoard, PageFetcher, parse_selector, select_text};
use crate::utils::{extract_posting_id, resolve_url};

const BASE_URL: &str = "https://jobs.dou.ua/vacancies/";
const FIRST_JOB_URL: &str = "https://jobs.dou.ua/first-job/";

/// Scrapes `li.l-vacancy` rows from a DOU listing.
///
/// The first-job listing only understands the `city` filter; everything
/// else is dropped from its query.
pub struct DouBoard {
    label: String,
    config: BoardConfig,
    fetcher: PageFetcher,
}

impl DouBoard {
    pub(crate) fn new(config: BoardConfig, fetcher: PageFetcher) -> Self {
        Self {
            label: config.label(),
            config,
            fetcher,
        }
    }

    /// Listing URL for the configured criteria.
    pub fn search_url(&self) -> Result<Url> {
        let default = if self.config.no_experience {
            FIRST_JOB_URL
        } else {
            BASE_URL
        };
        let mut url = Url::parse(self.config.base_url.as_deref().unwrap_or(default))?;

        let filter = &self.config.filter;
        let full = !self.config.no_experience;
        {
            let mut query = url.query_pairs_mut();
            if full && filter.work_models.contains(&WorkModel::Remote) {
                query.append_key_only("remote");
            }
            if full && self.config.relocation {
                query.append_key_only("relocation");
            }
            if let Some(city) = filter.location.as_deref() {
                query.append_pair("city", city);
            }
            if let (true, Some(category)) = (full, filter.keywords.as_deref()) {
                query.append_pair("category", category);
            }
            if let (true, Some(exp)) = (full, filter.experience.as_deref()) {
                query.append_pair("exp", exp);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        Ok(url)
    }

    fn parse_listing(&self, html: &str, page_url: &Url) -> Result<Vec<RawPosting>> {
        let document = Html::parse_document(html);
        let row_sel = parse_selector("ul > li.l-vacancy")?;
        let date_sel = parse_selector("div.date")?;
        let title_sel = parse_selector("div.title > a")?;
        let company_sel = parse_selector("div.title > strong")?;
        let salary_sel = parse_selector("span.salary")?;
        let cities_sel = parse_selector("span.cities")?;
        let info_sel = parse_selector("div.sh-info")?;

        let scraped_at = Utc::now();
        let mut postings = Vec::new();
        for row in document.select(&row_sel) {
            let link = row
                .select(&title_sel)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(|href| resolve_url(page_url, href));

            let mut raw = RawPosting::new(self.config.kind.source_name(), scraped_at);
            raw.site_id = link.as_deref().and_then(extract_posting_id);
            raw.url = link;
            raw.title = select_text(&row, &title_sel);
            raw.company = select_text(&row, &company_sel);
            raw.salary = select_text(&row, &salary_sel);
            raw.location = select_text(&row, &cities_sel);
            raw.summary = select_text(&row, &info_sel);
            raw.published = select_text(&row, &date_sel);
            raw.experience_level = self.config.filter.experience.clone();
            raw.category = Some(self.config.category.clone());
            raw.work_model = raw.location.as_deref().and_then(remote_hint);
            postings.push(raw);
        }

        // Page lists newest first
        postings.reverse();
        Ok(postings)
    }
}

/// DOU marks remote vacancies in the cities line.
fn remote_hint(cities: &str) -> Option<String> {
    let lower = cities.to_lowercase();
    (lower.contains("віддалено") || lower.contains("remote")).then(|| "remote".to_string())
}

#[async_trait]
impl JobBoard for DouBoard {
    fn name(&self) -> &str {
        &self.label
    }

    async fn fetch(&self) -> Result<Vec<RawPosting>> {
        let url = self.search_url()?;
        let html = self.fetcher.get(url.as_str()).await?;
        self.parse_listing(&html, &url)
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Client;

    use super::*;
    use crate::models::{BoardKind, CrawlerConfig};

    fn board(config: BoardConfig) -> DouBoard {
        let crawler = CrawlerConfig::default();
        let fetcher = PageFetcher {
            client: Client::new(),
            max_retries: crawler.max_retries,
            backoff_base_secs: crawler.backoff_base_secs,
        };
        DouBoard::new(config, fetcher)
    }

    #[test]
    fn test_search_url_vacancies() {
        let mut config = BoardConfig::new(BoardKind::Dou, "python");
        config.filter.keywords = Some("Python".into());
        config.filter.experience = Some("0-1".into());
        config.filter.work_models = vec![WorkModel::Remote];

        let url = board(config).search_url().unwrap();
        assert_eq!(
            url.as_str(),
            "https://jobs.dou.ua/vacancies/?remote&category=Python&exp=0-1"
        );
    }

    #[test]
    fn test_search_url_first_job_keeps_only_city() {
        let mut config = BoardConfig::new(BoardKind::Dou, "no_experience");
        config.no_experience = true;
        config.filter.keywords = Some("Python".into());
        config.filter.location = Some("remote".into());

        let url = board(config).search_url().unwrap();
        assert_eq!(url.as_str(), "https://jobs.dou.ua/first-job/?city=remote");
    }

    #[test]
    fn test_search_url_without_filters() {
        let config = BoardConfig::new(BoardKind::Dou, "python");
        let url = board(config).search_url().unwrap();
        assert_eq!(url.as_str(), "https://jobs.dou.ua/vacancies/");
    }

    #[test]
    fn test_parse_listing() {
        let html = r#"
            <ul>
              <li class="l-vacancy">
                <div class="date">12 травня</div>
                <div class="title">
                  <a href="https://jobs.dou.ua/companies/acme/vacancies/200/">Python Developer</a>
                  <strong>Acme</strong>
                </div>
                <span class="salary">$1500</span>
                <span class="cities">Київ, віддалено</span>
                <div class="sh-info">Django, REST, PostgreSQL</div>
              </li>
              <li class="l-vacancy">
                <div class="date">11 травня</div>
                <div class="title">
                  <a href="https://jobs.dou.ua/companies/beta/vacancies/100/">Junior Python</a>
                </div>
              </li>
            </ul>
        "#;
        let b = board(BoardConfig::new(BoardKind::Dou, "python"));
        let url = b.search_url().unwrap();
        let postings = b.parse_listing(html, &url).unwrap();

        assert_eq!(postings.len(), 2);
        assert_eq!(postings[0].title.as_deref(), Some("Junior Python"));
        assert_eq!(postings[0].site_id.as_deref(), Some("100"));
        assert_eq!(postings[0].company, None);

        let newest = &postings[1];
        assert_eq!(newest.company.as_deref(), Some("Acme"));
        assert_eq!(newest.salary.as_deref(), Some("$1500"));
        assert_eq!(newest.work_model.as_deref(), Some("remote"));
        assert_eq!(newest.published.as_deref(), Some("12 травня"));
    }
}
