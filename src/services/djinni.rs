// src/services/djinni.rs

//! djinni.co RSS feed.

use async_trait::async_trait;
use chrono::Utc;
use quick_xml::Reader;
use quick_xml::events::{BytesText, Event};
use url::Url;

use crate::error::Result;
use crate::models::{BoardConfig, Posting, RawPosting};
use crate::services::{JobBoard, PageFetcher, strip_html};
use crate::utils::{extract_posting_id, truncate_chars};

const FEED_URL: &str = "https://djinni.co/jobs/rss/";

/// Longest description kept from a feed item.
const MAX_DESCRIPTION_CHARS: usize = 300;

/// Reads `<item>`s from the djinni jobs feed.
///
/// The feed has no location data, so the board's filter is re-applied
/// locally to what the items do carry.
pub struct DjinniBoard {
    label: String,
    config: BoardConfig,
    fetcher: PageFetcher,
}

impl DjinniBoard {
    pub(crate) fn new(config: BoardConfig, fetcher: PageFetcher) -> Self {
        Self {
            label: config.label(),
            config,
            fetcher,
        }
    }

    /// Feed URL for the configured criteria.
    pub fn feed_url(&self) -> Result<Url> {
        let mut url = Url::parse(self.config.base_url.as_deref().unwrap_or(FEED_URL))?;
        let filter = &self.config.filter;
        if filter.keywords.is_some() || filter.experience.is_some() {
            let mut query = url.query_pairs_mut();
            if let Some(keyword) = filter.keywords.as_deref() {
                query.append_pair("primary_keyword", keyword);
            }
            if let Some(exp) = filter.experience.as_deref() {
                query.append_pair("exp_level", exp);
            }
        }
        Ok(url)
    }

    fn parse_feed(&self, xml: &str) -> Result<Vec<RawPosting>> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let scraped_at = Utc::now();
        let mut postings = Vec::new();
        let mut item: Option<FeedItem> = None;
        let mut current_tag = String::new();

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if name == "item" {
                        item = Some(FeedItem::default());
                    }
                    current_tag = name;
                }
                Event::End(e) => {
                    if e.name().as_ref() == b"item" {
                        if let Some(done) = item.take() {
                            postings.push(self.to_raw(done, scraped_at));
                        }
                    }
                    current_tag.clear();
                }
                Event::Text(e) => {
                    if let Some(item) = item.as_mut() {
                        item.push(&current_tag, &unescape_lossy(&e));
                    }
                }
                Event::CData(e) => {
                    if let Some(item) = item.as_mut() {
                        item.push(&current_tag, &String::from_utf8_lossy(&e));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        // Feed lists newest first
        postings.reverse();
        Ok(postings)
    }

    fn to_raw(&self, item: FeedItem, scraped_at: chrono::DateTime<Utc>) -> RawPosting {
        let description = strip_html(&item.description);
        let description = truncate_chars(&description, MAX_DESCRIPTION_CHARS);
        let summary = match (item.categories.is_empty(), description.is_empty()) {
            (true, _) => description,
            (false, true) => item.categories.join(", "),
            (false, false) => format!("{}\n{}", item.categories.join(", "), description),
        };

        let mut raw = RawPosting::new(self.config.kind.source_name(), scraped_at);
        raw.site_id = extract_posting_id(&item.link);
        raw.title = Some(item.title);
        raw.url = Some(item.link);
        raw.summary = Some(summary);
        raw.published = Some(item.pub_date);
        raw.experience_level = self.config.filter.experience.clone();
        raw.category = Some(self.config.category.clone());
        raw
    }
}

#[async_trait]
impl JobBoard for DjinniBoard {
    fn name(&self) -> &str {
        &self.label
    }

    async fn fetch(&self) -> Result<Vec<RawPosting>> {
        let url = self.feed_url()?;
        let xml = self.fetcher.get(url.as_str()).await?;
        self.parse_feed(&xml)
    }

    fn accepts(&self, posting: &Posting) -> bool {
        self.config.filter.matches(posting)
    }
}

#[derive(Default)]
struct FeedItem {
    title: String,
    link: String,
    description: String,
    pub_date: String,
    categories: Vec<String>,
}

impl FeedItem {
    fn push(&mut self, tag: &str, text: &str) {
        match tag {
            "title" => self.title.push_str(text),
            "link" => self.link.push_str(text),
            "description" => self.description.push_str(text),
            "pubDate" => self.pub_date.push_str(text),
            "category" => self.categories.push(text.to_string()),
            _ => {}
        }
    }
}

/// Unescape entities, keeping the raw text when it holds one XML doesn't know
/// (feeds often carry HTML entities such as `&nbsp;`).
fn unescape_lossy(text: &BytesText<'_>) -> String {
    text.unescape()
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| String::from_utf8_lossy(text).into_owned())
}

#[cfg(test)]
mod tests {
    use reqwest::Client;

    use super::*;
    use crate::models::{BoardKind, CrawlerConfig};
    use crate::pipeline::normalize;

    fn board(config: BoardConfig) -> DjinniBoard {
        let crawler = CrawlerConfig::default();
        let fetcher = PageFetcher {
            client: Client::new(),
            max_retries: crawler.max_retries,
            backoff_base_secs: crawler.backoff_base_secs,
        };
        DjinniBoard::new(config, fetcher)
    }

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Djinni jobs</title>
    <item>
      <title>Senior Python Engineer</title>
      <link>https://djinni.co/jobs/222-senior-python-engineer/</link>
      <description>&lt;p&gt;Build &lt;b&gt;APIs&lt;/b&gt; with FastAPI&lt;/p&gt;</description>
      <pubDate>Tue, 12 May 2026 10:00:00 +0000</pubDate>
      <category>Python</category>
      <category>Remote</category>
    </item>
    <item>
      <title>Python Trainee</title>
      <link>https://djinni.co/jobs/111-python-trainee/</link>
      <description><![CDATA[<p>Learn and grow</p>]]></description>
      <pubDate>Mon, 11 May 2026 09:00:00 +0000</pubDate>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_feed_url() {
        let mut config = BoardConfig::new(BoardKind::Djinni, "python");
        config.filter.keywords = Some("Python".into());
        config.filter.experience = Some("no_exp".into());
        let url = board(config).feed_url().unwrap();
        assert_eq!(
            url.as_str(),
            "https://djinni.co/jobs/rss/?primary_keyword=Python&exp_level=no_exp"
        );
    }

    #[test]
    fn test_parse_feed() {
        let b = board(BoardConfig::new(BoardKind::Djinni, "python"));
        let postings = b.parse_feed(FEED).unwrap();

        assert_eq!(postings.len(), 2);
        let oldest = &postings[0];
        assert_eq!(oldest.title.as_deref(), Some("Python Trainee"));
        assert_eq!(oldest.site_id.as_deref(), Some("111"));
        assert_eq!(oldest.summary.as_deref(), Some("Learn and grow"));

        let newest = &postings[1];
        assert_eq!(
            newest.summary.as_deref(),
            Some("Python, Remote\nBuild APIs with FastAPI")
        );
        assert_eq!(
            newest.published.as_deref(),
            Some("Tue, 12 May 2026 10:00:00 +0000")
        );
    }

    #[test]
    fn test_description_is_truncated() {
        let long = "x".repeat(500);
        let feed = format!(
            "<rss><channel><item><title>T</title><link>https://djinni.co/jobs/1-t/</link>\
             <description>{long}</description></item></channel></rss>"
        );
        let b = board(BoardConfig::new(BoardKind::Djinni, "python"));
        let postings = b.parse_feed(&feed).unwrap();
        assert_eq!(postings[0].summary.as_deref().map(str::len), Some(300));
    }

    #[test]
    fn test_cdata_entities_are_decoded() {
        let feed = "<rss><channel><item><title>T</title>\
                    <link>https://djinni.co/jobs/2-t/</link>\
                    <description><![CDATA[<p>Django &amp; DRF,&nbsp;Celery</p>]]></description>\
                    </item></channel></rss>";
        let b = board(BoardConfig::new(BoardKind::Djinni, "python"));
        let postings = b.parse_feed(feed).unwrap();
        assert_eq!(postings[0].summary.as_deref(), Some("Django & DRF, Celery"));
    }

    #[test]
    fn test_accepts_applies_require_terms() {
        let mut config = BoardConfig::new(BoardKind::Djinni, "python");
        config.filter.require_terms = vec!["trainee".into()];
        let b = board(config);
        let postings = b.parse_feed(FEED).unwrap();

        let accepted: Vec<String> = postings
            .iter()
            .map(|raw| normalize(raw).unwrap())
            .filter(|p| b.accepts(p))
            .map(|p| p.title)
            .collect();
        assert_eq!(accepted, ["Python Trainee"]);
    }

    #[test]
    fn test_malformed_feed_is_error() {
        let b = board(BoardConfig::new(BoardKind::Djinni, "python"));
        assert!(b.parse_feed("<rss><channel><item></channel></rss>").is_err());
    }
}
