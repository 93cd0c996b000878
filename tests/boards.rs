//! Job boards fetched from a local mock server.

use reqwest::Client;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use jobwatch::error::AppError;
use jobwatch::models::{BoardConfig, BoardKind, CrawlerConfig};
use jobwatch::services::build_board;

fn crawler(max_retries: u32) -> CrawlerConfig {
    CrawlerConfig {
        max_retries,
        backoff_base_secs: 0,
        request_delay_ms: 0,
        ..CrawlerConfig::default()
    }
}

const DOU_PAGE: &str = r#"
<html><body>
  <ul class="lt">
    <li class="l-vacancy">
      <div class="date">12 травня</div>
      <div class="title">
        <a class="vt" href="https://jobs.dou.ua/companies/acme/vacancies/300/">Middle Python Developer</a>
        <strong><a class="company" href="/companies/acme/">Acme</a></strong>
      </div>
      <span class="cities">Львів</span>
      <div class="sh-info">FastAPI, Celery</div>
    </li>
    <li class="l-vacancy">
      <div class="date">10 травня</div>
      <div class="title">
        <a class="vt" href="https://jobs.dou.ua/companies/beta/vacancies/299/">Python Developer</a>
      </div>
    </li>
  </ul>
</body></html>
"#;

#[tokio::test]
async fn dou_board_fetches_and_parses_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vacancies/"))
        .and(query_param("category", "Python"))
        .and(query_param("exp", "1-3"))
        .respond_with(ResponseTemplate::new(200).set_body_string(DOU_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = BoardConfig::new(BoardKind::Dou, "python");
    config.base_url = Some(format!("{}/vacancies/", server.uri()));
    config.filter.keywords = Some("Python".into());
    config.filter.experience = Some("1-3".into());
    let board = build_board(&config, Client::new(), &crawler(0));

    let postings = board.fetch().await.unwrap();

    assert_eq!(postings.len(), 2);
    assert_eq!(postings[0].title.as_deref(), Some("Python Developer"));
    assert_eq!(postings[1].company.as_deref(), Some("Acme"));
    assert_eq!(postings[1].location.as_deref(), Some("Львів"));
    assert!(postings.iter().all(|p| p.source == "dou"));
}

#[tokio::test]
async fn globallogic_board_fetches_cards() {
    let server = MockServer::start().await;
    let page = r#"
        <div class="career-pagelink">
          <p><a href="/careers/python-engineer-irc7/">Python Engineer</a></p>
          <p class="id-num">IRC7</p>
        </div>
    "#;
    Mock::given(method("GET"))
        .and(path("/career-search-page/"))
        .and(query_param("keywords", "python"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;

    let mut config = BoardConfig::new(BoardKind::GlobalLogic, "python");
    config.base_url = Some(format!("{}/career-search-page/", server.uri()));
    config.filter.keywords = Some("python".into());
    let board = build_board(&config, Client::new(), &crawler(0));

    let postings = board.fetch().await.unwrap();

    assert_eq!(postings.len(), 1);
    assert_eq!(
        postings[0].url.as_deref(),
        Some(format!("{}/careers/python-engineer-irc7/", server.uri()).as_str())
    );
}

#[tokio::test]
async fn djinni_board_reads_feed() {
    let server = MockServer::start().await;
    let feed = r#"<rss version="2.0"><channel>
        <item>
          <title>Python Developer</title>
          <link>https://djinni.co/jobs/555-python-developer/</link>
          <description>Remote, full-time</description>
          <pubDate>Wed, 13 May 2026 08:00:00 +0000</pubDate>
        </item>
    </channel></rss>"#;
    Mock::given(method("GET"))
        .and(path("/jobs/rss/"))
        .and(query_param("primary_keyword", "Python"))
        .respond_with(ResponseTemplate::new(200).set_body_string(feed))
        .mount(&server)
        .await;

    let mut config = BoardConfig::new(BoardKind::Djinni, "python");
    config.base_url = Some(format!("{}/jobs/rss/", server.uri()));
    config.filter.keywords = Some("Python".into());
    let board = build_board(&config, Client::new(), &crawler(0));

    let postings = board.fetch().await.unwrap();

    assert_eq!(postings.len(), 1);
    assert_eq!(postings[0].site_id.as_deref(), Some("555"));
}

#[tokio::test]
async fn forbidden_page_is_an_error_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = BoardConfig::new(BoardKind::Dou, "python");
    config.base_url = Some(format!("{}/vacancies/", server.uri()));
    let board = build_board(&config, Client::new(), &crawler(3));

    let result = board.fetch().await;
    assert!(matches!(
        result,
        Err(AppError::UnexpectedStatus { status: 403, .. })
    ));
}

#[tokio::test]
async fn server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(DOU_PAGE))
        .mount(&server)
        .await;

    let mut config = BoardConfig::new(BoardKind::Dou, "python");
    config.base_url = Some(format!("{}/vacancies/", server.uri()));
    let board = build_board(&config, Client::new(), &crawler(2));

    let postings = board.fetch().await.unwrap();
    assert_eq!(postings.len(), 2);
}
