//! Application configuration structures.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{SearchFilter, WorkModel};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and scraping behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Where seen postings are recorded
    #[serde(default)]
    pub store: StoreConfig,

    /// Telegram Bot API settings
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Category to destination routing
    #[serde(default = "defaults::destinations")]
    pub destinations: BTreeMap<String, DestinationConfig>,

    /// Job boards to scrape, in notification order
    #[serde(default = "defaults::boards")]
    pub boards: Vec<BoardConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        if self.telegram.timeout_secs == 0 {
            return Err(AppError::validation("telegram.timeout_secs must be > 0"));
        }
        if self.telegram.template.trim().is_empty() {
            return Err(AppError::validation("telegram.template is empty"));
        }
        if self.store.path.as_os_str().is_empty() {
            return Err(AppError::validation("store.path is empty"));
        }
        if self.boards.is_empty() {
            return Err(AppError::validation("No boards defined"));
        }

        let mut labels = HashSet::new();
        for board in &self.boards {
            board.validate()?;
            if !labels.insert(board.label()) {
                return Err(AppError::validation(format!(
                    "Duplicate board name '{}'",
                    board.label()
                )));
            }
        }
        Ok(())
    }

    /// Destination config for a category, falling back to `default`.
    pub fn destination_for(&self, category: &str) -> Option<(&str, &DestinationConfig)> {
        self.destinations
            .get_key_value(category)
            .or_else(|| self.destinations.get_key_value(defaults::DEFAULT_DESTINATION))
            .map(|(name, dest)| (name.as_str(), dest))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            store: StoreConfig::default(),
            telegram: TelegramConfig::default(),
            destinations: defaults::destinations(),
            boards: defaults::boards(),
        }
    }
}

/// HTTP client and scraping behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Retries after the first failed board request
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff, in seconds
    #[serde(default = "defaults::backoff_base")]
    pub backoff_base_secs: u64,

    /// Delay between board requests in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Maximum boards fetched concurrently
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_retries: defaults::max_retries(),
            backoff_base_secs: defaults::backoff_base(),
            request_delay_ms: defaults::request_delay(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// Durable store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Csv,
    Sqlite,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv => f.write_str("csv"),
            Self::Sqlite => f.write_str("sqlite"),
        }
    }
}

/// Durable store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "defaults::store_backend")]
    pub backend: StoreBackend,

    /// File holding seen postings (CSV file or SQLite database)
    #[serde(default = "defaults::store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: defaults::store_backend(),
            path: defaults::store_path(),
        }
    }
}

/// Telegram Bot API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// API root; overridable for tests
    #[serde(default = "defaults::telegram_api")]
    pub api_base: String,

    #[serde(default = "defaults::telegram_timeout")]
    pub timeout_secs: u64,

    /// Retries after the first failed send
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Upper bound on a server-requested `retry_after` wait
    #[serde(default = "defaults::max_retry_after")]
    pub max_retry_after_secs: u64,

    /// Pause between consecutive messages in milliseconds
    #[serde(default = "defaults::message_delay")]
    pub message_delay_ms: u64,

    /// Message template, see `Posting::format`
    #[serde(default = "defaults::template")]
    pub template: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: defaults::telegram_api(),
            timeout_secs: defaults::telegram_timeout(),
            max_retries: defaults::max_retries(),
            max_retry_after_secs: defaults::max_retry_after(),
            message_delay_ms: defaults::message_delay(),
            template: defaults::template(),
        }
    }
}

/// Where a category's notifications go.
///
/// Only environment variable names live in the file; values are read at
/// dispatch time so tokens never end up in the config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    #[serde(default = "defaults::token_env")]
    pub token_env: String,

    #[serde(default = "defaults::chat_id_env")]
    pub chat_id_env: String,
}

impl DestinationConfig {
    pub fn new(token_env: impl Into<String>, chat_id_env: impl Into<String>) -> Self {
        Self {
            token_env: token_env.into(),
            chat_id_env: chat_id_env.into(),
        }
    }

    /// Resolve credentials from the environment.
    ///
    /// Returns `None` when either variable is unset or blank.
    pub fn resolve(&self, name: &str) -> Option<Destination> {
        let read = |key: &str| {
            std::env::var(key)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Some(Destination {
            name: name.to_string(),
            token: read(&self.token_env)?,
            chat_id: read(&self.chat_id_env)?,
        })
    }
}

/// A resolved messaging destination.
#[derive(Clone, PartialEq, Eq)]
pub struct Destination {
    /// Category name the destination was configured under
    pub name: String,
    pub token: String,
    pub chat_id: String,
}

impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Destination")
            .field("name", &self.name)
            .field("token", &"***")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

/// Supported job boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardKind {
    /// GlobalLogic careers search page
    GlobalLogic,
    /// jobs.dou.ua vacancy listings
    Dou,
    /// djinni.co RSS feed
    Djinni,
}

impl BoardKind {
    /// Source name recorded on postings from this board.
    pub fn source_name(&self) -> &'static str {
        match self {
            Self::GlobalLogic => "globallogic",
            Self::Dou => "dou",
            Self::Djinni => "djinni",
        }
    }
}

/// One scrape target: a board plus the criteria to query it with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    pub kind: BoardKind,

    /// Display name; defaults to `{kind}-{category}`
    #[serde(default)]
    pub name: Option<String>,

    /// Routing key into `destinations`
    pub category: String,

    /// Override of the board's base URL
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(flatten)]
    pub filter: SearchFilter,

    /// DOU only: use the first-job listing instead of vacancies
    #[serde(default)]
    pub no_experience: bool,

    /// DOU only: relocation offers
    #[serde(default)]
    pub relocation: bool,
}

impl BoardConfig {
    pub fn new(kind: BoardKind, category: impl Into<String>) -> Self {
        Self {
            kind,
            name: None,
            category: category.into(),
            base_url: None,
            filter: SearchFilter::default(),
            no_experience: false,
            relocation: false,
        }
    }

    /// Name used in logs and for `--board` selection.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{}-{}", self.kind.source_name(), self.category),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.category.trim().is_empty() {
            return Err(AppError::validation(format!(
                "Board '{}' has an empty category",
                self.label()
            )));
        }

        match self.kind {
            BoardKind::Dou => {
                let remote = self.filter.work_models.contains(&WorkModel::Remote);
                let city = self.filter.location.is_some();
                let exclusive = [remote, self.relocation, city];
                if exclusive.iter().filter(|set| **set).count() > 1 {
                    return Err(AppError::validation(format!(
                        "Board '{}': only one of remote, relocation or location can be set",
                        self.label()
                    )));
                }
            }
            BoardKind::GlobalLogic => {
                if self.filter.keywords.as_deref().is_none_or(str::is_empty) {
                    return Err(AppError::validation(format!(
                        "Board '{}' needs keywords",
                        self.label()
                    )));
                }
            }
            BoardKind::Djinni => {}
        }
        Ok(())
    }
}

pub use defaults::DEFAULT_DESTINATION;

mod defaults {
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    use super::{BoardConfig, BoardKind, DestinationConfig, StoreBackend};
    use crate::models::WorkModel;

    pub const DEFAULT_DESTINATION: &str = "default";

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; jobwatch/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn backoff_base() -> u64 {
        2
    }
    pub fn request_delay() -> u64 {
        500
    }
    pub fn max_concurrent() -> usize {
        2
    }

    // Store defaults
    pub fn store_backend() -> StoreBackend {
        StoreBackend::Sqlite
    }
    pub fn store_path() -> PathBuf {
        PathBuf::from("data/job_data.db")
    }

    // Telegram defaults
    pub fn telegram_api() -> String {
        "https://api.telegram.org".into()
    }
    pub fn telegram_timeout() -> u64 {
        60
    }
    pub fn max_retry_after() -> u64 {
        60
    }
    pub fn message_delay() -> u64 {
        1000
    }
    pub fn template() -> String {
        "{source} | {category}\n{title}\n{company}\n{url}\nLocation: {location}\nExperience: {experience}\nSalary: {salary}\nPublished: {published}\n{summary}".into()
    }
    pub fn token_env() -> String {
        "TELEGRAM_TOKEN".into()
    }
    pub fn chat_id_env() -> String {
        "CHAT_ID".into()
    }

    pub fn destinations() -> BTreeMap<String, DestinationConfig> {
        let no_exp = || DestinationConfig::new("NO_EXP_TELEGRAM_TOKEN", "NO_EXP_CHAT_ID");
        BTreeMap::from([
            (
                DEFAULT_DESTINATION.to_string(),
                DestinationConfig::new(token_env(), chat_id_env()),
            ),
            ("no_experience".to_string(), no_exp()),
            ("support".to_string(), no_exp()),
        ])
    }

    // Board defaults
    pub fn boards() -> Vec<BoardConfig> {
        let globallogic = |experience: &str| {
            let mut board = BoardConfig::new(BoardKind::GlobalLogic, "python");
            board.name = Some(format!("globallogic-python-{experience}"));
            board.filter.keywords = Some("python".into());
            board.filter.experience = Some(format!("{experience} years"));
            board.filter.location = Some("ukraine".into());
            board
        };
        let dou_python = |experience: &str| {
            let mut board = BoardConfig::new(BoardKind::Dou, "python");
            board.name = Some(format!("dou-python-{experience}"));
            board.filter.keywords = Some("Python".into());
            board.filter.experience = Some(experience.into());
            board
        };

        let mut no_exp = BoardConfig::new(BoardKind::Dou, "no_experience");
        no_exp.name = Some("dou-first-job-remote".into());
        no_exp.no_experience = true;
        no_exp.filter.location = Some("remote".into());

        let mut support = BoardConfig::new(BoardKind::Dou, "support");
        support.name = Some("dou-support-remote".into());
        support.filter.keywords = Some("Support".into());
        support.filter.experience = Some("0-1".into());
        support.filter.work_models = vec![WorkModel::Remote];

        vec![
            globallogic("0-1"),
            globallogic("1-3"),
            dou_python("0-1"),
            dou_python("1-3"),
            no_exp,
            support,
        ]
    }
}
