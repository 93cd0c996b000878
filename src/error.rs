// src/error.rs

//! Unified error handling for the job watcher.

use std::fmt;

use thiserror::Error;

/// Result type alias for jobwatch operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSV store read/write failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// SQLite store operation failed
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// RSS/XML feed parsing failed
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A scraped record is missing required fields
    #[error("Malformed posting from {source_name}: {message}")]
    MalformedInput { source_name: String, message: String },

    /// A board could not produce a batch this run
    #[error("Board {board} unavailable: {message}")]
    ScrapeUnavailable { board: String, message: String },

    /// Every configured board failed
    #[error("All {count} boards unavailable")]
    AllBoardsUnavailable { count: usize },

    /// The durable store could not commit
    #[error("Store write failed: {0}")]
    StoreWrite(String),

    /// A single notification could not be delivered
    #[error("Notify error for {destination}: {message}")]
    Notify {
        destination: String,
        message: String,
    },

    /// Remote side asked us to back off (HTTP 429)
    #[error("Rate limited by {service}, retry after {retry_after_secs}s")]
    RateLimited {
        service: String,
        retry_after_secs: u64,
    },

    /// The process was asked to stop before the run finished
    #[error("Run interrupted")]
    Interrupted,

    /// Non-success HTTP status that is not worth retrying
    #[error("Unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a malformed-input error for a record from `source`.
    pub fn malformed(source: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::MalformedInput {
            source_name: source.into(),
            message: message.to_string(),
        }
    }

    /// Create a board-unavailable error.
    pub fn unavailable(board: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::ScrapeUnavailable {
            board: board.into(),
            message: message.to_string(),
        }
    }

    /// Create a store write error.
    pub fn store_write(message: impl fmt::Display) -> Self {
        Self::StoreWrite(message.to_string())
    }

    /// Create a notification error.
    pub fn notify(destination: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Notify {
            destination: destination.into(),
            message: message.to_string(),
        }
    }

    /// Whether a retry after backoff could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Http(_) | Self::RateLimited { .. })
    }
}
