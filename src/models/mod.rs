// src/models/mod.rs

//! Domain models for the job watcher.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod delivery;
mod filter;
mod posting;

// Re-export all public types
pub use config::{
    BoardConfig, BoardKind, Config, CrawlerConfig, DEFAULT_DESTINATION, Destination,
    DestinationConfig, StoreBackend, StoreConfig, TelegramConfig,
};
pub use delivery::DeliveryOutcome;
pub use filter::SearchFilter;
pub use posting::{IdentityKey, Posting, RawPosting, WorkModel};
