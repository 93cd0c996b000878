//! Pipeline stages for one scheduled run.
//!
//! - `normalize`: raw board record → canonical [`Posting`](crate::models::Posting)
//! - `DedupEngine`: drop known postings, commit the new ones
//! - `Dispatcher`: notify each committed posting independently
//! - `run_pipeline`: wire the stages together over every board

pub mod dedup;
pub mod dispatch;
pub mod normalize;
pub mod run;

pub use dedup::DedupEngine;
pub use dispatch::{Dispatcher, Messenger};
pub use normalize::normalize;
pub use run::{RunSummary, run_pipeline};
