// src/lib.rs

//! jobwatch library
//!
//! Scrapes job boards, keeps a durable record of every posting seen, and
//! sends each new posting to Telegram exactly once.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
