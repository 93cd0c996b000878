// src/services/telegram.rs

//! Telegram Bot API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Destination, TelegramConfig};
use crate::pipeline::Messenger;
use crate::utils::retry::retry_with_backoff;
use crate::utils::truncate_chars;

/// Telegram rejects longer message texts.
const MAX_MESSAGE_CHARS: usize = 4096;

/// Wait used when a 429 carries no `retry_after`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

const BACKOFF_BASE_SECS: u64 = 2;

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

/// Sends plain-text messages through `sendMessage`.
pub struct TelegramClient {
    client: Client,
    api_base: String,
    max_retries: u32,
    max_retry_after_secs: u64,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            max_retry_after_secs: config.max_retry_after_secs,
        })
    }

    async fn post(&self, destination: &Destination, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, destination.token);
        let payload = SendMessage {
            chat_id: &destination.chat_id,
            text,
            disable_web_page_preview: true,
        };

        // The URL embeds the bot token; keep it out of error messages.
        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Http(e.without_url()))?;

        let status = response.status();
        let transport_error = response
            .error_for_status_ref()
            .err()
            .map(reqwest::Error::without_url);
        let body: ApiResponse = response.json().await.unwrap_or_default();

        if status.is_success() {
            return if body.ok {
                Ok(())
            } else {
                Err(AppError::notify(
                    &destination.name,
                    body.description.unwrap_or_else(|| "ok=false".to_string()),
                ))
            };
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = body
                .parameters
                .and_then(|p| p.retry_after)
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
                .min(self.max_retry_after_secs);
            log::warn!(
                "Telegram rate limit for {}, waiting {}s",
                destination.name,
                retry_after
            );
            return Err(AppError::RateLimited {
                service: "telegram".to_string(),
                retry_after_secs: retry_after,
            });
        }

        match transport_error {
            Some(e) if status.is_server_error() => Err(AppError::Http(e)),
            _ => Err(AppError::notify(
                &destination.name,
                format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    body.description.unwrap_or_default()
                ),
            )),
        }
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send(&self, destination: &Destination, text: &str) -> Result<()> {
        let text = truncate_chars(text, MAX_MESSAGE_CHARS);
        retry_with_backoff(self.max_retries, BACKOFF_BASE_SECS, || {
            self.post(destination, &text)
        })
        .await
        .map_err(|e| match e {
            AppError::Notify { .. } => e,
            other => AppError::notify(&destination.name, other),
        })
    }
}
