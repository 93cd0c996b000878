//! Notification dispatch for newly committed postings.
//!
//! Every posting is sent on its own; a failed send is recorded as that
//! posting's outcome and the loop moves on. Postings are already in the
//! store by the time they get here, so a failure is not re-sent on the next
//! run (at-most-once delivery).

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Config, DEFAULT_DESTINATION, DeliveryOutcome, Destination, Posting};
use crate::utils::truncate_chars;

/// Longest summary put into a message body.
const MAX_SUMMARY_CHARS: usize = 1000;

/// Delivers one text payload to one destination.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, destination: &Destination, text: &str) -> Result<()>;
}

/// Routes new postings to their category's destination.
pub struct Dispatcher<'a> {
    messenger: &'a dyn Messenger,
    /// Category → destination; `None` when its credentials are unset.
    routes: BTreeMap<String, Option<Destination>>,
    template: String,
    message_delay: Duration,
}

impl<'a> Dispatcher<'a> {
    pub fn new(messenger: &'a dyn Messenger, template: impl Into<String>) -> Self {
        Self {
            messenger,
            routes: BTreeMap::new(),
            template: template.into(),
            message_delay: Duration::ZERO,
        }
    }

    /// Build routes from the configured destinations, reading credentials
    /// from the environment once.
    pub fn from_config(config: &Config, messenger: &'a dyn Messenger) -> Self {
        let mut dispatcher = Self::new(messenger, config.telegram.template.clone())
            .with_message_delay(Duration::from_millis(config.telegram.message_delay_ms));

        for (name, destination) in &config.destinations {
            let resolved = destination.resolve(name);
            if resolved.is_none() {
                log::warn!(
                    "Destination '{}' has no credentials ({} / {} unset)",
                    name,
                    destination.token_env,
                    destination.chat_id_env
                );
            }
            dispatcher.routes.insert(name.clone(), resolved);
        }
        dispatcher
    }

    pub fn with_route(mut self, category: impl Into<String>, destination: Destination) -> Self {
        self.routes.insert(category.into(), Some(destination));
        self
    }

    pub fn with_message_delay(mut self, delay: Duration) -> Self {
        self.message_delay = delay;
        self
    }

    /// Send one message per posting and report each outcome, in input order.
    pub async fn dispatch(&self, postings: Vec<Posting>) -> Vec<(Posting, DeliveryOutcome)> {
        let mut outcomes = Vec::with_capacity(postings.len());
        let mut first = true;

        for posting in postings {
            let destination = match self.route(&posting.category) {
                Ok(destination) => destination,
                Err(reason) => {
                    log::info!("Skipped '{}': {}", posting.title, reason);
                    outcomes.push((posting, DeliveryOutcome::Skipped(reason)));
                    continue;
                }
            };

            if !first && !self.message_delay.is_zero() {
                tokio::time::sleep(self.message_delay).await;
            }
            first = false;

            let text = self.render(&posting);
            let outcome = match self.messenger.send(destination, &text).await {
                Ok(()) => {
                    log::info!("Sent '{}' to {}", posting.title, destination.name);
                    DeliveryOutcome::Sent
                }
                Err(e) => {
                    log::error!(
                        "Failed to send '{}' to {}: {}",
                        posting.title,
                        destination.name,
                        e
                    );
                    DeliveryOutcome::Failed(e.to_string())
                }
            };
            outcomes.push((posting, outcome));
        }

        outcomes
    }

    fn route(&self, category: &str) -> std::result::Result<&Destination, String> {
        let entry = self
            .routes
            .get_key_value(category)
            .or_else(|| self.routes.get_key_value(DEFAULT_DESTINATION));

        match entry {
            Some((_, Some(destination))) => Ok(destination),
            Some((name, None)) => Err(format!("credentials for '{name}' are not set")),
            None => Err(format!("no destination for category '{category}'")),
        }
    }

    fn render(&self, posting: &Posting) -> String {
        match posting.summary.as_deref() {
            Some(summary) if summary.chars().count() > MAX_SUMMARY_CHARS => {
                let mut shortened = posting.clone();
                shortened.summary =
                    Some(format!("{}...", truncate_chars(summary, MAX_SUMMARY_CHARS)));
                shortened.format(&self.template)
            }
            _ => posting.format(&self.template),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;
    use crate::error::AppError;
    use crate::models::RawPosting;
    use crate::pipeline::normalize;

    /// Records every send; fails for one chat id.
    #[derive(Default)]
    struct RecordingMessenger {
        sent: Mutex<Vec<(String, String)>>,
        failing_chat: Option<String>,
    }

    #[async_trait]
    impl Messenger for RecordingMessenger {
        async fn send(&self, destination: &Destination, text: &str) -> Result<()> {
            if self.failing_chat.as_deref() == Some(destination.chat_id.as_str()) {
                return Err(AppError::notify(&destination.name, "chat not found"));
            }
            self.sent
                .lock()
                .unwrap()
                .push((destination.chat_id.clone(), text.to_string()));
            Ok(())
        }
    }

    fn destination(name: &str, chat: &str) -> Destination {
        Destination {
            name: name.into(),
            token: "123:abc".into(),
            chat_id: chat.into(),
        }
    }

    fn posting(title: &str, category: &str) -> Posting {
        let raw = RawPosting {
            title: Some(title.into()),
            url: Some(format!("https://x.io/{title}")),
            category: Some(category.into()),
            ..RawPosting::new("dou", Utc::now())
        };
        normalize(&raw).unwrap()
    }

    #[tokio::test]
    async fn test_routes_by_category_with_default_fallback() {
        let messenger = RecordingMessenger::default();
        let dispatcher = Dispatcher::new(&messenger, "{title}")
            .with_route("default", destination("default", "main"))
            .with_route("support", destination("support", "juniors"));

        let outcomes = dispatcher
            .dispatch(vec![posting("A", "python"), posting("B", "support")])
            .await;

        assert!(outcomes.iter().all(|(_, o)| o.is_sent()));
        let sent = messenger.sent.lock().unwrap().clone();
        assert_eq!(
            sent,
            vec![
                ("main".to_string(), "A".to_string()),
                ("juniors".to_string(), "B".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_siblings() {
        let messenger = RecordingMessenger {
            failing_chat: Some("broken".into()),
            ..Default::default()
        };
        let dispatcher = Dispatcher::new(&messenger, "{title}")
            .with_route("python", destination("python", "broken"))
            .with_route("support", destination("support", "ok"));

        let outcomes = dispatcher
            .dispatch(vec![posting("A", "python"), posting("B", "support")])
            .await;

        assert!(outcomes[0].1.is_failed());
        assert!(outcomes[1].1.is_sent());
    }

    #[tokio::test]
    async fn test_missing_destination_is_skipped() {
        let messenger = RecordingMessenger::default();
        let dispatcher = Dispatcher::new(&messenger, "{title}");

        let outcomes = dispatcher.dispatch(vec![posting("A", "python")]).await;
        assert!(outcomes[0].1.is_skipped());
        assert!(messenger.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unset_credentials_are_skipped() {
        let mut config = Config::default();
        config.destinations.clear();
        config.destinations.insert(
            "python".into(),
            crate::models::DestinationConfig::new(
                "JOBWATCH_TEST_UNSET_TOKEN",
                "JOBWATCH_TEST_UNSET_CHAT",
            ),
        );
        let messenger = RecordingMessenger::default();
        let dispatcher = Dispatcher::from_config(&config, &messenger);

        let outcomes = dispatcher.dispatch(vec![posting("A", "python")]).await;
        assert!(matches!(&outcomes[0].1, DeliveryOutcome::Skipped(r) if r.contains("python")));
    }

    #[tokio::test]
    async fn test_long_summary_is_truncated() {
        let messenger = RecordingMessenger::default();
        let dispatcher = Dispatcher::new(&messenger, "{summary}")
            .with_route("default", destination("default", "main"));
        let mut long = posting("A", "python");
        long.summary = Some("x".repeat(1500));

        dispatcher.dispatch(vec![long]).await;
        let sent = messenger.sent.lock().unwrap();
        assert_eq!(sent[0].1.chars().count(), MAX_SUMMARY_CHARS + 3);
    }
}
