//! `TelegramClient` against a local mock of the Bot API.

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use jobwatch::error::AppError;
use jobwatch::models::{Destination, TelegramConfig};
use jobwatch::pipeline::Messenger;
use jobwatch::services::TelegramClient;

fn client(server: &MockServer, max_retries: u32) -> TelegramClient {
    let config = TelegramConfig {
        api_base: server.uri(),
        timeout_secs: 5,
        max_retries,
        max_retry_after_secs: 1,
        ..TelegramConfig::default()
    };
    TelegramClient::new(&config).unwrap()
}

fn destination() -> Destination {
    Destination {
        name: "python".into(),
        token: "123:secret".into(),
        chat_id: "-100200".into(),
    }
}

#[tokio::test]
async fn send_posts_plain_text_without_preview() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:secret/sendMessage"))
        .and(body_partial_json(json!({
            "chat_id": "-100200",
            "text": "Python Dev",
            "disable_web_page_preview": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {}})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server, 0)
        .send(&destination(), "Python Dev")
        .await
        .unwrap();
}

#[tokio::test]
async fn rate_limit_waits_and_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "ok": false,
            "error_code": 429,
            "description": "Too Many Requests: retry after 1",
            "parameters": {"retry_after": 1}
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let result = client(&server, 2).send(&destination(), "hello").await;

    assert!(result.is_ok(), "expected Ok, got: {result:?}");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn bad_request_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: chat not found"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server, 3).send(&destination(), "hello").await;

    match result {
        Err(AppError::Notify {
            destination,
            message,
        }) => {
            assert_eq!(destination, "python");
            assert!(message.contains("chat not found"));
        }
        other => panic!("expected Notify error, got: {other:?}"),
    }
}

#[tokio::test]
async fn error_messages_do_not_leak_the_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = client(&server, 0)
        .send(&destination(), "hello")
        .await
        .unwrap_err();

    assert!(!err.to_string().contains("secret"), "token leaked: {err}");
}
