//! HTTP client tests against a mocked translation service.
//!
//! Covers request shape, error classification, the deadline, in-flight
//! cancellation, and a full bulk run through the real client.

use overlay_translator_core::{
    CancelToken, CollectionHost, ContentFormat, DisplayStatus, EngineError, ItemId, OverlayConfig,
    OverlayController, OverlayEvent, RunOutcome, TitleMount, Translate, TranslationClient,
    TranslationError, TranslationRequest,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn config_for(server: &MockServer) -> OverlayConfig {
    OverlayConfig {
        api_key: Some("test-key".into()),
        ..OverlayConfig::with_endpoint(format!("{}/translate", server.uri()))
    }
}

fn request(content: &str) -> TranslationRequest {
    TranslationRequest::new(content, "ko", ContentFormat::Html).expect("valid request")
}

/// Answers every request with `[target] content`.
struct Echo;

impl Respond for Echo {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        let content = body["content"].as_str().unwrap_or_default();
        let target = body["targetLanguage"].as_str().unwrap_or_default();
        ResponseTemplate::new(200).set_body_json(json!({
            "translatedContent": format!("[{target}] {content}"),
            "provider": "mock"
        }))
    }
}

#[tokio::test]
async fn test_success_sends_expected_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/translate"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_json(json!({
            "content": "<p>Hello</p>",
            "sourceLanguage": "auto",
            "targetLanguage": "ko",
            "format": "html"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "translatedContent": "<p>안녕하세요</p>",
            "provider": "mock",
            "quality": 0.92
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = TranslationClient::new(&config_for(&server)).unwrap();
    let response = assert_ok!(client.send(&request("<p>Hello</p>"), &CancelToken::new()).await);

    assert_eq!(response.translated_content, "<p>안녕하세요</p>");
    assert_eq!(response.provider.as_deref(), Some("mock"));
}

#[tokio::test]
async fn test_server_error_maps_to_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "message": "upstream exploded", "code": "UPSTREAM" }
        })))
        .mount(&server)
        .await;

    let client = TranslationClient::new(&config_for(&server)).unwrap();
    let error = assert_err!(client.send(&request("<p>Hello</p>"), &CancelToken::new()).await);

    assert_eq!(
        error,
        TranslationError::Http {
            status: 500,
            message: Some("upstream exploded".into()),
            code: Some("UPSTREAM".into()),
        }
    );
    assert_eq!(error.code(), "HTTP_ERROR");
}

#[tokio::test]
async fn test_unparseable_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let client = TranslationClient::new(&config_for(&server)).unwrap();
    let error = assert_err!(client.send(&request("<p>Hello</p>"), &CancelToken::new()).await);

    assert!(matches!(error, TranslationError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_slow_service_hits_deadline() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "translatedContent": "late" }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let config = OverlayConfig {
        timeout_ms: 100,
        ..config_for(&server)
    };
    let client = TranslationClient::new(&config).unwrap();
    let error = assert_err!(client.send(&request("<p>Hello</p>"), &CancelToken::new()).await);

    assert_eq!(error, TranslationError::Timeout { timeout_ms: 100 });
}

#[tokio::test]
async fn test_cancel_aborts_request_in_flight() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "translatedContent": "late" }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client = TranslationClient::new(&config_for(&server)).unwrap();
    let token = CancelToken::new();
    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        })
    };

    let started = std::time::Instant::now();
    let error = assert_err!(client.translate(&request("<p>Hello</p>"), &token).await);
    canceller.await.unwrap();

    assert!(error.is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_cancelled_token_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(Echo)
        .expect(0)
        .mount(&server)
        .await;

    let client = TranslationClient::new(&config_for(&server)).unwrap();
    let token = CancelToken::new();
    token.cancel();

    let error = assert_err!(client.send(&request("<p>Hello</p>"), &token).await);
    assert_eq!(error, TranslationError::Cancelled);
}

// ============================================
// Controller over HTTP
// ============================================

struct PageHost {
    items: Vec<(ItemId, String)>,
    rendered: Mutex<HashMap<ItemId, String>>,
    title: Mutex<String>,
}

impl PageHost {
    fn new(title: &str, items: &[(&str, &str)]) -> Arc<Self> {
        let items: Vec<(ItemId, String)> = items
            .iter()
            .map(|(id, content)| (ItemId::from(*id), content.to_string()))
            .collect();
        Arc::new(Self {
            rendered: Mutex::new(items.iter().cloned().collect()),
            items,
            title: Mutex::new(title.to_string()),
        })
    }

    fn rendered(&self, id: &str) -> String {
        self.rendered.lock().unwrap()[&ItemId::from(id)].clone()
    }
}

impl CollectionHost for PageHost {
    fn ordered_item_ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|(id, _)| id.clone()).collect()
    }

    fn original_content(&self, id: &ItemId) -> Option<String> {
        self.items
            .iter()
            .find(|(candidate, _)| candidate == id)
            .map(|(_, content)| content.clone())
    }

    fn apply_item(&self, id: &ItemId, content: &str) {
        self.rendered
            .lock()
            .unwrap()
            .insert(id.clone(), content.to_string());
    }

    fn restore_item(&self, id: &ItemId, original: &str) {
        self.apply_item(id, original);
    }

    fn title_original(&self) -> Option<String> {
        Some("Release notes".to_string())
    }

    fn title_mounts(&self) -> Vec<TitleMount> {
        vec![TitleMount::Primary]
    }

    fn apply_title(&self, _mount: TitleMount, text: &str) {
        *self.title.lock().unwrap() = text.to_string();
    }

    fn restore_title(&self, _mount: TitleMount, original: &str) {
        *self.title.lock().unwrap() = original.to_string();
    }
}

fn controller_for(config: OverlayConfig, host: &Arc<PageHost>) -> OverlayController {
    let client = TranslationClient::new(&config).unwrap();
    OverlayController::init(
        config,
        Arc::new(client) as Arc<dyn Translate>,
        Arc::clone(host) as Arc<dyn CollectionHost>,
    )
    .unwrap()
}

#[tokio::test]
async fn test_bulk_run_over_http_skips_failed_item() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "content": "<p>broken</p>" })))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(Echo)
        .expect(3)
        .mount(&server)
        .await;

    let host = PageHost::new(
        "Release notes",
        &[("a", "<p>first</p>"), ("b", "<p>broken</p>"), ("c", "<p>third</p>")],
    );
    let controller = controller_for(config_for(&server), &host);

    controller.toggle_all().await.unwrap();
    let summary = controller.join_run().await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.skipped, 1);
    assert_eq!(host.rendered("a"), "[ko] <p>first</p>");
    assert_eq!(host.rendered("b"), "<p>broken</p>");
    assert_eq!(*host.title.lock().unwrap(), "[ko] Release notes");

    // reverting and rerunning stays on the cache; the failed item is retried
    controller.toggle_all().await.unwrap();
    assert_eq!(host.rendered("a"), "<p>first</p>");
    controller.toggle_all().await.unwrap();
    let rerun = controller.join_run().await.unwrap();
    assert_eq!(rerun.cache_hits, 3);
}

#[tokio::test]
async fn test_manual_timeout_over_http_clears_indicator() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "translatedContent": "late" }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let host = PageHost::new("Release notes", &[("a", "<p>first</p>")]);
    let config = OverlayConfig {
        timeout_ms: 100,
        error_indicator_ms: 200,
        ..config_for(&server)
    };
    let controller = controller_for(config, &host);
    let mut events = controller.subscribe();
    let id = ItemId::from("a");

    let error = controller.toggle_item(&id).await.unwrap_err();
    assert!(matches!(
        error,
        EngineError::Translation(TranslationError::Timeout { timeout_ms: 100 })
    ));
    assert_eq!(host.rendered("a"), "<p>first</p>");

    tokio::time::sleep(Duration::from_millis(400)).await;
    let mut statuses = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let OverlayEvent::ItemChanged { status, .. } = event {
            statuses.push(status);
        }
    }
    assert_eq!(
        statuses,
        vec![
            DisplayStatus::Loading,
            DisplayStatus::Error {
                code: "TIMEOUT".into()
            },
            DisplayStatus::Original,
        ]
    );

    controller.teardown().await;
}
