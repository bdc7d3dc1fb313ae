//! HTTP-level tests: the router with an in-memory database and fake
//! collaborators standing in for S3 and the inference backend.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use pdf_chat::api::{create_router, AppState};
use pdf_chat::chat::{Collaborators, ContextReconciler, ReconcilerSettings};
use pdf_chat::config::StorageConfig;
use pdf_chat::db::{connect_in_memory, SessionRepository, UserRepository};
use pdf_chat::ingest::{DocumentIngestor, ExtractionError, PageSource, TextExtractor};
use pdf_chat::llm::{ChatRequest, IndexingClient, InferenceClient, LlmError};
use pdf_chat::storage::{ObjectStore, StorageError, StorageKeyCodec};

// =============================================================================
// Fakes
// =============================================================================

#[derive(Default)]
struct ChoicesInference {
    attachments_seen: Mutex<Vec<bool>>,
}

#[async_trait]
impl InferenceClient for ChoicesInference {
    async fn chat(&self, request: &ChatRequest) -> Result<Value, LlmError> {
        self.attachments_seen
            .lock()
            .unwrap()
            .push(request.attachment.is_some());
        Ok(json!({"choices": [{"message": {"content": "hello there"}}]}))
    }
}

struct NeverIndexed;

#[async_trait]
impl IndexingClient for NeverIndexed {
    async fn ingest(&self, _: &str, _: &[u8], _: &str, _: &str) -> Result<bool, LlmError> {
        Ok(false)
    }
}

struct DiscardStore;

#[async_trait]
impl ObjectStore for DiscardStore {
    async fn put(&self, _: &str, _: &str, _: &[u8], _: &str) -> Result<(), StorageError> {
        Ok(())
    }
}

struct SinglePage;

impl PageSource for SinglePage {
    fn page_count(&self) -> usize {
        1
    }
    fn structured(&self, _: usize) -> Result<String, ExtractionError> {
        Ok("# Minutes".to_string())
    }
    fn plain(&self, _: usize) -> Result<String, ExtractionError> {
        Ok("Minutes".to_string())
    }
}

struct SinglePageExtractor;

impl TextExtractor for SinglePageExtractor {
    fn open(&self, _: &[u8]) -> Result<Box<dyn PageSource>, ExtractionError> {
        Ok(Box::new(SinglePage))
    }
}

// =============================================================================
// Helpers
// =============================================================================

struct TestApp {
    app: axum::Router,
    token: String,
    inference: Arc<ChoicesInference>,
}

async fn make_app() -> TestApp {
    let db = connect_in_memory().await.unwrap();
    let user = UserRepository::create(&db, "alice".into(), "alice@example.com".into())
        .await
        .unwrap();
    let session = SessionRepository::create(&db, user.id.clone(), 24).await.unwrap();

    let inference = Arc::new(ChoicesInference::default());
    let codec = StorageKeyCodec::with_sigv4(
        StorageConfig::new("bucket", "ap-northeast-2").with_credentials("AK", "SK"),
    );
    let services = Collaborators {
        inference: inference.clone(),
        indexing: Arc::new(NeverIndexed),
        object_store: Arc::new(DiscardStore),
        codec: Arc::new(codec),
        ingestor: DocumentIngestor::new(Arc::new(SinglePageExtractor)),
    };
    let reconciler = ContextReconciler::new(db.clone(), services, ReconcilerSettings::default());

    let state = AppState {
        db,
        reconciler: Arc::new(reconciler),
        request_timeout: Duration::from_secs(30),
    };

    TestApp {
        app: create_router(state),
        token: session.token,
        inference,
    }
}

fn authed_get(token: &str, uri: &str) -> Request<Body> {
    Request::get(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn authed_post_json(token: &str, uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed_upload(token: &str, conversation_id: Option<&str>, file_name: &str) -> Request<Body> {
    let boundary = "pdfchatboundary";
    let mut body = String::new();
    if let Some(id) = conversation_id {
        body.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"conversation_id\"\r\n\r\n{id}\r\n"
        ));
    }
    body.push_str(&format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
         Content-Type: application/pdf\r\n\r\n%PDF-1.4 minutes\r\n--{boundary}--\r\n"
    ));

    Request::post("/api/chat/upload")
        .header("authorization", format!("Bearer {}", token))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn health_is_public() {
    let t = make_app().await;
    let resp = t
        .app
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["status"], "healthy");
}

#[tokio::test]
async fn chat_requires_a_valid_session() {
    let t = make_app().await;

    let missing = t
        .app
        .clone()
        .oneshot(Request::get("/api/chat/history").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let bogus = t
        .app
        .oneshot(authed_get("not-a-token", "/api/chat/history"))
        .await
        .unwrap();
    assert_eq!(bogus.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(bogus).await["ok"], false);
}

#[tokio::test]
async fn send_then_history() {
    let t = make_app().await;

    let resp = t
        .app
        .clone()
        .oneshot(authed_post_json(
            &t.token,
            "/api/chat/send",
            json!({"message": "Explain ownership please"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let sent = json_body(resp).await;
    assert_eq!(sent["message"]["role"], "assistant");
    assert_eq!(sent["message"]["content"], "hello there");
    assert!(sent["elapsed_ms"].is_u64());
    let conversation_id = sent["conversation_id"].as_str().unwrap().to_string();

    let resp = t
        .app
        .oneshot(authed_get(
            &t.token,
            &format!("/api/chat/history?conversation_id={}", conversation_id),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let history = json_body(resp).await;
    assert_eq!(history["title"], "Explain ow");
    assert_eq!(history["document_url"], "");
    assert_eq!(history["messages"].as_array().unwrap().len(), 2);
    assert_eq!(history["messages"][0]["role"], "user");
}

#[tokio::test]
async fn blank_message_is_a_bad_request() {
    let t = make_app().await;
    let resp = t
        .app
        .oneshot(authed_post_json(&t.token, "/api/chat/send", json!({"message": "   "})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_conversation_is_not_found() {
    let t = make_app().await;
    let resp = t
        .app
        .oneshot(authed_post_json(
            &t.token,
            "/api/chat/send",
            json!({"message": "hi", "conversation_id": "does-not-exist"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upload_attaches_once_and_is_sent_inline_once() {
    let t = make_app().await;

    let resp = t
        .app
        .clone()
        .oneshot(authed_upload(&t.token, None, "minutes.pdf"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let uploaded = json_body(resp).await;
    assert_eq!(uploaded["title"], "minutes.pd");
    assert_eq!(uploaded["indexed"], false);
    assert!(uploaded["url"].as_str().unwrap().contains("X-Amz-Signature="));
    let id = uploaded["conversation_id"].as_str().unwrap().to_string();

    let again = t
        .app
        .clone()
        .oneshot(authed_upload(&t.token, Some(&id), "other.pdf"))
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::BAD_REQUEST);

    for message in ["summarize", "and the action items?"] {
        let resp = t
            .app
            .clone()
            .oneshot(authed_post_json(
                &t.token,
                "/api/chat/send",
                json!({"message": message, "conversation_id": id}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
    assert_eq!(*t.inference.attachments_seen.lock().unwrap(), vec![true, false]);

    let history = json_body(
        t.app
            .oneshot(authed_get(&t.token, &format!("/api/chat/history?conversation_id={}", id)))
            .await
            .unwrap(),
    )
    .await;
    let url = history["document_url"].as_str().unwrap();
    assert!(url.starts_with("https://bucket.s3.ap-northeast-2.amazonaws.com/uploads/"));
    assert!(url.contains("X-Amz-Signature="));
}

#[tokio::test]
async fn upload_without_file_is_rejected() {
    let t = make_app().await;
    let body = "--b\r\nContent-Disposition: form-data; name=\"conversation_id\"\r\n\r\n\r\n--b--\r\n";
    let req = Request::post("/api/chat/upload")
        .header("authorization", format!("Bearer {}", t.token))
        .header("content-type", "multipart/form-data; boundary=b")
        .body(Body::from(body))
        .unwrap();

    let resp = t.app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn conversation_management() {
    let t = make_app().await;

    let created = json_body(
        t.app
            .clone()
            .oneshot(authed_post_json(&t.token, "/api/conversations", json!({})))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(created["title"], "New Chat");
    let id = created["id"].as_str().unwrap().to_string();

    let renamed = json_body(
        t.app
            .clone()
            .oneshot(authed_post_json(
                &t.token,
                "/api/conversations/rename",
                json!({"id": id, "title": "  Reading list  "}),
            ))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(renamed["title"], "Reading list");

    let listed = json_body(
        t.app
            .clone()
            .oneshot(authed_get(&t.token, "/api/conversations"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(listed["conversations"][0]["title"], "Reading list");

    let deleted = t
        .app
        .clone()
        .oneshot(authed_post_json(&t.token, "/api/conversations/delete", json!({"id": id})))
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::OK);

    let missing = t
        .app
        .oneshot(authed_post_json(&t.token, "/api/conversations/delete", json!({"id": id})))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
