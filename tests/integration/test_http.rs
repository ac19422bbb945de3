//! Full-stack HTTP tests.
//!
//! A fake `generateContent` endpoint stands in for Gemini. The real
//! gateway, pipeline and router run on top of it and are driven over TCP
//! with reqwest, so every layer between the socket and the model call is
//! exercised.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use gyft_core::Pipeline;
use gyft_gemini::GeminiGateway;
use gyft_server::{create_router, AppState, Config, USER_HEADER};
use serde_json::{json, Value};

const API_KEY: &str = "integration-key";
const REFUSE_MARKER: &str = "REFUSE-ME";

fn reply(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures/replies")
        .join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("Missing fixture {path:?}: {e}"))
}

/// Picks a recorded reply from the prompt it is given.
fn reply_for(prompt: &str) -> String {
    if prompt.contains(REFUSE_MARKER) {
        reply("refusal.txt")
    } else if prompt.contains("multiple-choice") {
        reply("questions_five.txt")
    } else if prompt.contains("answers coding questions") {
        reply("qa_decline.txt")
    } else {
        reply("course_fenced.txt")
    }
}

async fn fake_generate_content(
    State(calls): State<Arc<AtomicUsize>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    calls.fetch_add(1, Ordering::SeqCst);

    if headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) != Some(API_KEY) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"code": 401, "message": "API key not valid"}})),
        );
    }

    let prompt = body
        .pointer("/contents/0/parts/0/text")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let text = reply_for(prompt);
    (
        StatusCode::OK,
        Json(json!({"candidates": [{"content": {"parts": [{"text": text}], "role": "model"}}]})),
    )
}

async fn spawn(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// A running app wired to a fake model.
struct TestApp {
    base: String,
    model_calls: Arc<AtomicUsize>,
    client: reqwest::Client,
}

impl TestApp {
    async fn start(api_key: &str) -> Self {
        let model_calls = Arc::new(AtomicUsize::new(0));
        let fake = Router::new()
            .route("/v1beta/models/:model", post(fake_generate_content))
            .with_state(model_calls.clone());
        let model_addr = spawn(fake).await;

        let mut config = Config::default();
        config.gateway.endpoint = format!("http://{model_addr}/v1beta");
        config.catalog.default_page_size = 2;

        let gateway = GeminiGateway::new(config.gemini_settings(api_key.to_string())).unwrap();
        let state = AppState::new(config, Pipeline::new(Arc::new(gateway)));
        let app_addr = spawn(create_router(state)).await;

        Self {
            base: format!("http://{app_addr}/api"),
            model_calls,
            client: reqwest::Client::new(),
        }
    }

    async fn post(&self, path: &str, user: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut request = self.client.post(format!("{}{path}", self.base)).json(&body);
        if let Some(user) = user {
            request = request.header(USER_HEADER, user);
        }
        read(request.send().await.unwrap()).await
    }

    async fn get(&self, path: &str, user: Option<&str>) -> (StatusCode, Value) {
        let mut request = self.client.get(format!("{}{path}", self.base));
        if let Some(user) = user {
            request = request.header(USER_HEADER, user);
        }
        read(request.send().await.unwrap()).await
    }

    fn model_calls(&self) -> usize {
        self.model_calls.load(Ordering::SeqCst)
    }
}

async fn read(response: reqwest::Response) -> (StatusCode, Value) {
    let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
    let body = response.json().await.unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::start(API_KEY).await;
    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_generate_course_over_http() {
    let app = TestApp::start(API_KEY).await;

    let (status, body) = app
        .post("/ai/generate-course", None, json!({"prompt": "Python basics"}))
        .await;

    assert_eq!(status, StatusCode::OK, "body: {body}");
    let course = &body["course"];
    assert_eq!(course["title"], "Python for Beginners");
    assert_eq!(course["language"], "python");
    assert_eq!(course["chapters"][1]["name"], "Part 2: Loops");
    assert_eq!(
        course["chapters"][0]["sections"][0]["content"][1],
        json!({"type": "code", "lang": "python", "code": "print('Hello, World!')"})
    );
    assert_eq!(app.model_calls(), 1);
}

#[tokio::test]
async fn test_generate_questions_and_qa_over_http() {
    let app = TestApp::start(API_KEY).await;

    let (status, body) = app
        .post(
            "/ai/generate-questions",
            None,
            json!({"prompt": "Section: Basics\nprint and loops"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    let questions = body["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 3);
    assert_eq!(questions[1]["correctOptionIndex"], 1);

    let (status, body) = app
        .post("/ai/qa", None, json!({"prompt": "What is the capital of France?"}))
        .await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["answer"]["language"], "general");
}

#[tokio::test]
async fn test_blank_prompt_never_reaches_model() {
    let app = TestApp::start(API_KEY).await;

    let (status, body) = app
        .post("/ai/generate-course", None, json!({"prompt": "   \n"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "input_error");

    let (status, _) = app.post("/ai/qa", None, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.model_calls(), 0);
}

#[tokio::test]
async fn test_refusal_returns_raw_reply() {
    let app = TestApp::start(API_KEY).await;

    let (status, body) = app
        .post("/ai/generate-course", None, json!({"prompt": REFUSE_MARKER}))
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "extraction_error");
    assert_eq!(body["raw"], reply("refusal.txt"));
    assert!(body.get("extracted").is_none());
}

#[tokio::test]
async fn test_rejected_key_is_bad_gateway() {
    let app = TestApp::start("wrong-key").await;

    let (status, body) = app
        .post("/ai/qa", None, json!({"prompt": "What is a closure?"}))
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "upstream_error");
    assert!(!body["error"].as_str().unwrap().contains("wrong-key"));
    assert_eq!(app.model_calls(), 1, "upstream failures are not retried");
}

/// Generate, publish, discover, like, install and quiz across two users.
#[tokio::test]
async fn test_catalog_flow() {
    let app = TestApp::start(API_KEY).await;

    let (status, created) = app
        .post(
            "/courses/generate",
            Some("alice"),
            json!({"topic": "Python basics", "isPublic": true, "authorName": "Alice"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "body: {created}");
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["ownerId"], "alice");
    assert_eq!(created["title"], "Python for Beginners");

    let (status, page) = app.get("/courses/public?search=python&sortBy=likes", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["totalCount"], 1);
    assert_eq!(page["courses"][0]["id"], id.as_str());

    let (_, categories) = app.get("/courses/categories", None).await;
    assert_eq!(categories, json!(["python"]));

    let (status, like) = app.post(&format!("/courses/{id}/like"), Some("bob"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(like, json!({"liked": true, "likeCount": 1}));

    let (status, copy) = app
        .post(&format!("/courses/{id}/install"), Some("bob"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "body: {copy}");
    assert_eq!(copy["ownerId"], "bob");
    assert_eq!(copy["originalCourseId"], id.as_str());
    assert_eq!(copy["originalAuthor"], "Alice");
    assert_eq!(copy["isPublic"], false);

    let (status, _) = app
        .post(&format!("/courses/{id}/install"), Some("bob"), json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, mine) = app.get("/courses", Some("bob")).await;
    assert_eq!(mine.as_array().map(Vec::len), Some(1));

    let calls_before_quiz = app.model_calls();
    let (status, quiz) = app
        .post(
            &format!("/courses/{id}/quiz"),
            Some("bob"),
            json!({"chapter": 0, "section": 0}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "body: {quiz}");
    assert_eq!(quiz["questions"].as_array().map(Vec::len), Some(3));
    assert_eq!(app.model_calls(), calls_before_quiz + 1);

    let (status, _) = app
        .post(
            &format!("/courses/{id}/quiz"),
            Some("bob"),
            json!({"chapter": 9, "section": 0}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_failed_generation_stores_nothing() {
    let app = TestApp::start(API_KEY).await;

    let (status, _) = app
        .post(
            "/courses/generate",
            Some("alice"),
            json!({"topic": REFUSE_MARKER, "isPublic": true}),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, mine) = app.get("/courses", Some("alice")).await;
    assert_eq!(mine, json!([]));
    let (_, page) = app.get("/courses/public", None).await;
    assert_eq!(page["totalCount"], 0);
}
