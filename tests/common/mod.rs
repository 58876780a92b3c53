//! In-process stand-in for the vendor APIs.
//!
//! The prompt text steers each response, so one server covers every case:
//! `url`, `inline`, `garbage`, `unauthorized`, `bad request`, `rate limit`,
//! and for Wan `fail` / `stuck`.

#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

pub const API_KEY: &str = "sk-test-key";

/// Number of RUNNING answers before a normal Wan task succeeds.
pub const WAN_RUNNING_POLLS: u32 = 3;

pub struct MockState {
    pub base: String,
    pub png: Vec<u8>,
    pub generate_calls: AtomicU32,
    pub downloads: AtomicU32,
    pub polls: Mutex<HashMap<String, u32>>,
    pub last_body: Mutex<Option<Value>>,
}

impl MockState {
    pub fn polls_for(&self, task_id: &str) -> u32 {
        self.polls
            .lock()
            .unwrap()
            .get(task_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn last_body(&self) -> Value {
        self.last_body.lock().unwrap().clone().unwrap_or(Value::Null)
    }

    fn image_url(&self) -> String {
        format!("{}/files/image.png", self.base)
    }

    fn png_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.png)
    }
}

pub struct MockServer {
    pub base: String,
    pub state: Arc<MockState>,
}

impl MockServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

/// A small PNG the server hands out.
pub fn test_png() -> Vec<u8> {
    let img = image::RgbImage::from_fn(6, 4, |x, y| {
        image::Rgb([(x * 40) as u8, (y * 60) as u8, 90])
    });
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

pub async fn start() -> MockServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let state = Arc::new(MockState {
        base: base.clone(),
        png: test_png(),
        generate_calls: AtomicU32::new(0),
        downloads: AtomicU32::new(0),
        polls: Mutex::new(HashMap::new()),
        last_body: Mutex::new(None),
    });

    let app = Router::new()
        .route("/qwen", post(qwen))
        .route("/seedream", post(seedream))
        .route("/wan/submit", post(wan_submit))
        .route("/wan/tasks/{task_id}", get(wan_task))
        .route("/files/image.png", get(image_file))
        .with_state(state.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockServer { base, state }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {API_KEY}"))
}

/// Common failure answers driven by the prompt text.
fn scripted_failure(headers: &HeaderMap, prompt: &str) -> Option<Response> {
    if !authorized(headers) || prompt.contains("unauthorized") {
        return Some((StatusCode::UNAUTHORIZED, r#"{"code":"InvalidApiKey"}"#).into_response());
    }
    if prompt.contains("bad request") {
        return Some((StatusCode::BAD_REQUEST, r#"{"code":"InvalidParameter"}"#).into_response());
    }
    if prompt.contains("rate limit") {
        return Some(
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, "7")],
                r#"{"code":"Throttling"}"#,
            )
                .into_response(),
        );
    }
    None
}

async fn qwen(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.generate_calls.fetch_add(1, Ordering::SeqCst);
    let prompt = body["input"]["messages"][0]["content"][0]["text"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    *state.last_body.lock().unwrap() = Some(body);

    if let Some(response) = scripted_failure(&headers, &prompt) {
        return response;
    }

    let image = if prompt.contains("garbage") {
        base64::engine::general_purpose::STANDARD.encode(b"<html>not an image</html>")
    } else if prompt.contains("inline") {
        state.png_base64()
    } else {
        state.image_url()
    };

    Json(json!({
        "output": {
            "choices": [{
                "finish_reason": "stop",
                "message": {
                    "role": "assistant",
                    "content": [{"image": image}]
                }
            }]
        },
        "usage": {"width": 6, "height": 4, "image_count": 1},
        "request_id": "req-1"
    }))
    .into_response()
}

async fn seedream(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.generate_calls.fetch_add(1, Ordering::SeqCst);
    let prompt = body["prompt"].as_str().unwrap_or_default().to_string();
    let wants_b64 = body["response_format"] == "b64_json";
    *state.last_body.lock().unwrap() = Some(body);

    if let Some(response) = scripted_failure(&headers, &prompt) {
        return response;
    }

    let item = if wants_b64 {
        json!({"b64_json": state.png_base64(), "size": "6x4"})
    } else {
        json!({"url": state.image_url(), "size": "6x4"})
    };

    Json(json!({
        "model": "doubao-seedream-4-0-250828",
        "created": 1757321139,
        "data": [item],
        "usage": {"generated_images": 1}
    }))
    .into_response()
}

async fn wan_submit(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.generate_calls.fetch_add(1, Ordering::SeqCst);
    let prompt = body["input"]["prompt"].as_str().unwrap_or_default().to_string();
    *state.last_body.lock().unwrap() = Some(body);

    if let Some(response) = scripted_failure(&headers, &prompt) {
        return response;
    }
    if headers.get("X-DashScope-Async").and_then(|v| v.to_str().ok()) != Some("enable") {
        return (
            StatusCode::FORBIDDEN,
            r#"{"code":"AccessDenied","message":"current user api does not support synchronous calls"}"#,
        )
            .into_response();
    }

    let task_id = if prompt.contains("fail") {
        "t-fail"
    } else if prompt.contains("stuck") {
        "t-stuck"
    } else {
        "t-run"
    };

    Json(json!({
        "output": {"task_status": "PENDING", "task_id": task_id},
        "request_id": "req-2"
    }))
    .into_response()
}

async fn wan_task(
    State(state): State<Arc<MockState>>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let poll = {
        let mut polls = state.polls.lock().unwrap();
        let count = polls.entry(task_id.clone()).or_insert(0);
        *count += 1;
        *count
    };

    let output = match task_id.as_str() {
        "t-fail" => json!({
            "task_id": task_id,
            "task_status": "FAILED",
            "code": "DataInspectionFailed",
            "message": "Input data may contain inappropriate content."
        }),
        "t-run" if poll > WAN_RUNNING_POLLS => json!({
            "task_id": task_id,
            "task_status": "SUCCEEDED",
            "results": [{"orig_prompt": "a lantern", "url": state.image_url()}]
        }),
        _ => json!({"task_id": task_id, "task_status": "RUNNING"}),
    };

    Json(json!({"output": output, "request_id": format!("req-poll-{poll}")})).into_response()
}

async fn image_file(State(state): State<Arc<MockState>>) -> Response {
    state.downloads.fetch_add(1, Ordering::SeqCst);
    ([(header::CONTENT_TYPE, "image/png")], state.png.clone()).into_response()
}
