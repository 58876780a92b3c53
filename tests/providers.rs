#![cfg(feature = "image")]

mod common;

use common::{start, API_KEY, WAN_RUNNING_POLLS};
use sheetviz::image::ResponseDumper;
use sheetviz::{
    FailureKind, GenerationRequest, ImageFormat, ImageProvider, ImageProviderKind, QwenProvider,
    SeedreamProvider, SheetVizError, WanProvider,
};
use std::sync::atomic::Ordering;
use std::time::Duration;

fn qwen(server: &common::MockServer) -> QwenProvider {
    QwenProvider::builder()
        .api_key(API_KEY)
        .endpoint(server.url("/qwen"))
        .build()
        .unwrap()
}

fn seedream(server: &common::MockServer) -> sheetviz::SeedreamProviderBuilder {
    SeedreamProvider::builder()
        .api_key(API_KEY)
        .endpoint(server.url("/seedream"))
}

fn wan(server: &common::MockServer) -> sheetviz::WanProviderBuilder {
    WanProvider::builder()
        .api_key(API_KEY)
        .endpoint(server.url("/wan/submit"))
        .tasks_endpoint(server.url("/wan/tasks"))
        .poll_interval(Duration::from_millis(10))
}

#[tokio::test]
async fn qwen_url_and_inline_payloads_yield_same_image() {
    let server = start().await;
    let provider = qwen(&server);

    let from_url = provider
        .generate(&GenerationRequest::new("a lantern, url please"))
        .await
        .unwrap();
    let inline = provider
        .generate(&GenerationRequest::new("a lantern, inline please"))
        .await
        .unwrap();

    assert_eq!(from_url.data, inline.data);
    assert_eq!(from_url.data, server.state.png);
    assert_eq!(from_url.dimensions, (6, 4));
    assert_eq!(inline.dimensions, (6, 4));
    assert_eq!(from_url.format, ImageFormat::Png);
    assert!(from_url.metadata.source_url.is_some());
    assert!(inline.metadata.source_url.is_none());
    assert_eq!(server.state.downloads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn qwen_sends_defaults_and_dumps_response() {
    let server = start().await;
    let dumps = tempfile::tempdir().unwrap();
    let provider = QwenProvider::builder()
        .api_key(API_KEY)
        .endpoint(server.url("/qwen"))
        .dumper(ResponseDumper::new(dumps.path()))
        .build()
        .unwrap();

    let request = GenerationRequest::new("a flower shop, inline").with_row_number(5);
    let image = provider.generate(&request).await.unwrap();
    assert_eq!(image.provider, ImageProviderKind::Qwen);
    assert_eq!(image.metadata.model.as_deref(), Some("qwen-image-plus"));

    let body = server.state.last_body();
    assert_eq!(body["model"], "qwen-image-plus");
    assert_eq!(body["parameters"]["size"], "1328*1328");
    assert_eq!(body["parameters"]["prompt_extend"], true);
    assert_eq!(body["parameters"]["watermark"], false);

    let dump = dumps.path().join("debug_response_5.json");
    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dump).unwrap()).unwrap();
    assert_eq!(saved["request_id"], "req-1");
}

#[tokio::test]
async fn qwen_rejected_key_is_unauthorized() {
    let server = start().await;
    let provider = QwenProvider::builder()
        .api_key("sk-wrong")
        .endpoint(server.url("/qwen"))
        .build()
        .unwrap();

    let err = provider
        .generate(&GenerationRequest::new("a lantern"))
        .await
        .unwrap_err();
    assert!(matches!(err, SheetVizError::Auth(_)));
    assert_eq!(err.failure_kind(), FailureKind::Unauthorized);
}

#[tokio::test]
async fn qwen_status_codes_are_classified() {
    let server = start().await;
    let provider = qwen(&server);

    let err = provider
        .generate(&GenerationRequest::new("bad request"))
        .await
        .unwrap_err();
    assert_eq!(err.failure_kind(), FailureKind::BadRequest);

    let err = provider
        .generate(&GenerationRequest::new("rate limit"))
        .await
        .unwrap_err();
    assert_eq!(err.failure_kind(), FailureKind::RateLimited);
    assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
}

#[tokio::test]
async fn qwen_undecodable_bytes_fail_despite_http_200() {
    let server = start().await;
    let provider = qwen(&server);

    let err = provider
        .generate(&GenerationRequest::new("garbage"))
        .await
        .unwrap_err();
    assert!(matches!(err, SheetVizError::Decode(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn qwen_empty_prompt_is_rejected_locally() {
    let server = start().await;
    let provider = qwen(&server);

    let err = provider
        .generate(&GenerationRequest::new("  "))
        .await
        .unwrap_err();
    assert_eq!(err.failure_kind(), FailureKind::BadRequest);
    assert_eq!(server.state.generate_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn seedream_downloads_data_list_url() {
    let server = start().await;
    let provider = seedream(&server).build().unwrap();

    let request = GenerationRequest::new("an ink painting of a pavilion")
        .with_negative_prompt("low quality, blurry")
        .with_extra("steps", 30)
        .with_extra("guidance_scale", 7.5);
    let image = provider.generate(&request).await.unwrap();

    assert_eq!(image.data, server.state.png);
    assert_eq!(image.provider, ImageProviderKind::Seedream);
    assert_eq!(server.state.downloads.load(Ordering::SeqCst), 1);

    let body = server.state.last_body();
    assert_eq!(body["model"], "doubao-seedream-4-0-250828");
    assert_eq!(body["size"], "2K");
    assert_eq!(body["n"], 1);
    assert_eq!(body["negative_prompt"], "low quality, blurry");
    assert_eq!(body["steps"], 30);
    assert_eq!(body["guidance_scale"], 7.5);
}

#[tokio::test]
async fn seedream_inline_b64_matches_url() {
    let server = start().await;
    let by_url = seedream(&server).build().unwrap();
    let inline = seedream(&server).response_format("b64_json").build().unwrap();

    let request = GenerationRequest::new("a pavilion");
    let a = by_url.generate(&request).await.unwrap();
    let b = inline.generate(&request).await.unwrap();

    assert_eq!(a.data, b.data);
    assert_eq!(server.state.downloads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn wan_polls_until_succeeded() {
    let server = start().await;
    let dumps = tempfile::tempdir().unwrap();
    let provider = wan(&server)
        .dumper(ResponseDumper::new(dumps.path()))
        .build()
        .unwrap();

    let image = provider
        .generate(&GenerationRequest::new("a red lantern").with_row_number(2))
        .await
        .unwrap();

    // N RUNNING answers, then one SUCCEEDED.
    assert_eq!(server.state.polls_for("t-run"), WAN_RUNNING_POLLS + 1);
    assert_eq!(image.data, server.state.png);
    assert_eq!(image.metadata.task_id.as_deref(), Some("t-run"));
    assert_eq!(image.metadata.model.as_deref(), Some("wan2.5-t2i-preview"));

    let body = server.state.last_body();
    assert_eq!(body["input"]["prompt"], "a red lantern");
    assert_eq!(body["parameters"]["n"], 1);
    assert_eq!(body["parameters"]["size"], "1024*1024");

    assert!(dumps.path().join("debug_response_2.json").is_file());
    for poll in 1..=WAN_RUNNING_POLLS + 1 {
        assert!(dumps
            .path()
            .join(format!("task_debug_t-run_{poll}.json"))
            .is_file());
    }
}

#[tokio::test]
async fn wan_failed_task_aborts_after_one_poll() {
    let server = start().await;
    let provider = wan(&server).build().unwrap();

    let err = provider
        .generate(&GenerationRequest::new("this will fail"))
        .await
        .unwrap_err();

    assert_eq!(server.state.polls_for("t-fail"), 1);
    match err {
        SheetVizError::TaskFailed { task_id, reason } => {
            assert_eq!(task_id, "t-fail");
            assert!(reason.contains("DataInspectionFailed"));
            assert!(reason.contains("inappropriate content"));
        }
        other => panic!("expected TaskFailed, got {other:?}"),
    }
    assert_eq!(server.state.downloads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn wan_gives_up_after_max_polls() {
    let server = start().await;
    let provider = wan(&server).max_polls(4).build().unwrap();

    let err = provider
        .generate(&GenerationRequest::new("stuck forever"))
        .await
        .unwrap_err();

    assert_eq!(server.state.polls_for("t-stuck"), 4);
    assert_eq!(err.failure_kind(), FailureKind::Timeout);
}

#[tokio::test]
async fn wan_submit_rejection_skips_polling() {
    let server = start().await;
    let provider = wan(&server).build().unwrap();

    let err = provider
        .generate(&GenerationRequest::new("unauthorized"))
        .await
        .unwrap_err();

    assert_eq!(err.failure_kind(), FailureKind::Unauthorized);
    assert!(server.state.polls.lock().unwrap().is_empty());
}
