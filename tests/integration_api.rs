//! API integration tests
//!
//! Drive the router with `tower::ServiceExt::oneshot` against a fake
//! transcoder.

mod common;

use audioforge::quota::QuotaRecord;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use common::{eventually, multipart_body, FakeTranscoder, TestHarness};
use http_body_util::BodyExt;
use std::time::Duration;
use tower::ServiceExt;

fn app(harness: &TestHarness) -> Router {
    audioforge::server::create_router(harness.ctx.clone(), None)
}

fn convert_request(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let (multipart_type, body) = multipart_body(field, file_name, content_type, data);
    Request::builder()
        .method("POST")
        .uri("/convert")
        .header(header::CONTENT_TYPE, multipart_type)
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(body: Body) -> serde_json::Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Download path ("/download/<name>") from a convert response body.
fn download_path(json: &serde_json::Value) -> String {
    let url = json["downloadUrl"].as_str().unwrap();
    url.strip_prefix("http://audio.test").unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let harness = TestHarness::new();
    let response = app(&harness).oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_convert_success() {
    let harness = TestHarness::new();

    let response = app(&harness)
        .oneshot(convert_request("file", "Summer Trip.mp4", "video/mp4", b"frames"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response.into_body()).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["fileName"], "Summer Trip.mp3");
    let path = download_path(&json);
    assert!(path.starts_with("/download/"));
    assert!(path.ends_with(".mp3"));

    assert_eq!(harness.ctx.quota.snapshot().count, 1);
    assert_eq!(harness.staged_count(), 1);
    assert_eq!(harness.artifact_count(), 1);
    assert_eq!(harness.ctx.cleanup.pending(), 1);
    assert_eq!(harness.transcoder.calls(), 1);
}

#[tokio::test]
async fn test_download_returns_exact_bytes() {
    let harness = TestHarness::new();
    let app = app(&harness);

    let response = app
        .clone()
        .oneshot(convert_request("file", "clip.mp4", "video/mp4", b"frames"))
        .await
        .unwrap();
    let path = download_path(&body_json(response.into_body()).await);

    let response = app.oneshot(get(&path)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"clip.mp3\""
    );

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ID3frames");
}

#[tokio::test]
async fn test_quota_exceeded() {
    let harness = TestHarness::build(FakeTranscoder::succeeding(), |c| c.quota.daily_limit = 1);
    let app = app(&harness);

    let first = app
        .clone()
        .oneshot(convert_request("file", "a.mp4", "video/mp4", b"a"))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(convert_request("file", "b.mp4", "video/mp4", b"b"))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::FORBIDDEN);

    let json = body_json(second.into_body()).await;
    assert_eq!(json["code"], "quota_exceeded");
    assert_eq!(
        json["error"],
        "You've hit 1 free conversions today. Please try again tomorrow."
    );
    assert_eq!(harness.ctx.quota.snapshot().count, 1);
    assert_eq!(harness.staged_count(), 1);
    assert_eq!(harness.transcoder.calls(), 1);
}

#[tokio::test]
async fn test_limit_three_from_count_two() {
    let harness = TestHarness::new();
    let record = QuotaRecord {
        count: 2,
        ..harness.ctx.quota.snapshot()
    };
    harness.ctx.quota.write(&record);
    let app = app(&harness);

    let response = app
        .clone()
        .oneshot(convert_request("file", "a.mp4", "video/mp4", b"a"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(harness.ctx.quota.snapshot().count, 3);

    let response = app
        .oneshot(convert_request("file", "b.mp4", "video/mp4", b"b"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unsupported_media_type() {
    let harness = TestHarness::new();

    let response = app(&harness)
        .oneshot(convert_request("file", "clip.webm", "video/webm", b"x"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let json = body_json(response.into_body()).await;
    assert_eq!(json["code"], "unsupported_media_type");
    assert_eq!(harness.staged_count(), 0);
    assert_eq!(harness.ctx.quota.snapshot().count, 0);
    assert_eq!(harness.transcoder.calls(), 0);
}

#[tokio::test]
async fn test_engine_failure() {
    let harness = TestHarness::failing();

    let response = app(&harness)
        .oneshot(convert_request("file", "broken.mp4", "video/mp4", b"x"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response.into_body()).await;
    assert_eq!(json["code"], "conversion_failed");
    assert_eq!(json["error"], "Conversion failed. Try again later.");
    assert_eq!(harness.ctx.quota.snapshot().count, 0);
    assert_eq!(harness.staged_count(), 0);
    assert_eq!(harness.artifact_count(), 0);
}

#[tokio::test]
async fn test_missing_file_field() {
    let harness = TestHarness::new();

    let response = app(&harness)
        .oneshot(convert_request("video", "clip.mp4", "video/mp4", b"x"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response.into_body()).await;
    assert_eq!(json["code"], "invalid_input");
    assert_eq!(harness.ctx.quota.snapshot().count, 0);
}

#[tokio::test]
async fn test_download_unknown_name() {
    let harness = TestHarness::new();

    let response = app(&harness)
        .oneshot(get("/download/nothing-here.mp3"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response.into_body()).await;
    assert_eq!(json["code"], "artifact_not_found");
}

#[tokio::test]
async fn test_download_rejects_traversal() {
    let harness = TestHarness::new();
    std::fs::write(harness.dir.path().join("conversionCount.json.bak"), b"x").unwrap();

    for uri in [
        "/download/..%2FconversionCount.json",
        "/download/%2E%2E%2FconversionCount.json.bak",
        "/download/..",
    ] {
        let response = app(&harness).oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn test_conversion_count() {
    let harness = TestHarness::new();
    let app = app(&harness);

    app.clone()
        .oneshot(convert_request("file", "a.mp4", "video/mp4", b"a"))
        .await
        .unwrap();

    let response = app.oneshot(get("/conversionCount")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response.into_body()).await;
    assert_eq!(json["count"], 1);
    assert!(json["lastResetDate"].is_string());
}

#[tokio::test]
async fn test_delete_artifact() {
    let harness = TestHarness::new();
    let app = app(&harness);

    let response = app
        .clone()
        .oneshot(convert_request("file", "clip.mp4", "video/mp4", b"x"))
        .await
        .unwrap();
    let path = download_path(&body_json(response.into_body()).await);

    let delete = |uri: &str| {
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    };

    let response = app.clone().oneshot(delete(&path)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(harness.staged_count(), 0);
    assert_eq!(harness.artifact_count(), 0);
    assert_eq!(harness.ctx.cleanup.pending(), 0);

    let response = app.clone().oneshot(delete(&path)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.oneshot(get(&path)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_files_removed_after_retention() {
    let harness = TestHarness::build(FakeTranscoder::succeeding(), |c| {
        c.conversion.retention_secs = 1;
        c.conversion.download_grace_secs = 0;
    });
    let app = app(&harness);

    let response = app
        .clone()
        .oneshot(convert_request("file", "clip.mp4", "video/mp4", b"x"))
        .await
        .unwrap();
    let path = download_path(&body_json(response.into_body()).await);
    assert_eq!(harness.artifact_count(), 1);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(eventually(|| harness.staged_count() == 0 && harness.artifact_count() == 0).await);

    let response = app.oneshot(get(&path)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_concurrent_requests_respect_limit() {
    let harness = TestHarness::build(FakeTranscoder::slow(Duration::from_millis(100)), |c| {
        c.quota.daily_limit = 3
    });
    let app = app(&harness);

    let requests = (0..8).map(|i| {
        let app = app.clone();
        tokio::spawn(async move {
            app.oneshot(convert_request("file", &format!("{i}.mp4"), "video/mp4", b"x"))
                .await
                .unwrap()
                .status()
        })
    });

    let mut ok = 0;
    let mut forbidden = 0;
    for status in futures::future::join_all(requests).await {
        match status.unwrap() {
            StatusCode::OK => ok += 1,
            StatusCode::FORBIDDEN => forbidden += 1,
            other => panic!("unexpected status {other}"),
        }
    }

    assert_eq!(ok, 3);
    assert_eq!(forbidden, 5);
    assert_eq!(harness.ctx.quota.snapshot().count, 3);
}
