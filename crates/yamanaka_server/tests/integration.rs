//! End-to-end flows against the real router.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use futures::StreamExt;
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;
use yamanaka_protocol::SyncEvent;
use yamanaka_server::{router, ServerConfig, SyncContext};
use yamanaka_testkit::{device_id, targz_archive};

fn setup() -> (TempDir, Arc<SyncContext>, Router) {
    let dir = TempDir::new().unwrap();
    let ctx = SyncContext::open(ServerConfig::new(dir.path())).unwrap();
    let app = router(Arc::clone(&ctx));
    (dir, ctx, app)
}

fn push_request(device: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/api/sync/push?device_id={device}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn pull_request() -> Request<Body> {
    Request::builder()
        .uri("/api/sync/pull")
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn next_event(stream: &mut yamanaka_server::EventStream) -> SyncEvent {
    tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("timed out waiting for an event")
        .expect("stream ended unexpectedly")
}

async fn expect_silence(stream: &mut yamanaka_server::EventStream) {
    let outcome = tokio::time::timeout(Duration::from_millis(200), stream.next()).await;
    assert!(outcome.is_err(), "expected no event, got {outcome:?}");
}

#[tokio::test]
async fn health_check_reports_ok() {
    let (_dir, _ctx, app) = setup();

    let response = app
        .oneshot(Request::builder().uri("/api/check").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, serde_json::json!({"status": "ok"}));
}

#[tokio::test]
async fn push_round_trip() {
    let (_dir, _ctx, app) = setup();

    let response = app
        .clone()
        .oneshot(push_request(
            "device-a",
            serde_json::json!({
                "files_to_update": [{"path": "n.md", "content": "aGVsbG8="}],
                "files_to_delete": [],
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        serde_json::json!({"status": "success, push processed and changes broadcasted"})
    );

    let response = app.clone().oneshot(pull_request()).await.unwrap();
    assert_eq!(
        json_body(response).await,
        serde_json::json!({"files": [{"path": "n.md", "content": "aGVsbG8="}]})
    );

    let response = app
        .clone()
        .oneshot(push_request(
            "device-a",
            serde_json::json!({"files_to_update": [], "files_to_delete": ["n.md"]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(pull_request()).await.unwrap();
    assert_eq!(json_body(response).await, serde_json::json!({"files": []}));
}

#[tokio::test]
async fn push_broadcasts_and_suppresses_sender() {
    let (_dir, ctx, app) = setup();

    let mut stream_a = ctx.subscribe("device-a").await.unwrap();
    let mut stream_b = ctx.subscribe("device-b").await.unwrap();

    app.clone()
        .oneshot(push_request(
            "device-a",
            serde_json::json!({
                "files_to_update": [{"path": "n.md", "content": "aGVsbG8="}],
                "files_to_delete": [],
            }),
        ))
        .await
        .unwrap();

    assert_eq!(
        next_event(&mut stream_b).await,
        SyncEvent::file_updated("n.md", "aGVsbG8=")
    );
    expect_silence(&mut stream_a).await;

    app.oneshot(push_request(
        "device-a",
        serde_json::json!({"files_to_update": [], "files_to_delete": ["n.md"]}),
    ))
    .await
    .unwrap();

    assert_eq!(next_event(&mut stream_b).await, SyncEvent::file_deleted("n.md"));
    expect_silence(&mut stream_a).await;
}

#[tokio::test]
async fn offline_catchup_under_threshold() {
    let (_dir, ctx, app) = setup();

    // One connection is enough to become tracked.
    drop(ctx.subscribe("device-b").await.unwrap());

    app.oneshot(push_request(
        "device-a",
        serde_json::json!({
            "files_to_update": [
                {"path": "a.md", "content": "AA=="},
                {"path": "b.md", "content": "AQ=="},
                {"path": "c.md", "content": "Ag=="},
            ],
            "files_to_delete": [],
        }),
    ))
    .await
    .unwrap();

    let mut stream = ctx.subscribe("device-b").await.unwrap();
    assert_eq!(next_event(&mut stream).await, SyncEvent::file_updated("a.md", "AA=="));
    assert_eq!(next_event(&mut stream).await, SyncEvent::file_updated("b.md", "AQ=="));
    assert_eq!(next_event(&mut stream).await, SyncEvent::file_updated("c.md", "Ag=="));
    expect_silence(&mut stream).await;
}

#[tokio::test]
async fn offline_catchup_over_threshold() {
    let (_dir, ctx, app) = setup();

    drop(ctx.subscribe("device-b").await.unwrap());

    let updates: Vec<_> = (0..11)
        .map(|i| serde_json::json!({"path": format!("f{i}.md"), "content": "QQ=="}))
        .collect();
    app.clone()
        .oneshot(push_request(
            "device-a",
            serde_json::json!({"files_to_update": updates, "files_to_delete": []}),
        ))
        .await
        .unwrap();

    let mut stream = ctx.subscribe("device-b").await.unwrap();
    match next_event(&mut stream).await {
        SyncEvent::FullSyncRequired { message } => assert!(message.contains("11")),
        other => panic!("expected a full-sync signal, got {other:?}"),
    }
    expect_silence(&mut stream).await;

    let response = app.oneshot(pull_request()).await.unwrap();
    let files = json_body(response).await["files"].as_array().unwrap().len();
    assert_eq!(files, 11);
}

#[tokio::test]
async fn initial_replace_sends_one_full_sync_signal() {
    let (_dir, ctx, app) = setup();

    // Pre-existing content that the replace must wipe.
    app.clone()
        .oneshot(push_request(
            "device-a",
            serde_json::json!({
                "files_to_update": [{"path": "old.md", "content": "QQ=="}],
                "files_to_delete": [],
            }),
        ))
        .await
        .unwrap();

    let mut stream_b = ctx.subscribe("device-b").await.unwrap();
    let mut stream_c = ctx.subscribe("device-c").await.unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/sync/initial?device_id=device-a")
                .header(header::CONTENT_TYPE, "application/gzip")
                .body(Body::from(targz_archive(&[("x/y.md", b"hello")])))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        serde_json::json!({"status": "success, initial sync processed. Other clients notified."})
    );

    for stream in [&mut stream_b, &mut stream_c] {
        assert!(matches!(
            next_event(stream).await,
            SyncEvent::FullSyncRequired { .. }
        ));
        expect_silence(stream).await;
    }

    let response = app.oneshot(pull_request()).await.unwrap();
    assert_eq!(
        json_body(response).await,
        serde_json::json!({"files": [{"path": "x/y.md", "content": "aGVsbG8="}]})
    );
}

#[tokio::test]
async fn path_escape_is_contained() {
    let (dir, ctx, app) = setup();

    let mut stream_b = ctx.subscribe("device-b").await.unwrap();

    let response = app
        .clone()
        .oneshot(push_request(
            "device-a",
            serde_json::json!({
                "files_to_update": [
                    {"path": "../evil", "content": "eA=="},
                    {"path": "ok.md", "content": "eQ=="},
                ],
                "files_to_delete": [],
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(!dir.path().parent().unwrap().join("evil").exists());

    let response = app.oneshot(pull_request()).await.unwrap();
    assert_eq!(
        json_body(response).await,
        serde_json::json!({"files": [{"path": "ok.md", "content": "eQ=="}]})
    );

    assert_eq!(next_event(&mut stream_b).await, SyncEvent::file_updated("ok.md", "eQ=="));
    expect_silence(&mut stream_b).await;
}

#[tokio::test]
async fn roster_survives_restart() {
    let dir = TempDir::new().unwrap();
    let device_b = device_id();

    {
        let ctx = SyncContext::open(ServerConfig::new(dir.path())).unwrap();
        drop(ctx.subscribe(&device_b).await.unwrap());

        // Roster persistence is fire-and-forget; wait for it to land.
        let roster = dir.path().join("clients.json");
        for _ in 0..100 {
            if roster.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(roster.exists(), "roster was never persisted");
    }

    let ctx = SyncContext::open(ServerConfig::new(dir.path())).unwrap();
    assert_eq!(ctx.registry.tracked_ids(), vec![device_b.clone()]);

    let app = router(Arc::clone(&ctx));
    app.oneshot(push_request(
        "device-a",
        serde_json::json!({
            "files_to_update": [{"path": "late.md", "content": "QQ=="}],
            "files_to_delete": [],
        }),
    ))
    .await
    .unwrap();

    let mut stream = ctx.subscribe(&device_b).await.unwrap();
    assert_eq!(next_event(&mut stream).await, SyncEvent::file_updated("late.md", "QQ=="));
}

#[tokio::test]
async fn event_stream_requires_device_id() {
    let (_dir, _ctx, app) = setup();

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/api/events").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/events?device_id=")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn event_stream_responds_with_sse_headers() {
    let (_dir, _ctx, app) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/events?device_id=device-b")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
}

#[tokio::test]
async fn wrong_method_is_rejected() {
    let (_dir, _ctx, app) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/sync/push")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn malformed_archive_is_rejected() {
    let (_dir, _ctx, app) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/sync/initial?device_id=device-a")
                .header(header::CONTENT_TYPE, "application/gzip")
                .body(Body::from("definitely not a tarball"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_push_body_is_rejected() {
    let (_dir, _ctx, app) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/sync/push?device_id=device-a")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
