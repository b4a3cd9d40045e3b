//! HTTP surface smoke tests over the real router with fake collaborators.

mod helpers;

use helpers::*;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tower::ServiceExt;

use callscribe_en::models::Recording;
use callscribe_en::{build_router, AppState};

async fn test_app(api: Arc<FakeRecordingsApi>, env: &TestEnv) -> axum::Router {
    let orchestrator = Arc::new(make_orchestrator(
        env,
        api,
        None,
        Some(Arc::new(FakeSummarizer::ok())),
        2,
    ));
    let state = AppState::new(env.pool.clone(), orchestrator, "callqueue".to_string());
    build_router(state)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_service_identity() {
    let env = test_env().await;
    let app = test_app(Arc::new(FakeRecordingsApi::default()), &env).await;

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "callscribe-en");
}

#[tokio::test]
async fn listing_starts_empty_and_rejects_unknown_status() {
    let env = test_env().await;
    let app = test_app(Arc::new(FakeRecordingsApi::default()), &env).await;

    let response = app
        .clone()
        .oneshot(Request::get("/recordings").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!([]));

    let response = app
        .oneshot(
            Request::get("/recordings?status=bogus")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_recording_is_404() {
    let env = test_env().await;
    let app = test_app(Arc::new(FakeRecordingsApi::default()), &env).await;

    let response = app
        .clone()
        .oneshot(
            Request::get("/recordings/no-such-id")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "NOT_FOUND");

    let response = app
        .oneshot(
            Request::post("/recordings/no-such-id/reprocess")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn fetch_runs_a_batch_and_reports_outcomes() {
    // Given: one recording discoverable upstream
    let env = test_env().await;
    let api = Arc::new(
        FakeRecordingsApi::default()
            .with_recording("rec-api", details_with(Some("a://x"), Some("t://x")))
            .with_audio("a://x", b"mp3-bytes")
            .with_transcript("t://x", SAMPLE_VTT),
    );
    let app = test_app(api, &env).await;

    // When: a fetch is posted with no explicit window
    let response = app
        .clone()
        .oneshot(
            Request::post("/recordings/fetch")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    // Then: the batch report lists the processed recording
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["discovered"], 1);
    assert_eq!(json["outcomes"][0]["recording_id"], "rec-api");
    assert_eq!(json["outcomes"][0]["status"], "completed");

    // And: the detail endpoint now serves it
    let response = app
        .oneshot(
            Request::get("/recordings/rec-api")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["transcript_source"], "platform");
}

#[tokio::test]
async fn bare_force_flag_reruns_a_completed_recording() {
    // Given: a recording completed through an initial fetch
    let env = test_env().await;
    let api = Arc::new(
        FakeRecordingsApi::default()
            .with_recording("rec-fr", details_with(Some("a://fr"), Some("t://fr")))
            .with_audio("a://fr", b"mp3-bytes")
            .with_transcript("t://fr", SAMPLE_VTT),
    );
    let app = test_app(Arc::clone(&api), &env).await;
    app.clone()
        .oneshot(
            Request::post("/recordings/fetch")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    let details_after_fetch = api.details_calls.load(Ordering::SeqCst);

    // When: reprocess is posted with the valueless flag form
    let response = app
        .oneshot(
            Request::post("/recordings/rec-fr/reprocess?force")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // Then: the flag parsed and the ladder re-ran from the top
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "completed");
    assert!(api.details_calls.load(Ordering::SeqCst) > details_after_fetch);
}

#[tokio::test]
async fn fetch_rejects_inverted_window() {
    let env = test_env().await;
    let app = test_app(Arc::new(FakeRecordingsApi::default()), &env).await;

    let body = serde_json::json!({
        "from": "2026-02-10T10:00:00Z",
        "to": "2026-02-10T09:00:00Z",
    });
    let response = app
        .oneshot(
            Request::post("/recordings/fetch")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stats_summary_reflects_stored_rows() {
    let env = test_env().await;
    callscribe_en::db::recordings::upsert_recording(
        &env.pool,
        &Recording::new("rec-st", call_time()),
    )
    .await
    .unwrap();
    let app = test_app(Arc::new(FakeRecordingsApi::default()), &env).await;

    let response = app
        .oneshot(
            Request::get("/recordings/stats/summary")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["total"], 1);
    assert_eq!(json["by_status"]["new"], 1);
}
