#![allow(clippy::unwrap_used, clippy::panic, clippy::missing_panics_doc, missing_debug_implementations, unreachable_pub)]
use reqwest::StatusCode;
use serde_json::Value;
use time::Duration;

mod common;
use common::{DAY_MS, HOUR_MS};

#[tokio::test]
async fn test_update_reanchors_expiration_at_now() {
    let app = common::TestApp::spawn().await;
    let created = app.create_share("draft.docx", Some("1hr")).await;
    let code = created["code"].as_str().unwrap();

    app.advance(Duration::minutes(30));
    let resp = app.update_expiration(code, "1w").await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], code);
    assert_eq!(body["expiresAt"], app.now_ms() + 7 * DAY_MS);

    // Only the deadline moved.
    let fetched: Value = app.retrieve(code).await.json().await.unwrap();
    assert_eq!(fetched["filename"], "draft.docx");
    assert_eq!(fetched["fileUrl"], created["fileUrl"]);
    assert_eq!(fetched["expiresAt"], body["expiresAt"]);
}

#[tokio::test]
async fn test_update_can_shorten_expiration() {
    let app = common::TestApp::spawn().await;
    let created = app.create_share("big.iso", Some("1d")).await;
    let code = created["code"].as_str().unwrap();

    let body: Value = app.update_expiration(code, "1hr").await.json().await.unwrap();
    assert_eq!(body["expiresAt"], app.now_ms() + HOUR_MS);

    app.advance(Duration::hours(2));
    assert_eq!(app.retrieve(code).await.status(), StatusCode::GONE);
}

#[tokio::test]
async fn test_update_keeps_share_alive_past_original_deadline() {
    let app = common::TestApp::spawn().await;
    let code = app.create_share("keep.txt", Some("1hr")).await["code"].as_str().unwrap().to_string();

    app.advance(Duration::minutes(50));
    assert_eq!(app.update_expiration(&code, "5hr").await.status(), StatusCode::OK);

    app.advance(Duration::hours(2));
    assert_eq!(app.retrieve(&code).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_expired_share_cannot_be_revived() {
    let app = common::TestApp::spawn().await;
    let code = app.create_share("old.txt", Some("1hr")).await["code"].as_str().unwrap().to_string();

    app.advance(Duration::hours(2));
    assert_eq!(app.update_expiration(&code, "1w").await.status(), StatusCode::NOT_FOUND);

    // Still unavailable afterwards.
    let status = app.retrieve(&code).await.status();
    assert!(status == StatusCode::NOT_FOUND || status == StatusCode::GONE, "unexpected {status}");
}

#[tokio::test]
async fn test_update_unknown_code_is_not_found() {
    let app = common::TestApp::spawn().await;

    let resp = app.update_expiration("QQQQQ", "1d").await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_requires_code() {
    let app = common::TestApp::spawn().await;

    let resp = app.post_upload(serde_json::json!({ "expiration": "1d", "updateExpiration": true })).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Missing file code.");
}
