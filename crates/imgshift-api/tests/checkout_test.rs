//! Checkout, payment verification and health endpoint integration tests.
//!
//! Run with: `cargo test -p imgshift-api --test checkout_test`

mod helpers;

use axum::http::StatusCode;
use helpers::payments::ScriptedProvider;
use helpers::{setup_test_app, setup_test_app_with, PUBLIC_BASE_URL};
use serde_json::{json, Value};

#[tokio::test]
async fn test_checkout_prices_large_batch() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/api/create-checkout-session")
        .add_header("Origin", "https://convert.example")
        .json(&json!({ "files": 45, "format": "jpg" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["sessionId"], "cs_test_1");
    assert_eq!(body["amount"], 799);
    assert_eq!(body["currency"], "usd");
    assert_eq!(body["tier"]["name"], "C");
    assert_eq!(body["tier"]["label"], "Large batch conversion");
    assert!(body["url"].as_str().unwrap().contains("cs_test_1"));

    let created = app.provider.created_requests();
    assert_eq!(created.len(), 1);
    let request = &created[0];
    assert_eq!(request.amount_minor_units, 799);
    assert_eq!(request.product_name, "Image Conversion");
    assert_eq!(request.description, "Convert 45 images to jpg format");
    assert_eq!(
        request.success_url,
        "https://convert.example/success?session_id={CHECKOUT_SESSION_ID}"
    );
    assert_eq!(request.cancel_url, "https://convert.example/");
    assert_eq!(request.metadata.get("files").map(String::as_str), Some("45"));
    assert_eq!(request.metadata.get("format").map(String::as_str), Some("jpg"));
}

#[tokio::test]
async fn test_checkout_tier_boundaries() {
    let app = setup_test_app().await;

    let cases = [
        (2, 199, "A"),
        (10, 199, "A"),
        (11, 399, "B"),
        (30, 399, "B"),
        (31, 799, "C"),
        (100, 799, "C"),
    ];
    for (files, amount, tier) in cases {
        let response = app
            .client()
            .post("/api/create-checkout-session")
            .json(&json!({ "files": files, "format": "png" }))
            .await;

        assert_eq!(response.status_code(), StatusCode::OK, "files = {}", files);
        let body: Value = response.json();
        assert_eq!(body["amount"], amount, "files = {}", files);
        assert_eq!(body["tier"]["name"], tier, "files = {}", files);
    }
}

#[tokio::test]
async fn test_checkout_falls_back_to_public_base_url() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/api/create-checkout-session")
        .json(&json!({ "files": 5, "format": "webp" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let created = app.provider.created_requests();
    assert_eq!(
        created[0].success_url,
        format!("{}/success?session_id={{CHECKOUT_SESSION_ID}}", PUBLIC_BASE_URL)
    );
    assert_eq!(created[0].cancel_url, format!("{}/", PUBLIC_BASE_URL));
}

#[tokio::test]
async fn test_checkout_rejects_out_of_range_counts() {
    let app = setup_test_app().await;

    for files in [150, 101, 1, 0, -4] {
        let response = app
            .client()
            .post("/api/create-checkout-session")
            .json(&json!({ "files": files, "format": "png" }))
            .await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST, "files = {}", files);
        let body: Value = response.json();
        assert_eq!(body["code"], "INVALID_PARAMETERS", "files = {}", files);
    }
    assert!(app.provider.created_requests().is_empty());
}

#[tokio::test]
async fn test_checkout_rejects_unknown_format() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/api/create-checkout-session")
        .json(&json!({ "files": 5, "format": "bmp" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_FORMAT");
    assert!(app.provider.created_requests().is_empty());
}

#[tokio::test]
async fn test_checkout_malformed_body() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/api/create-checkout-session")
        .json(&json!({ "files": "many" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn test_checkout_provider_failure() {
    let app = setup_test_app_with(ScriptedProvider::failing()).await;

    let response = app
        .client()
        .post("/api/create-checkout-session")
        .json(&json!({ "files": 12, "format": "gif" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["code"], "PAYMENT_ERROR");
    assert_eq!(body["error"], "Payment session creation failed");
}

#[tokio::test]
async fn test_checkout_wrong_method() {
    let app = setup_test_app().await;

    let response = app.client().get("/api/create-checkout-session").await;

    assert_eq!(response.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    let body: Value = response.json();
    assert_eq!(body["code"], "METHOD_NOT_ALLOWED");
}

#[tokio::test]
async fn test_verify_paid_session() {
    let provider = ScriptedProvider::default().with_paid_session("cs_test_paid", 12, "webp");
    let app = setup_test_app_with(provider).await;

    let response = app
        .client()
        .get("/api/verify-payment")
        .add_query_param("session_id", "cs_test_paid")
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["verified"], true);
    assert_eq!(body["sessionId"], "cs_test_paid");
    assert_eq!(body["files"], 12);
    assert_eq!(body["format"], "webp");
}

#[tokio::test]
async fn test_verify_unpaid_session() {
    let provider = ScriptedProvider::default()
        .with_session("cs_test_open", "unpaid", Some(3), Some("png"))
        .with_session("cs_test_free", "no_payment_required", None, None);
    let app = setup_test_app_with(provider).await;

    for id in ["cs_test_open", "cs_test_free"] {
        let response = app
            .client()
            .get("/api/verify-payment")
            .add_query_param("session_id", id)
            .await;

        assert_eq!(response.status_code(), StatusCode::PAYMENT_REQUIRED, "{}", id);
        let body: Value = response.json();
        assert_eq!(body["code"], "PAYMENT_NOT_VERIFIED");
    }
}

#[tokio::test]
async fn test_verify_missing_session_id() {
    let app = setup_test_app().await;

    let response = app.client().get("/api/verify-payment").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "MISSING_PARAMETERS");

    let response = app
        .client()
        .get("/api/verify-payment")
        .add_query_param("session_id", "")
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(app.provider.lookup_count(), 0);
}

#[tokio::test]
async fn test_verify_lookup_failure() {
    let app = setup_test_app_with(ScriptedProvider::failing()).await;

    let response = app
        .client()
        .get("/api/verify-payment")
        .add_query_param("session_id", "cs_test_any")
        .await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["code"], "PAYMENT_ERROR");
    assert_eq!(body["error"], "Payment session lookup failed");
}

#[tokio::test]
async fn test_verify_unknown_session_is_a_lookup_failure() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .get("/api/verify-payment")
        .add_query_param("session_id", "cs_test_missing")
        .await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["code"], "PAYMENT_ERROR");
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = setup_test_app().await;

    let response = app.client().get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["scratch"], "healthy");
    assert_eq!(body["scratch_files"], 0);

    let response = app.client().get("/live").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["status"], "alive");
}

#[tokio::test]
async fn test_openapi_document() {
    let app = setup_test_app().await;

    let response = app.client().get("/api/openapi.json").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert!(body["paths"]["/api/convert"].is_object());
    assert!(body["paths"]["/api/create-checkout-session"].is_object());
    assert!(body["paths"]["/api/verify-payment"].is_object());
}
