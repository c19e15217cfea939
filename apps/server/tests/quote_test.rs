mod common;

use axum::http::StatusCode;
use serde_json::json;
use std::sync::Arc;

use common::{spawn_app, RecordingSender};

#[tokio::test]
async fn quote_returns_itemized_breakdown() {
    let app = spawn_app(Arc::new(RecordingSender::default())).await;

    let (status, body) = app
        .post(
            "/api/price-quote",
            json!({
                "tourType": "ACTIVE",
                "participants": 2,
                "duration": 2,
                "services": [
                    {"serviceId": "rafting", "quantity": 2},
                    {"serviceId": "airport_transfer", "quantity": 1, "variantId": "premium"},
                    {"serviceId": "teleport", "quantity": 5}
                ]
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    // 25,000 × 2 × 2 + 3,000 × 2 + 3,000; the unknown service adds nothing
    assert_eq!(data["subtotal"], 109_000.0);
    assert_eq!(data["currency"], "RUB");
    assert_eq!(data["breakdown"][0]["category"], "BASE_TOUR");
    assert_eq!(data["breakdown"][0]["quantity"], 2);
    assert_eq!(data["breakdown"].as_array().unwrap().len(), 3);
    // grouped by category in order of first appearance
    assert_eq!(data["breakdown"][1]["category"], "ACTIVITY");
    assert_eq!(data["breakdown"][2]["category"], "TRANSPORT");
    assert_eq!(data["total"], data["subtotal"].as_f64().unwrap() - data["discount"].as_f64().unwrap());
}

#[tokio::test]
async fn quote_validation_lists_every_field() {
    let app = spawn_app(Arc::new(RecordingSender::default())).await;

    let (status, body) = app
        .post(
            "/api/price-quote",
            json!({
                "tourType": "SAFARI",
                "participants": 0,
                "duration": 31,
                "services": [{"serviceId": "lunch", "quantity": 0, "customPrice": -1}]
            }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(
        fields,
        vec![
            "duration",
            "participants",
            "services[0].customPrice",
            "services[0].quantity",
            "tourType"
        ]
    );
}

#[tokio::test]
async fn options_expose_reference_tables() {
    let app = spawn_app(Arc::new(RecordingSender::default())).await;

    let (status, body) = app.get("/api/price-quote/options").await;

    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["tourTypes"].as_array().unwrap().len(), 4);
    assert_eq!(data["tourTypes"][0]["id"], "EXCURSION");
    assert_eq!(data["tourTypes"][0]["basePrice"], 15_000.0);
    assert_eq!(data["services"].as_array().unwrap().len(), 14);
    assert_eq!(data["categories"].as_array().unwrap().len(), 7);
    assert_eq!(data["discountRules"][0]["id"], "early_booking");
    assert_eq!(data["discountRules"][0]["type"], "PERCENTAGE");
}

#[tokio::test]
async fn health_reports_database() {
    let app = spawn_app(Arc::new(RecordingSender::default())).await;

    let (status, body) = app.get("/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["dbOk"], true);
    assert!(body["uptimeSecs"].is_u64());
}
