mod common;

use axum::http::StatusCode;
use serde_json::Value;
use std::sync::Arc;

use common::{spawn_app, RecordingSender};

fn slugs(body: &Value) -> Vec<String> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["slug"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn filter_by_type_and_difficulty() {
    let app = spawn_app(Arc::new(RecordingSender::default())).await;

    let (status, body) = app.get("/api/tours?tourTypes=ACTIVE&difficulty=MEDIUM").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(slugs(&body), vec!["active-gunib"]);
    assert_eq!(body["data"][0]["priceFrom"], 12_000.0);
    assert_eq!(body["data"][0]["duration"], 3);
}

#[tokio::test]
async fn default_listing_sorted_by_title() {
    let app = spawn_app(Arc::new(RecordingSender::default())).await;

    let (_, body) = app.get("/api/tours").await;
    let found = slugs(&body);
    assert_eq!(found.len(), 6);

    let titles: Vec<String> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap().to_string())
        .collect();
    let mut sorted = titles.clone();
    sorted.sort();
    assert_eq!(titles, sorted);
}

#[tokio::test]
async fn sort_desc_with_limit() {
    let app = spawn_app(Arc::new(RecordingSender::default())).await;

    let (_, body) = app.get("/api/tours?sortBy=price&sortOrder=desc&limit=2").await;

    assert_eq!(slugs(&body), vec!["combined-sulak", "cultural-village"]);
}

#[tokio::test]
async fn unknown_filter_token_is_bad_request() {
    let app = spawn_app(Arc::new(RecordingSender::default())).await;

    let (status, body) = app.get("/api/tours?difficulty=EXTREME").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = app.get("/api/tours?priceMin=cheap").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tour_by_slug() {
    let app = spawn_app(Arc::new(RecordingSender::default())).await;

    let (status, body) = app.get("/api/tours/combined-sulak").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["destination"]["id"], "sulak");

    let (status, _) = app.get("/api/tours/moon-base").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn filter_options_listed() {
    let app = spawn_app(Arc::new(RecordingSender::default())).await;

    let (status, body) = app.get("/api/tours/filters").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["tourTypes"].as_array().unwrap().len(), 4);
    assert_eq!(body["data"]["difficulty"].as_array().unwrap().len(), 3);
    assert_eq!(body["data"]["destinations"].as_array().unwrap().len(), 6);
    assert_eq!(body["data"]["sortOptions"][0]["value"], "popularity");
}
