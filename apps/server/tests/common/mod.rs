#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tower::util::ServiceExt;

use tours_server::{
    build_router, catalog,
    db,
    notify::{EmailError, EmailMessage, EmailSender, MailSettings, Notifier},
    pricing,
    rate_limit::{RateLimitConfig, RateLimitSettings, RateLimiter},
    AppState,
};

/// Records every message it is asked to send.
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<EmailMessage>>,
}

#[async_trait]
impl EmailSender for RecordingSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Rejects every message, like an email API that is down.
pub struct FailingSender;

#[async_trait]
impl EmailSender for FailingSender {
    async fn send(&self, _message: &EmailMessage) -> Result<(), EmailError> {
        Err(EmailError::Rejected {
            status: 503,
            body: "service unavailable".into(),
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
}

pub fn relaxed_limits() -> RateLimitSettings {
    let wide = RateLimitConfig::new(10_000, 60);
    RateLimitSettings {
        public: wide,
        quote: wide,
        booking: wide,
        admin: wide,
    }
}

pub async fn spawn_app(sender: Arc<dyn EmailSender>) -> TestApp {
    spawn_app_with_limits(sender, relaxed_limits()).await
}

pub async fn spawn_app_with_limits(sender: Arc<dyn EmailSender>, limits: RateLimitSettings) -> TestApp {
    // One connection that never recycles, so the in-memory database survives the test
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();

    let state = Arc::new(AppState {
        db: pool,
        started_at: Instant::now(),
        catalog: catalog::sample_tours(),
        discount_rules: pricing::default_discount_rules(),
        notifier: Notifier::new(sender, MailSettings::default()),
    });
    let router = build_router(state.clone(), RateLimiter::new(&limits));
    TestApp { router, state }
}

impl TestApp {
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, Some(body)).await
    }
}

pub fn valid_booking() -> Value {
    serde_json::json!({
        "firstName": "Иван",
        "lastName": "Петров",
        "email": "ivan@example.com",
        "phone": "+79001234567",
        "participants": 4,
        "preferredDate": "2026-06-01",
        "tourType": "EXCURSION",
        "totalPrice": 135000,
        "services": [{"serviceId": "lunch", "quantity": 4}]
    })
}

/// Poll until `sender` has recorded `count` messages or a second has passed.
pub async fn wait_for_emails(sender: &RecordingSender, count: usize) -> Vec<EmailMessage> {
    for _ in 0..100 {
        let sent = sender.sent.lock().unwrap().clone();
        if sent.len() >= count {
            return sent;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    sender.sent.lock().unwrap().clone()
}
