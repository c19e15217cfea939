//! Tracing layer that forwards ERROR-level events to an operator webhook.
//!
//! - Rate limiting: at most one alert per `MIN_INTERVAL` (10 s)
//! - Deduplication: identical messages are suppressed for `DEDUP_WINDOW` (60 s)
//! - Non-blocking: the HTTP call is spawned onto the Tokio runtime

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;
use url::Url;

const MIN_INTERVAL: Duration = Duration::from_secs(10);
const DEDUP_WINDOW: Duration = Duration::from_secs(60);

// ── Throttle ──

struct Throttle {
    last_sent: Option<Instant>,
    /// (hash, sent_at) of recently forwarded messages.
    recent: Vec<(u64, Instant)>,
}

impl Throttle {
    fn new() -> Self {
        Self {
            last_sent: None,
            recent: Vec::new(),
        }
    }

    /// Records the send and returns true when `hash` may go out at `now`.
    fn admit(&mut self, hash: u64, now: Instant) -> bool {
        self.recent
            .retain(|(_, ts)| now.saturating_duration_since(*ts) < DEDUP_WINDOW);

        let is_dup = self.recent.iter().any(|(h, _)| *h == hash);
        let too_soon = self
            .last_sent
            .is_some_and(|last| now.saturating_duration_since(last) < MIN_INTERVAL);
        if is_dup || too_soon {
            return false;
        }

        self.last_sent = Some(now);
        self.recent.push((hash, now));
        true
    }
}

// ── Layer ──

pub struct AlertLayer {
    webhook: Url,
    http: reqwest::Client,
    throttle: Mutex<Throttle>,
}

impl AlertLayer {
    pub fn new(webhook: Url) -> Self {
        Self {
            webhook,
            http: reqwest::Client::new(),
            throttle: Mutex::new(Throttle::new()),
        }
    }
}

impl<S: Subscriber> Layer<S> for AlertLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != Level::ERROR {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let message = visitor.message();

        let hash = {
            let mut h = DefaultHasher::new();
            message.hash(&mut h);
            h.finish()
        };
        let admitted = match self.throttle.lock() {
            Ok(mut throttle) => throttle.admit(hash, Instant::now()),
            Err(_) => false,
        };
        if !admitted {
            return;
        }

        // Events emitted outside a runtime (startup, tests) are not forwarded.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let meta = event.metadata();
        let text = format!(
            "[tours-server] ERROR {}\n{} ({}:{})\n{}",
            message,
            meta.target(),
            meta.file().unwrap_or("?"),
            meta.line().map_or_else(|| "?".to_string(), |l| l.to_string()),
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
        );
        let client = self.http.clone();
        let url = self.webhook.clone();

        handle.spawn(async move {
            let _ = client
                .post(url)
                .json(&serde_json::json!({ "text": text }))
                .send()
                .await;
        });
    }
}

// ── Field visitor ──

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl MessageVisitor {
    /// The event message followed by its structured fields.
    fn message(&self) -> String {
        if self.fields.is_empty() {
            return self.message.clone();
        }
        let extras: Vec<String> = self
            .fields
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        if self.message.is_empty() {
            extras.join(", ")
        } else {
            format!("{} ({})", self.message, extras.join(", "))
        }
    }

    fn push(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.push((field.name().to_string(), value));
        }
    }
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.push(field, format!("{:?}", value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_string());
    }
}

// ── Tests ──
