use anyhow::Context;
use sqlx::sqlite::SqlitePoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use tours_server::{
    alert_layer::AlertLayer,
    build_router, catalog,
    config::Config,
    db,
    notify::{EmailSender, LogOnlySender, Notifier, ResendSender},
    pricing, rate_limit::RateLimiter, AppState,
};

/// Rate limit cleanup interval.
const RATE_LIMIT_CLEANUP_SECS: u64 = 300;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Read before tracing so the alert layer can be wired in
    let config = Config::from_env()?;

    // ── Tracing: console + optional webhook alerts ──
    let env_filter = EnvFilter::from_default_env().add_directive("info".parse()?);
    let fmt_layer = tracing_subscriber::fmt::layer();
    let registry = tracing_subscriber::registry().with(env_filter).with(fmt_layer);

    match &config.alert_webhook_url {
        Some(url) => registry.with(AlertLayer::new(url.clone())).init(),
        None => registry.init(),
    }

    // ── Database ──
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .with_context(|| format!("cannot open database {}", config.database_url))?;

    db::run_migrations(&pool).await?;

    // ── Pricing rules ──
    let discount_rules = match &config.discount_rules_path {
        Some(path) => {
            let rules = pricing::load_discount_rules(path)?;
            tracing::info!(path = %path.display(), count = rules.len(), "Loaded discount rules");
            rules
        }
        None => pricing::default_discount_rules(),
    };

    // ── Email ──
    let sender: Arc<dyn EmailSender> = if config.email.api_key.is_empty() {
        tracing::warn!("EMAIL_API_KEY not set, booking emails will only be logged");
        Arc::new(LogOnlySender)
    } else {
        Arc::new(ResendSender::new(
            config.email.api_url.clone(),
            config.email.api_key.clone(),
        ))
    };

    let state = Arc::new(AppState {
        db: pool,
        started_at: Instant::now(),
        catalog: catalog::sample_tours(),
        discount_rules,
        notifier: Notifier::new(sender, config.email.mail_settings()),
    });

    // ── Rate limiter + background cleanup of stale entries ──
    let rate_limiter = RateLimiter::new(&config.rate_limits);
    let cleanup_limiter = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(RATE_LIMIT_CLEANUP_SECS));
        loop {
            interval.tick().await;
            cleanup_limiter.cleanup();
        }
    });

    // ── CORS: whitelist WEBAPP_URL when configured, otherwise allow any ──
    let cors = match &config.webapp_url {
        Some(origin) => CorsLayer::new()
            .allow_origin(AllowOrigin::exact(
                origin.parse().context("WEBAPP_URL must be a valid origin")?,
            ))
            .allow_methods(Any)
            .allow_headers(Any),
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    let app = build_router(state, rate_limiter).layer(cors);

    let addr = config.bind_addr();
    tracing::info!("Tours server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
