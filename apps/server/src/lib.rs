pub mod alert_layer;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod notify;
pub mod pricing;
pub mod rate_limit;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use catalog::TourCard;
use notify::Notifier;
use pricing::DiscountRule;
use rate_limit::{rate_limit_admin, rate_limit_booking, rate_limit_public, rate_limit_quote, RateLimiter};

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub started_at: Instant,
    pub catalog: Vec<TourCard>,
    pub discount_rules: Vec<DiscountRule>,
    pub notifier: Notifier,
}

/// Build the `/api` router. Each route group carries its own rate limit tier.
pub fn build_router(state: Arc<AppState>, limiter: RateLimiter) -> Router {
    // 1. No-limit: health checks
    let no_limit_routes = Router::new().route("/api/health", get(handlers::health::health));

    // 2. Public: catalog and calculator reference data
    let public_routes = Router::new()
        .route("/api/tours", get(handlers::tours::list_tours))
        .route("/api/tours/filters", get(handlers::tours::filters))
        .route("/api/tours/{slug}", get(handlers::tours::get_tour))
        .route("/api/price-quote/options", get(handlers::quote::quote_options))
        .layer(from_fn_with_state(limiter.clone(), rate_limit_public));

    // 3. Quote calculation
    let quote_routes = Router::new()
        .route("/api/price-quote", post(handlers::quote::price_quote))
        .layer(from_fn_with_state(limiter.clone(), rate_limit_quote));

    // 4. Booking creation: strictest limit
    let booking_routes = Router::new()
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .layer(from_fn_with_state(limiter.clone(), rate_limit_booking));

    // 5. Admin: listing and status changes
    let admin_routes = Router::new()
        .route("/api/bookings", get(handlers::admin::list_bookings))
        .route(
            "/api/bookings/{id}",
            get(handlers::admin::get_booking).patch(handlers::admin::update_status),
        )
        .layer(from_fn_with_state(limiter, rate_limit_admin));

    Router::new()
        .merge(no_limit_routes)
        .merge(public_routes)
        .merge(quote_routes)
        .merge(booking_routes)
        .merge(admin_routes)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
