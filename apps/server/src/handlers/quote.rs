use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::error::AppError;
use crate::extract::ValidatedJson;
use crate::models::{ApiResponse, PriceQuoteRequest};
use crate::pricing::{
    self, tables::TourTypeInfo, DiscountRule, PriceBreakdown, PriceRequest, ServiceCategory,
    ServiceOption, DEFAULT_SERVICES, TOUR_TYPES,
};
use crate::AppState;

/// POST /api/price-quote
pub async fn price_quote(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<PriceQuoteRequest>,
) -> Result<Json<ApiResponse<PriceBreakdown>>, AppError> {
    let request = PriceRequest::try_from(body)?;
    let quote = pricing::compute_price(&request, &state.discount_rules, Utc::now());

    tracing::debug!(
        tour_type = %request.tour_type,
        participants = request.participants,
        duration = request.duration,
        total = quote.total,
        "price quote computed"
    );

    Ok(Json(ApiResponse::success(quote)))
}

#[derive(Debug, Serialize)]
pub struct CategoryInfo {
    pub id: &'static str,
    pub name: &'static str,
}

/// Reference data the calculator UI is built from.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteOptions {
    pub tour_types: &'static [TourTypeInfo],
    pub services: &'static [ServiceOption],
    pub categories: Vec<CategoryInfo>,
    pub discount_rules: Vec<DiscountRule>,
    pub currency: &'static str,
}

/// GET /api/price-quote/options
pub async fn quote_options(State(state): State<Arc<AppState>>) -> Json<ApiResponse<QuoteOptions>> {
    let options = QuoteOptions {
        tour_types: TOUR_TYPES,
        services: DEFAULT_SERVICES,
        categories: ServiceCategory::ALL
            .iter()
            .map(|c| CategoryInfo {
                id: c.code(),
                name: c.label(),
            })
            .collect(),
        discount_rules: state.discount_rules.clone(),
        currency: pricing::CURRENCY,
    };
    Json(ApiResponse::success(options))
}
