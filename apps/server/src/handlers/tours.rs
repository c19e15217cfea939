use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

use super::split_list;
use crate::catalog::{self, Difficulty, Range, SortKey, SortOrder, TourCard, TourFilters, TourQuery};
use crate::error::AppError;
use crate::models::{ApiResponse, TourType};
use crate::pricing::TOUR_TYPES;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CatalogParams {
    pub q: Option<String>,
    pub tour_types: Option<String>,
    pub difficulty: Option<String>,
    pub destinations: Option<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub duration_min: Option<u32>,
    pub duration_max: Option<u32>,
    pub min_rating: Option<f64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub limit: Option<usize>,
}

fn parse_all<T: FromStr<Err = String>>(raw: Option<&str>) -> Result<Vec<T>, AppError> {
    split_list(raw)
        .map(|token| token.parse::<T>().map_err(AppError::BadRequest))
        .collect()
}

impl TryFrom<CatalogParams> for TourQuery {
    type Error = AppError;

    fn try_from(p: CatalogParams) -> Result<Self, Self::Error> {
        let sort_order = match p.sort_order.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => raw.parse().map_err(AppError::BadRequest)?,
            None => SortOrder::default(),
        };

        Ok(TourQuery {
            search: p.q,
            filters: TourFilters {
                tour_types: parse_all::<TourType>(p.tour_types.as_deref())?,
                difficulty: parse_all::<Difficulty>(p.difficulty.as_deref())?,
                destinations: split_list(p.destinations.as_deref()).map(String::from).collect(),
                price: Range {
                    min: p.price_min,
                    max: p.price_max,
                },
                duration: Range {
                    min: p.duration_min,
                    max: p.duration_max,
                },
                min_rating: p.min_rating,
            },
            sort_by: p.sort_by.as_deref().map_or(SortKey::Title, SortKey::parse_or_title),
            sort_order,
            limit: p.limit,
        })
    }
}

/// GET /api/tours
pub async fn list_tours(
    State(state): State<Arc<AppState>>,
    params: Result<Query<CatalogParams>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<TourCard>>>, AppError> {
    let Query(params) = params?;
    let query = TourQuery::try_from(params)?;

    let tours = catalog::query_tours(&state.catalog, &query, Utc::now().date_naive())
        .into_iter()
        .cloned()
        .collect();

    Ok(Json(ApiResponse::success(tours)))
}

/// GET /api/tours/{slug}
pub async fn get_tour(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<TourCard>>, AppError> {
    let tour = catalog::find_by_slug(&state.catalog, &slug)
        .cloned()
        .ok_or_else(|| AppError::NotFound("Тур не найден".into()))?;
    Ok(Json(ApiResponse::success(tour)))
}

#[derive(Debug, Serialize)]
pub struct FilterOption {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFilters {
    pub tour_types: Vec<FilterOption>,
    pub difficulty: Vec<FilterOption>,
    pub destinations: Vec<FilterOption>,
    pub sort_options: Vec<FilterOption>,
}

fn option(value: impl Into<String>, label: impl Into<String>) -> FilterOption {
    FilterOption {
        value: value.into(),
        label: label.into(),
    }
}

/// GET /api/tours/filters
pub async fn filters(State(state): State<Arc<AppState>>) -> Json<ApiResponse<CatalogFilters>> {
    let mut destinations: Vec<FilterOption> = Vec::new();
    for tour in &state.catalog {
        if !destinations.iter().any(|d| d.value == tour.destination.id) {
            destinations.push(option(&tour.destination.id, &tour.destination.name));
        }
    }

    Json(ApiResponse::success(CatalogFilters {
        tour_types: TOUR_TYPES.iter().map(|t| option(t.id.code(), t.name)).collect(),
        difficulty: Difficulty::ALL.iter().map(|d| option(d.code(), d.label())).collect(),
        destinations,
        sort_options: SortKey::ALL.iter().map(|k| option(k.code(), k.label())).collect(),
    }))
}
