use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::models::{ApiResponse, FieldError};

/// Message returned for every failure whose cause must stay server-side.
const GENERIC_FAILURE: &str = "Произошла ошибка. Попробуйте позже.";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed on {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("too many requests, retry after {0}s")]
    TooManyRequests(u64),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(field_errors(&errors))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<()>::invalid("Ошибка валидации данных", errors)),
            )
                .into_response(),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(ApiResponse::<()>::error(msg))).into_response()
            }
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, Json(ApiResponse::<()>::error(msg))).into_response()
            }
            AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, Json(ApiResponse::<()>::error(msg))).into_response()
            }
            AppError::TooManyRequests(retry_after) => (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after.to_string())],
                Json(ApiResponse::<()>::error(format!(
                    "Слишком много запросов. Повторите через {} сек.",
                    retry_after
                ))),
            )
                .into_response(),
            AppError::Database(e) => {
                tracing::error!(error = %e, "database failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::<()>::error(GENERIC_FAILURE)),
                )
                    .into_response()
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::<()>::error(GENERIC_FAILURE)),
                )
                    .into_response()
            }
        }
    }
}

// ── Validation error flattening ──

/// Flatten nested validator output into `{field, message}` pairs with
/// camelCase paths such as `services[1].customPrice`, sorted by path.
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut out = Vec::new();
    collect(errors, "", &mut out);
    out.sort_by(|a, b| a.field.cmp(&b.field));
    out
}

fn collect(errors: &ValidationErrors, prefix: &str, out: &mut Vec<FieldError>) {
    for (name, kind) in errors.errors() {
        let path = format!("{}{}", prefix, camel_case(&name.to_string()));
        match kind {
            ValidationErrorsKind::Field(list) => {
                for err in list {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("invalid value ({})", err.code));
                    out.push(FieldError {
                        field: path.clone(),
                        message,
                    });
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                collect(inner, &format!("{path}."), out);
            }
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect(inner, &format!("{path}[{index}]."), out);
                }
            }
        }
    }
}

fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateBookingRequest, PriceQuoteRequest, QuoteService};
    use validator::Validate;

    #[test]
    fn test_camel_case() {
        assert_eq!(camel_case("first_name"), "firstName");
        assert_eq!(camel_case("participants"), "participants");
        assert_eq!(camel_case("custom_price"), "customPrice");
    }

    #[test]
    fn test_field_errors_are_camel_cased_and_sorted() {
        let req = CreateBookingRequest {
            first_name: "Иван".into(),
            last_name: "Петров".into(),
            email: "bad".into(),
            phone: "+79001234567".into(),
            participants: Some(25),
            tour_type: "ACTIVE".into(),
            total_price: Some(1000.0),
            ..Default::default()
        };
        let errors = field_errors(&req.validate().unwrap_err());
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["email", "participants"]);
        assert!(errors.iter().all(|e| !e.message.is_empty()));
    }

    #[test]
    fn test_nested_service_errors_carry_index() {
        let req = PriceQuoteRequest {
            tour_type: "ACTIVE".into(),
            participants: Some(2),
            duration: Some(2),
            services: vec![
                QuoteService {
                    service_id: "rafting".into(),
                    quantity: 1,
                    ..Default::default()
                },
                QuoteService {
                    service_id: "lunch".into(),
                    quantity: 0,
                    custom_price: Some(-5.0),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let errors = field_errors(&req.validate().unwrap_err());
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["services[1].customPrice", "services[1].quantity"]);
    }

    #[test]
    fn test_internal_error_hides_cause() {
        let response = AppError::Internal(anyhow::anyhow!("disk on fire")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_database_error_body_is_generic() {
        let response = AppError::Database(sqlx::Error::PoolClosed).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, serde_json::json!({"success": false, "message": GENERIC_FAILURE}));
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let response = AppError::TooManyRequests(42).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }
}
