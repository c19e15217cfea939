//! JSON body extractor that reports every bad field in one response.
//!
//! A value of the wrong JSON type does not abort the whole body. Each
//! top-level field is checked on its own, mistyped ones are dropped and
//! reported, and the remainder goes through `validator`. Target types must
//! tolerate missing fields (`#[serde(default)]`).

use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use validator::Validate;

use crate::error::{field_errors, AppError};
use crate::models::FieldError;

const WRONG_TYPE: &str = "Неверный тип значения";

pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state).await?;
        let (body, mistyped) = decode_lenient::<T>(value)?;

        let mut errors = mistyped.clone();
        if let Err(invalid) = body.validate() {
            errors.extend(
                field_errors(&invalid)
                    .into_iter()
                    .filter(|e| !mistyped.iter().any(|m| covers(&m.field, &e.field))),
            );
        }
        if !errors.is_empty() {
            errors.sort_by(|a, b| a.field.cmp(&b.field));
            return Err(AppError::Validation(errors));
        }
        Ok(ValidatedJson(body))
    }
}

/// Deserialize `value` into `T`, dropping fields whose JSON type does not
/// fit. `null` counts as absent. Returns the body built from what remained
/// plus one error per dropped field (or per bad array element).
pub fn decode_lenient<T: DeserializeOwned>(value: Value) -> Result<(T, Vec<FieldError>), AppError> {
    let Value::Object(mut fields) = value else {
        return Err(AppError::BadRequest("Ожидался JSON-объект".into()));
    };
    fields.retain(|_, v| !v.is_null());

    let mut errors = Vec::new();
    let keys: Vec<String> = fields.keys().cloned().collect();
    for key in keys {
        let Some(value) = fields.get(&key).cloned() else {
            continue;
        };
        if accepts::<T>(&key, value.clone()) {
            continue;
        }

        let bad_items: Vec<usize> = match &value {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .filter(|(_, item)| !accepts::<T>(&key, Value::Array(vec![(*item).clone()])))
                .map(|(i, _)| i)
                .collect(),
            _ => Vec::new(),
        };
        if bad_items.is_empty() {
            errors.push(wrong_type(key.clone()));
        } else {
            errors.extend(bad_items.into_iter().map(|i| wrong_type(format!("{key}[{i}]"))));
        }
        fields.remove(&key);
    }

    let body = serde_json::from_value(Value::Object(fields)).map_err(|e| {
        tracing::debug!(error = %e, "request body rejected after dropping mistyped fields");
        AppError::BadRequest("Неверный формат запроса".into())
    })?;
    Ok((body, errors))
}

fn accepts<T: DeserializeOwned>(key: &str, value: Value) -> bool {
    let mut single = Map::new();
    single.insert(key.to_string(), value);
    serde_json::from_value::<T>(Value::Object(single)).is_ok()
}

fn wrong_type(field: String) -> FieldError {
    FieldError {
        field,
        message: WRONG_TYPE.into(),
    }
}

/// A type error on `services[1]` already explains anything reported on
/// `services` or below it.
fn covers(mistyped: &str, field: &str) -> bool {
    let root = mistyped.split('[').next().unwrap_or(mistyped);
    field == mistyped
        || field == root
        || field.starts_with(&format!("{root}["))
        || field.starts_with(&format!("{root}."))
}
