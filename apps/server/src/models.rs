use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::{Validate, ValidationError};

// ── Reference enums ──

/// Trip category. Each one carries a base price per person per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TourType {
    Excursion,
    Active,
    Cultural,
    Combined,
}

impl TourType {
    pub const ALL: [TourType; 4] = [
        TourType::Excursion,
        TourType::Active,
        TourType::Cultural,
        TourType::Combined,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            TourType::Excursion => "EXCURSION",
            TourType::Active => "ACTIVE",
            TourType::Cultural => "CULTURAL",
            TourType::Combined => "COMBINED",
        }
    }

    /// Singular display name, used in customer emails.
    pub fn label(&self) -> &'static str {
        match self {
            TourType::Excursion => "Экскурсионный тур",
            TourType::Active => "Активный отдых",
            TourType::Cultural => "Культурный тур",
            TourType::Combined => "Комбинированный тур",
        }
    }
}

impl fmt::Display for TourType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for TourType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TourType::ALL
            .into_iter()
            .find(|t| t.code() == s)
            .ok_or_else(|| format!("unknown tour type: {s}"))
    }
}

/// Booking lifecycle. Transitions are operator actions, never computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Paid,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Paid => "PAID",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "Ожидает",
            BookingStatus::Confirmed => "Подтверждена",
            BookingStatus::Paid => "Оплачена",
            BookingStatus::Cancelled => "Отменена",
        }
    }

    /// PAID and CANCELLED are terminal.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Paid)
        )
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "PAID" => Ok(BookingStatus::Paid),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status: {other}")),
        }
    }
}

// ── Database models ──

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BookingRow {
    pub id: i64,
    pub contact_name: String,
    pub contact_phone: String,
    pub contact_email: String,
    pub participants: i64,
    pub tour_type: String,
    pub preferred_date: Option<String>,
    pub total_price: f64,
    pub status: String,
    pub special_requests: Option<String>,
    pub services_json: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: i64,
    pub contact_name: String,
    pub contact_phone: String,
    pub contact_email: String,
    pub participants: i64,
    pub tour_type: String,
    pub preferred_date: Option<String>,
    pub total_price: f64,
    pub status: BookingStatus,
    pub special_requests: Option<String>,
    pub services: Vec<BookedService>,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<BookingRow> for Booking {
    type Error = anyhow::Error;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<BookingStatus>()
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("booking {}", row.id))?;
        let services: Vec<BookedService> = serde_json::from_str(&row.services_json)
            .with_context(|| format!("booking {}: bad services_json", row.id))?;

        Ok(Booking {
            id: row.id,
            contact_name: row.contact_name,
            contact_phone: row.contact_phone,
            contact_email: row.contact_email,
            participants: row.participants,
            tour_type: row.tour_type,
            preferred_date: row.preferred_date,
            total_price: row.total_price,
            status,
            special_requests: row.special_requests,
            services,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Insert payload for the bookings table. Status always starts at PENDING.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub contact_name: String,
    pub contact_phone: String,
    pub contact_email: String,
    pub participants: i64,
    pub tour_type: String,
    pub preferred_date: Option<String>,
    pub total_price: f64,
    pub special_requests: Option<String>,
    pub services: Vec<BookedService>,
}

// ── API request/response types ──

/// Add-on attached to a booking submission. Shape-checked, never priced server-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct BookedService {
    #[validate(length(min = 1, message = "Укажите услугу"))]
    pub service_id: String,
    #[validate(range(min = 1, max = 1000, message = "Количество должно быть от 1 до 1000"))]
    pub quantity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, message = "Цена не может быть отрицательной"))]
    pub custom_price: Option<f64>,
}

/// Missing text fields default to "" so they surface as validation errors
/// alongside every other failing field instead of a single parse error.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateBookingRequest {
    #[validate(length(min = 2, message = "Имя должно содержать минимум 2 символа"))]
    pub first_name: String,
    #[validate(length(min = 2, message = "Фамилия должна содержать минимум 2 символа"))]
    pub last_name: String,
    #[validate(email(message = "Неверный формат email"))]
    pub email: String,
    #[validate(length(min = 10, message = "Неверный формат телефона"))]
    pub phone: String,
    #[validate(
        required(message = "Укажите количество участников"),
        range(min = 1, max = 20, message = "Количество участников должно быть от 1 до 20")
    )]
    pub participants: Option<i64>,
    pub preferred_date: Option<String>,
    #[validate(length(min = 1, message = "Выберите тип тура"))]
    pub tour_type: String,
    pub special_requests: Option<String>,
    #[validate(
        required(message = "Укажите стоимость"),
        range(min = 0.0, message = "Стоимость не может быть отрицательной")
    )]
    pub total_price: Option<f64>,
    #[validate(nested)]
    pub services: Vec<BookedService>,
}

impl CreateBookingRequest {
    pub fn contact_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Only meaningful after `validate()` succeeded.
    pub fn to_new_booking(&self) -> NewBooking {
        NewBooking {
            contact_name: self.contact_name(),
            contact_phone: self.phone.clone(),
            contact_email: self.email.clone(),
            participants: self.participants.unwrap_or_default(),
            tour_type: self.tour_type.clone(),
            preferred_date: self.preferred_date.clone(),
            total_price: self.total_price.unwrap_or_default(),
            special_requests: self.special_requests.clone(),
            services: self.services.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct PriceQuoteRequest {
    #[validate(custom(function = "validate_tour_type"))]
    pub tour_type: String,
    #[validate(
        required(message = "Укажите количество участников"),
        range(min = 1, max = 20, message = "Количество участников должно быть от 1 до 20")
    )]
    pub participants: Option<i64>,
    #[validate(
        required(message = "Укажите длительность тура"),
        range(min = 1, max = 30, message = "Длительность тура должна быть от 1 до 30 дней")
    )]
    pub duration: Option<i64>,
    pub start_date: Option<String>,
    #[validate(nested)]
    pub services: Vec<QuoteService>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct QuoteService {
    #[validate(length(min = 1, message = "Укажите услугу"))]
    pub service_id: String,
    #[validate(range(min = 1, max = 1000, message = "Количество должно быть от 1 до 1000"))]
    pub quantity: i64,
    pub variant_id: Option<String>,
    #[validate(range(min = 0.0, message = "Цена не может быть отрицательной"))]
    pub custom_price: Option<f64>,
}

fn validate_tour_type(value: &str) -> Result<(), ValidationError> {
    if value.parse::<TourType>().is_ok() {
        return Ok(());
    }
    let mut err = ValidationError::new("tour_type");
    err.message = Some("Выберите тип тура: EXCURSION, ACTIVE, CULTURAL или COMBINED".into());
    Err(err)
}

#[derive(Debug, Deserialize)]
pub struct BookingsQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: BookingStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: i64) -> Self {
        let per_page = i64::from(limit.max(1));
        Self {
            page,
            limit,
            total,
            total_pages: (total + per_page - 1) / per_page,
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.limit)
    }
}

/// Envelope shared by every endpoint: `{success, data?, message?, errors?, pagination?}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            pagination: None,
        }
    }

    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    pub fn paginated(data: T, pagination: Pagination) -> Self {
        Self {
            pagination: Some(pagination),
            ..Self::success(data)
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(msg.into()),
            errors: None,
            pagination: None,
        }
    }

    pub fn invalid(msg: impl Into<String>, errors: Vec<FieldError>) -> Self {
        Self {
            errors: Some(errors),
            ..Self::error(msg)
        }
    }
}
