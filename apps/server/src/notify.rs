//! Booking notification emails.
//!
//! Dispatch runs on its own task after the booking is stored. Each email is
//! attempted once; failures are logged and reported, never retried.

use askama::Template;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use url::Url;

use crate::models::{Booking, TourType};

// ── Transport ──

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("email API rejected message with {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("template error: {0}")]
    Template(#[from] askama::Error),
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

/// Sends through the Resend HTTP API.
pub struct ResendSender {
    http: reqwest::Client,
    api_url: Url,
    api_key: String,
}

#[derive(Serialize)]
struct ResendPayload<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

impl ResendSender {
    pub fn new(api_url: Url, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url,
            api_key,
        }
    }
}

#[async_trait]
impl EmailSender for ResendSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let payload = ResendPayload {
            from: &message.from,
            to: [&message.to],
            subject: &message.subject,
            html: &message.html,
            text: &message.text,
        };
        let response = self
            .http
            .post(self.api_url.clone())
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Used when no API key is configured: the message is logged and dropped.
pub struct LogOnlySender;

#[async_trait]
impl EmailSender for LogOnlySender {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "email delivery disabled, message not sent"
        );
        Ok(())
    }
}

// ── Templates ──

#[derive(Debug, Clone)]
pub struct MailSettings {
    pub customer_from: String,
    pub system_from: String,
    pub admin_email: String,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            customer_from: "Dagestan Tours <booking@dagestan-tours.ru>".into(),
            system_from: "Система бронирования <system@dagestan-tours.ru>".into(),
            admin_email: "admin@dagestan-tours.ru".into(),
        }
    }
}

/// Everything the two templates need, taken from a stored booking.
#[derive(Debug, Clone)]
pub struct BookingEmail {
    pub booking_id: i64,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub tour_type: String,
    pub participants: i64,
    pub preferred_date: Option<String>,
    pub total_price: f64,
    pub special_requests: Option<String>,
}

impl From<&Booking> for BookingEmail {
    fn from(b: &Booking) -> Self {
        Self {
            booking_id: b.id,
            customer_name: b.contact_name.clone(),
            customer_email: b.contact_email.clone(),
            customer_phone: b.contact_phone.clone(),
            tour_type: b.tour_type.clone(),
            participants: b.participants,
            preferred_date: b.preferred_date.clone(),
            total_price: b.total_price,
            special_requests: b.special_requests.clone(),
        }
    }
}

impl BookingEmail {
    fn tour_label(&self) -> String {
        self.tour_type
            .parse::<TourType>()
            .map(|t| t.label().to_string())
            .unwrap_or_else(|_| self.tour_type.clone())
    }

    fn non_empty(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// `1234567.0` → `1 234 567 ₽` (non-breaking spaces, as ru-RU formats it).
pub fn format_rub(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3 * 2);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push('\u{a0}');
        }
        grouped.push(c);
    }
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    match cents % 100 {
        0 => format!("{sign}{grouped}\u{a0}₽"),
        frac => format!("{sign}{grouped},{frac:02}\u{a0}₽"),
    }
}

/// One label/value line of the details table.
struct DetailRow<'a> {
    label: &'static str,
    value: &'a str,
}

#[derive(Template)]
#[template(path = "emails/customer_confirmation.html")]
struct CustomerConfirmationHtml<'a> {
    customer_name: &'a str,
    rows: Vec<DetailRow<'a>>,
    special_requests: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "emails/operator_alert.html")]
struct OperatorAlertHtml<'a> {
    booking_id: i64,
    rows: Vec<DetailRow<'a>>,
}

pub fn customer_confirmation(data: &BookingEmail, settings: &MailSettings) -> Result<EmailMessage, EmailError> {
    let tour = data.tour_label();
    let price = format_rub(data.total_price);
    let participants = data.participants.to_string();
    let date = BookingEmail::non_empty(&data.preferred_date);
    let requests = BookingEmail::non_empty(&data.special_requests);

    let mut rows = vec![
        DetailRow { label: "Тип тура:", value: &tour },
        DetailRow { label: "Количество участников:", value: &participants },
    ];
    if let Some(date) = date {
        rows.push(DetailRow { label: "Предпочитаемая дата:", value: date });
    }
    rows.push(DetailRow { label: "Общая стоимость:", value: &price });

    let html = CustomerConfirmationHtml {
        customer_name: &data.customer_name,
        rows,
        special_requests: requests,
    }
    .render()?;

    let mut text = format!(
        "Туры в Дагестан - Подтверждение заявки\n\n\
         Здравствуйте, {}!\n\n\
         Ваша заявка на тур принята в обработку.\n\n\
         Детали заявки:\n\
         Тип тура: {}\n\
         Количество участников: {}\n",
        data.customer_name, tour, data.participants
    );
    if let Some(date) = date {
        text.push_str(&format!("Предпочитаемая дата: {date}\n"));
    }
    text.push_str(&format!(
        "Общая стоимость: {price}\n\nНаши специалисты свяжутся с вами в течение 30 минут.\n"
    ));

    Ok(EmailMessage {
        from: settings.customer_from.clone(),
        to: data.customer_email.clone(),
        subject: format!("Подтверждение заявки на тур в Дагестан №{}", data.booking_id),
        html,
        text,
    })
}

pub fn operator_alert(data: &BookingEmail, settings: &MailSettings) -> Result<EmailMessage, EmailError> {
    let price = format_rub(data.total_price);
    let participants = data.participants.to_string();
    let date = BookingEmail::non_empty(&data.preferred_date).unwrap_or("не указана");
    let requests = BookingEmail::non_empty(&data.special_requests);

    let mut rows = vec![
        DetailRow { label: "Клиент:", value: &data.customer_name },
        DetailRow { label: "Email:", value: &data.customer_email },
        DetailRow { label: "Телефон:", value: &data.customer_phone },
        DetailRow { label: "Тип тура:", value: &data.tour_type },
        DetailRow { label: "Участники:", value: &participants },
        DetailRow { label: "Дата:", value: date },
        DetailRow { label: "Стоимость:", value: &price },
    ];
    if let Some(requests) = requests {
        rows.push(DetailRow { label: "Пожелания:", value: requests });
    }
    let html = OperatorAlertHtml {
        booking_id: data.booking_id,
        rows,
    }
    .render()?;

    let mut text = format!(
        "Новая заявка на бронирование №{}\n\n\
         Клиент: {}\n\
         Email: {}\n\
         Телефон: {}\n\
         Тип тура: {}\n\
         Участники: {}\n\
         Дата: {}\n\
         Стоимость: {}\n",
        data.booking_id,
        data.customer_name,
        data.customer_email,
        data.customer_phone,
        data.tour_type,
        data.participants,
        date,
        price
    );
    if let Some(requests) = requests {
        text.push_str(&format!("Пожелания: {requests}\n"));
    }

    Ok(EmailMessage {
        from: settings.system_from.clone(),
        to: settings.admin_email.clone(),
        subject: format!("Новая заявка на бронирование №{}", data.booking_id),
        html,
        text,
    })
}

// ── Dispatch ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Failed(String),
}

impl Delivery {
    pub fn is_sent(&self) -> bool {
        matches!(self, Delivery::Sent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationReport {
    pub booking_id: i64,
    pub customer: Delivery,
    pub operator: Delivery,
}

#[derive(Clone)]
pub struct Notifier {
    sender: Arc<dyn EmailSender>,
    settings: MailSettings,
}

impl Notifier {
    pub fn new(sender: Arc<dyn EmailSender>, settings: MailSettings) -> Self {
        Self { sender, settings }
    }

    /// Spawn delivery of both booking emails. The caller may drop the handle;
    /// the task runs to completion either way.
    pub fn booking_created(&self, data: BookingEmail) -> JoinHandle<NotificationReport> {
        let sender = Arc::clone(&self.sender);
        let customer = customer_confirmation(&data, &self.settings);
        let operator = operator_alert(&data, &self.settings);
        let booking_id = data.booking_id;

        tokio::spawn(async move {
            let (customer, operator) = tokio::join!(
                deliver(sender.as_ref(), booking_id, "customer", customer),
                deliver(sender.as_ref(), booking_id, "operator", operator),
            );
            NotificationReport {
                booking_id,
                customer,
                operator,
            }
        })
    }
}

async fn deliver(
    sender: &dyn EmailSender,
    booking_id: i64,
    kind: &str,
    message: Result<EmailMessage, EmailError>,
) -> Delivery {
    let message = match message {
        Ok(message) => message,
        Err(e) => {
            tracing::error!(booking_id, kind, error = %e, "booking email could not be built");
            return Delivery::Failed(e.to_string());
        }
    };
    match sender.send(&message).await {
        Ok(()) => {
            tracing::info!(booking_id, kind, to = %message.to, "booking email sent");
            Delivery::Sent
        }
        Err(e) => {
            tracing::error!(booking_id, kind, to = %message.to, error = %e, "booking email failed");
            Delivery::Failed(e.to_string())
        }
    }
}
