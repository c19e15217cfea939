use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::models::{Booking, BookingRow, BookingStatus, NewBooking};

const BOOKING_COLUMNS: &str = "id, contact_name, contact_phone, contact_email, participants, \
     tour_type, preferred_date, total_price, status, special_requests, services_json, \
     created_at, updated_at";

pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    // Enable WAL mode for better concurrent access
    sqlx::query("PRAGMA journal_mode=WAL").execute(pool).await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS _migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .execute(pool)
    .await?;

    apply(pool, "001_init", include_str!("../migrations/001_init.sql")).await?;

    tracing::info!("Database migrations up to date");
    Ok(())
}

/// Run `sql` once, recording `name` in `_migrations`.
async fn apply(pool: &SqlitePool, name: &str, sql: &str) -> anyhow::Result<()> {
    let applied: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?")
        .bind(name)
        .fetch_one(pool)
        .await?;
    if applied {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    for statement in sql.split(';') {
        let trimmed = statement.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(&mut *tx).await?;
        }
    }
    sqlx::query("INSERT INTO _migrations (name) VALUES (?)")
        .bind(name)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(migration = name, "Applied migration");
    Ok(())
}

fn now_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

// ── Bookings ──

pub async fn insert_booking(pool: &SqlitePool, new: &NewBooking) -> Result<Booking, AppError> {
    let services_json = serde_json::to_string(&new.services).map_err(anyhow::Error::from)?;
    let now = now_timestamp();

    let id = sqlx::query(
        "INSERT INTO bookings (contact_name, contact_phone, contact_email, participants,
            tour_type, preferred_date, total_price, status, special_requests, services_json,
            created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&new.contact_name)
    .bind(&new.contact_phone)
    .bind(&new.contact_email)
    .bind(new.participants)
    .bind(&new.tour_type)
    .bind(&new.preferred_date)
    .bind(new.total_price)
    .bind(BookingStatus::Pending.as_str())
    .bind(&new.special_requests)
    .bind(&services_json)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?
    .last_insert_rowid();

    find_booking(pool, id)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("booking {id} vanished after insert")))
}

pub async fn find_booking(pool: &SqlitePool, id: i64) -> Result<Option<Booking>, AppError> {
    let row = sqlx::query_as::<_, BookingRow>(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.map(Booking::try_from).transpose().map_err(AppError::from)
}

pub async fn count_bookings(pool: &SqlitePool, status: Option<BookingStatus>) -> Result<i64, AppError> {
    let count: i64 = match status {
        Some(status) => {
            sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE status = ?")
                .bind(status.as_str())
                .fetch_one(pool)
                .await?
        }
        None => {
            sqlx::query_scalar("SELECT COUNT(*) FROM bookings")
                .fetch_one(pool)
                .await?
        }
    };
    Ok(count)
}

/// Newest first; ties on `created_at` fall back to the higher id.
pub async fn list_bookings(
    pool: &SqlitePool,
    status: Option<BookingStatus>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Booking>, AppError> {
    let rows = match status {
        Some(status) => {
            sqlx::query_as::<_, BookingRow>(&format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings WHERE status = ?
                 ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
            ))
            .bind(status.as_str())
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, BookingRow>(&format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings
                 ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
            ))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
    };

    rows.into_iter()
        .map(|row| Booking::try_from(row).map_err(AppError::from))
        .collect()
}

/// Move booking `id` from `from` to `to`. Returns false when the stored status
/// is no longer `from` (or the row is gone), so concurrent operators cannot
/// both win.
pub async fn update_booking_status(
    pool: &SqlitePool,
    id: i64,
    from: BookingStatus,
    to: BookingStatus,
) -> Result<bool, AppError> {
    let result = sqlx::query("UPDATE bookings SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
        .bind(to.as_str())
        .bind(now_timestamp())
        .bind(id)
        .bind(from.as_str())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}
