use std::collections::BTreeSet;

use chrono::{NaiveDate, Utc};
use sqlx::Row;

use deskbook_core::domain::booking::{Booking, BookingId, BookingRejection, UserId};
use deskbook_core::domain::desk::DeskId;

use super::{
    format_date, parse_date, BookingRepository, CreateBookingError, RepositoryError,
};
use crate::DbPool;

pub struct SqlBookingRepository {
    pool: DbPool,
}

impl SqlBookingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_booking(row: &sqlx::sqlite::SqliteRow) -> Result<Booking, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user_id: String =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let desk_id: String =
        row.try_get("desk_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let booking_date: String =
        row.try_get("booking_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Booking {
        id: BookingId(id),
        user_id: UserId(user_id),
        desk_id: DeskId(desk_id),
        booking_date: parse_date(&booking_date)?,
    })
}

/// SQLite names the violated columns in the message, e.g.
/// `UNIQUE constraint failed: bookings.desk_id, bookings.booking_date`.
fn classify_unique_violation(message: &str) -> BookingRejection {
    if message.contains("desk_id") {
        BookingRejection::DeskTaken
    } else {
        BookingRejection::AlreadyBooked
    }
}

#[async_trait::async_trait]
impl BookingRepository for SqlBookingRepository {
    async fn list_booked(&self, date: NaiveDate) -> Result<BTreeSet<DeskId>, RepositoryError> {
        let desks: Vec<String> =
            sqlx::query_scalar("SELECT desk_id FROM bookings WHERE booking_date = ?")
                .bind(format_date(date))
                .fetch_all(&self.pool)
                .await?;

        Ok(desks.into_iter().map(DeskId).collect())
    }

    async fn try_create(
        &self,
        user_id: &UserId,
        desk_id: &DeskId,
        date: NaiveDate,
    ) -> Result<Booking, CreateBookingError> {
        let result = sqlx::query(
            "INSERT INTO bookings (user_id, desk_id, booking_date, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&user_id.0)
        .bind(&desk_id.0)
        .bind(format_date(date))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(Booking {
                id: BookingId(done.last_insert_rowid()),
                user_id: user_id.clone(),
                desk_id: desk_id.clone(),
                booking_date: date,
            }),
            Err(sqlx::Error::Database(error)) if error.is_unique_violation() => {
                Err(CreateBookingError::Rejected(classify_unique_violation(error.message())))
            }
            Err(error) => Err(CreateBookingError::Store(RepositoryError::Database(error))),
        }
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        from_date: NaiveDate,
    ) -> Result<Vec<Booking>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, user_id, desk_id, booking_date
             FROM bookings
             WHERE user_id = ? AND booking_date >= ?
             ORDER BY booking_date ASC",
        )
        .bind(&user_id.0)
        .bind(format_date(from_date))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_booking).collect::<Result<Vec<_>, _>>()
    }

    async fn list_for_date(&self, date: NaiveDate) -> Result<Vec<Booking>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, user_id, desk_id, booking_date
             FROM bookings
             WHERE booking_date = ?
             ORDER BY id ASC",
        )
        .bind(format_date(date))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_booking).collect::<Result<Vec<_>, _>>()
    }

    async fn find_by_id(&self, id: BookingId) -> Result<Option<Booking>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, user_id, desk_id, booking_date FROM bookings WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_booking(r)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, id: BookingId, user_id: &UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = ? AND user_id = ?")
            .bind(id.0)
            .bind(&user_id.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
