use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use deskbook_core::domain::announcement::AnnouncementRecord;
use deskbook_core::domain::booking::{Booking, BookingId, BookingRejection, UserId};
use deskbook_core::domain::desk::DeskId;

pub mod announcement;
pub mod booking;
pub mod memory;

pub use announcement::SqlAnnouncementRepository;
pub use booking::SqlBookingRepository;
pub use memory::{InMemoryAnnouncementRepository, InMemoryBookingRepository};

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum CreateBookingError {
    #[error(transparent)]
    Rejected(#[from] BookingRejection),
    #[error(transparent)]
    Store(#[from] RepositoryError),
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn list_booked(&self, date: NaiveDate) -> Result<BTreeSet<DeskId>, RepositoryError>;

    /// Inserts atomically. Unique violations come back as `Rejected`, never as
    /// `Store`, so concurrent writers racing for one desk get a friendly answer.
    async fn try_create(
        &self,
        user_id: &UserId,
        desk_id: &DeskId,
        date: NaiveDate,
    ) -> Result<Booking, CreateBookingError>;

    async fn list_for_user(
        &self,
        user_id: &UserId,
        from_date: NaiveDate,
    ) -> Result<Vec<Booking>, RepositoryError>;

    async fn list_for_date(&self, date: NaiveDate) -> Result<Vec<Booking>, RepositoryError>;

    async fn find_by_id(&self, id: BookingId) -> Result<Option<Booking>, RepositoryError>;

    async fn delete(&self, id: BookingId, user_id: &UserId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait AnnouncementRepository: Send + Sync {
    async fn get_announcement(
        &self,
        date: NaiveDate,
    ) -> Result<Option<AnnouncementRecord>, RepositoryError>;

    async fn upsert_announcement(&self, record: AnnouncementRecord)
        -> Result<(), RepositoryError>;
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|error| RepositoryError::Decode(format!("invalid date `{raw}`: {error}")))
}
