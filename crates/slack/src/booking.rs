use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use deskbook_core::availability::{available_desks, precheck_booking};
use deskbook_core::domain::booking::{Booking, BookingId, UserId};
use deskbook_core::domain::desk::{DeskId, DeskSet};
use deskbook_db::repositories::{BookingRepository, CreateBookingError, RepositoryError};

/// Store-backed availability engine.
///
/// Local pre-checks give friendly rejections in the common case; the store's
/// unique constraints decide races between concurrent submissions.
#[derive(Clone)]
pub struct BookingService {
    desks: DeskSet,
    bookings: Arc<dyn BookingRepository>,
}

impl BookingService {
    pub fn new(desks: DeskSet, bookings: Arc<dyn BookingRepository>) -> Self {
        Self { desks, bookings }
    }

    pub fn desks(&self) -> &DeskSet {
        &self.desks
    }

    pub async fn available_desks(&self, date: NaiveDate) -> Result<Vec<DeskId>, RepositoryError> {
        let booked = self.bookings.list_booked(date).await?;
        Ok(available_desks(&self.desks, &booked))
    }

    pub async fn validate_and_book(
        &self,
        user_id: &UserId,
        desk_id: &DeskId,
        date: NaiveDate,
    ) -> Result<Booking, CreateBookingError> {
        let user_bookings = self.bookings.list_for_user(user_id, date).await?;
        if let Err(rejection) = precheck_booking(&self.desks, desk_id, date, &user_bookings) {
            info!(
                event_name = "booking.rejected",
                stage = "precheck",
                user_id = %user_id,
                desk_id = %desk_id,
                booking_date = %date,
                reason = %rejection,
                "booking rejected before insert"
            );
            return Err(rejection.into());
        }

        match self.bookings.try_create(user_id, desk_id, date).await {
            Ok(booking) => {
                info!(
                    event_name = "booking.created",
                    booking_id = %booking.id,
                    user_id = %user_id,
                    desk_id = %desk_id,
                    booking_date = %date,
                    "booking created"
                );
                Ok(booking)
            }
            Err(CreateBookingError::Rejected(rejection)) => {
                info!(
                    event_name = "booking.rejected",
                    stage = "store",
                    user_id = %user_id,
                    desk_id = %desk_id,
                    booking_date = %date,
                    reason = %rejection,
                    "booking rejected by store constraint"
                );
                Err(CreateBookingError::Rejected(rejection))
            }
            Err(CreateBookingError::Store(error)) => {
                warn!(
                    event_name = "booking.store_error",
                    user_id = %user_id,
                    booking_date = %date,
                    error = %error,
                    "booking insert failed"
                );
                Err(CreateBookingError::Store(error))
            }
        }
    }

    /// Removes the booking if `user_id` owns it and returns what was removed.
    pub async fn cancel(
        &self,
        user_id: &UserId,
        booking_id: BookingId,
    ) -> Result<Option<Booking>, RepositoryError> {
        let Some(booking) = self.bookings.find_by_id(booking_id).await? else {
            return Ok(None);
        };
        if &booking.user_id != user_id {
            warn!(
                event_name = "booking.cancel_denied",
                booking_id = %booking_id,
                user_id = %user_id,
                "user tried to cancel a booking they do not own"
            );
            return Ok(None);
        }

        let removed = self.bookings.delete(booking_id, user_id).await?;
        if removed {
            info!(
                event_name = "booking.cancelled",
                booking_id = %booking_id,
                user_id = %user_id,
                booking_date = %booking.booking_date,
                "booking cancelled"
            );
        }
        Ok(removed.then_some(booking))
    }

    pub async fn upcoming_for_user(
        &self,
        user_id: &UserId,
        today: NaiveDate,
    ) -> Result<Vec<Booking>, RepositoryError> {
        self.bookings.list_for_user(user_id, today).await
    }

    pub async fn roster(&self, date: NaiveDate) -> Result<Vec<Booking>, RepositoryError> {
        self.bookings.list_for_date(date).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use chrono::NaiveDate;

    use deskbook_core::domain::booking::{BookingRejection, UserId};
    use deskbook_core::domain::desk::{DeskId, DeskSet};
    use deskbook_db::repositories::{
        BookingRepository, CreateBookingError, InMemoryBookingRepository, SqlBookingRepository,
    };
    use deskbook_db::{connect_with_settings, migrations};

    use super::BookingService;

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("valid date")
    }

    fn user(raw: &str) -> UserId {
        UserId(raw.to_owned())
    }

    fn in_memory_service() -> (BookingService, Arc<InMemoryBookingRepository>) {
        let repo = Arc::new(InMemoryBookingRepository::default());
        (BookingService::new(DeskSet::numbered(30), repo.clone()), repo)
    }

    #[tokio::test]
    async fn available_and_booked_partition_the_desk_set() {
        let (service, repo) = in_memory_service();
        let day = date("2024-06-10");
        for (index, desk) in ["Desk 2", "Desk 11", "Desk 30"].iter().enumerate() {
            service
                .validate_and_book(&user(&format!("U{index}")), &DeskId::new(*desk), day)
                .await
                .expect("book");
        }

        let available: BTreeSet<DeskId> =
            service.available_desks(day).await.expect("available").into_iter().collect();
        let booked = repo.list_booked(day).await.expect("booked");

        assert!(available.is_disjoint(&booked));
        let union: BTreeSet<DeskId> = available.union(&booked).cloned().collect();
        let all: BTreeSet<DeskId> = service.desks().iter().cloned().collect();
        assert_eq!(union, all);
    }

    #[tokio::test]
    async fn concurrent_bookings_for_one_desk_admit_exactly_one() {
        let (service, _repo) = in_memory_service();
        let desk = DeskId::new("Desk 3");
        let day = date("2024-06-10");
        let (alice, bob) = (user("UA"), user("UB"));

        let (first, second) = tokio::join!(
            service.validate_and_book(&alice, &desk, day),
            service.validate_and_book(&bob, &desk, day),
        );

        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
        assert!(outcomes.iter().any(|outcome| matches!(
            outcome,
            Err(CreateBookingError::Rejected(BookingRejection::DeskTaken))
        )));
    }

    #[tokio::test]
    async fn concurrent_bookings_on_sqlite_admit_exactly_one() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let service = BookingService::new(
            DeskSet::numbered(30),
            Arc::new(SqlBookingRepository::new(pool.clone())),
        );
        let desk = DeskId::new("Desk 3");
        let day = date("2024-06-10");
        let (alice, bob) = (user("UA"), user("UB"));

        let (first, second) = tokio::join!(
            service.validate_and_book(&alice, &desk, day),
            service.validate_and_book(&bob, &desk, day),
        );

        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
        assert!(outcomes.iter().any(|outcome| matches!(
            outcome,
            Err(CreateBookingError::Rejected(BookingRejection::DeskTaken))
        )));

        pool.close().await;
    }

    #[tokio::test]
    async fn second_booking_same_day_is_already_booked_even_with_free_desks() {
        let (service, _repo) = in_memory_service();
        let day = date("2024-06-10");
        service.validate_and_book(&user("U1"), &DeskId::new("Desk 3"), day).await.expect("book");

        for desk in ["Desk 4", "Desk 29"] {
            let result = service.validate_and_book(&user("U1"), &DeskId::new(desk), day).await;
            assert!(matches!(
                result,
                Err(CreateBookingError::Rejected(BookingRejection::AlreadyBooked))
            ));
        }

        service
            .validate_and_book(&user("U1"), &DeskId::new("Desk 4"), date("2024-06-11"))
            .await
            .expect("other day is fine");
    }

    #[tokio::test]
    async fn unknown_desk_is_rejected_before_the_store() {
        let (service, repo) = in_memory_service();
        let result = service
            .validate_and_book(&user("U1"), &DeskId::new("Desk 31"), date("2024-06-10"))
            .await;

        assert!(matches!(result, Err(CreateBookingError::Rejected(BookingRejection::UnknownDesk))));
        assert!(repo.list_for_date(date("2024-06-10")).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn store_outage_surfaces_as_store_error() {
        let (service, repo) = in_memory_service();
        repo.set_unavailable(true);

        let result = service
            .validate_and_book(&user("U1"), &DeskId::new("Desk 1"), date("2024-06-10"))
            .await;
        assert!(matches!(result, Err(CreateBookingError::Store(_))));
        assert!(service.available_desks(date("2024-06-10")).await.is_err());
    }

    #[tokio::test]
    async fn book_reject_cancel_rebook_end_to_end() {
        let (service, repo) = in_memory_service();
        let day = date("2024-06-10");
        let desk3 = DeskId::new("Desk 3");

        let booking = service.validate_and_book(&user("U1"), &desk3, day).await.expect("book");
        assert_eq!(repo.list_for_date(day).await.expect("list").len(), 1);
        assert!(!service.available_desks(day).await.expect("available").contains(&desk3));

        let again = service.validate_and_book(&user("U1"), &DeskId::new("Desk 4"), day).await;
        assert!(matches!(
            again,
            Err(CreateBookingError::Rejected(BookingRejection::AlreadyBooked))
        ));

        let cancelled = service.cancel(&user("U1"), booking.id).await.expect("cancel");
        assert_eq!(cancelled, Some(booking));
        assert!(service.available_desks(day).await.expect("available").contains(&desk3));
    }

    #[tokio::test]
    async fn cancel_ignores_foreign_and_missing_bookings() {
        let (service, repo) = in_memory_service();
        let day = date("2024-06-10");
        let booking = service
            .validate_and_book(&user("U1"), &DeskId::new("Desk 1"), day)
            .await
            .expect("book");

        assert_eq!(service.cancel(&user("U2"), booking.id).await.expect("foreign"), None);
        assert_eq!(repo.list_for_date(day).await.expect("list").len(), 1);

        assert!(service.cancel(&user("U1"), booking.id).await.expect("owned").is_some());
        assert_eq!(service.cancel(&user("U1"), booking.id).await.expect("again"), None);
    }
}
