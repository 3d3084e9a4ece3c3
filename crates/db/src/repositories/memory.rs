use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use tokio::sync::RwLock;

use deskbook_core::domain::announcement::AnnouncementRecord;
use deskbook_core::domain::booking::{Booking, BookingId, BookingRejection, UserId};
use deskbook_core::domain::desk::DeskId;

use super::{AnnouncementRepository, BookingRepository, CreateBookingError, RepositoryError};

#[derive(Default)]
struct BookingTable {
    next_id: i64,
    rows: BTreeMap<i64, Booking>,
}

/// Booking store held in process memory. Uniqueness is checked and the row
/// inserted under one write lock, so it gives the same guarantees as SQLite.
#[derive(Default)]
pub struct InMemoryBookingRepository {
    table: RwLock<BookingTable>,
    unavailable: AtomicBool,
}

impl InMemoryBookingRepository {
    /// Simulates an outage: every call fails with a store error until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolClosed));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn list_booked(&self, date: NaiveDate) -> Result<BTreeSet<DeskId>, RepositoryError> {
        self.check_available()?;
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .filter(|booking| booking.booking_date == date)
            .map(|booking| booking.desk_id.clone())
            .collect())
    }

    async fn try_create(
        &self,
        user_id: &UserId,
        desk_id: &DeskId,
        date: NaiveDate,
    ) -> Result<Booking, CreateBookingError> {
        self.check_available()?;
        let mut table = self.table.write().await;

        let same_day = table.rows.values().filter(|booking| booking.booking_date == date);
        let mut desk_taken = false;
        for booking in same_day {
            if &booking.user_id == user_id {
                return Err(BookingRejection::AlreadyBooked.into());
            }
            if &booking.desk_id == desk_id {
                desk_taken = true;
            }
        }
        if desk_taken {
            return Err(BookingRejection::DeskTaken.into());
        }

        table.next_id += 1;
        let booking = Booking {
            id: BookingId(table.next_id),
            user_id: user_id.clone(),
            desk_id: desk_id.clone(),
            booking_date: date,
        };
        table.rows.insert(booking.id.0, booking.clone());
        Ok(booking)
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        from_date: NaiveDate,
    ) -> Result<Vec<Booking>, RepositoryError> {
        self.check_available()?;
        let table = self.table.read().await;
        let mut bookings: Vec<Booking> = table
            .rows
            .values()
            .filter(|booking| &booking.user_id == user_id && booking.booking_date >= from_date)
            .cloned()
            .collect();
        bookings.sort_by_key(|booking| booking.booking_date);
        Ok(bookings)
    }

    async fn list_for_date(&self, date: NaiveDate) -> Result<Vec<Booking>, RepositoryError> {
        self.check_available()?;
        let table = self.table.read().await;
        Ok(table.rows.values().filter(|booking| booking.booking_date == date).cloned().collect())
    }

    async fn find_by_id(&self, id: BookingId) -> Result<Option<Booking>, RepositoryError> {
        self.check_available()?;
        let table = self.table.read().await;
        Ok(table.rows.get(&id.0).cloned())
    }

    async fn delete(&self, id: BookingId, user_id: &UserId) -> Result<bool, RepositoryError> {
        self.check_available()?;
        let mut table = self.table.write().await;
        let owned = table.rows.get(&id.0).is_some_and(|booking| &booking.user_id == user_id);
        if owned {
            table.rows.remove(&id.0);
        }
        Ok(owned)
    }
}

#[derive(Default)]
pub struct InMemoryAnnouncementRepository {
    records: RwLock<HashMap<NaiveDate, AnnouncementRecord>>,
}

#[async_trait::async_trait]
impl AnnouncementRepository for InMemoryAnnouncementRepository {
    async fn get_announcement(
        &self,
        date: NaiveDate,
    ) -> Result<Option<AnnouncementRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.get(&date).cloned())
    }

    async fn upsert_announcement(
        &self,
        record: AnnouncementRecord,
    ) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        records.insert(record.target_date, record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use deskbook_core::domain::announcement::{AnnouncementRecord, MessageRef};
    use deskbook_core::domain::booking::{BookingRejection, UserId};
    use deskbook_core::domain::desk::DeskId;

    use crate::repositories::{
        AnnouncementRepository, BookingRepository, CreateBookingError,
        InMemoryAnnouncementRepository, InMemoryBookingRepository,
    };

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 10).expect("date")
    }

    #[tokio::test]
    async fn in_memory_bookings_enforce_both_uniqueness_rules() {
        let repo = InMemoryBookingRepository::default();
        let u1 = UserId("U1".to_owned());
        let u2 = UserId("U2".to_owned());

        let first = repo.try_create(&u1, &DeskId::new("Desk 1"), monday()).await.expect("create");
        assert_eq!(first.id.0, 1);

        assert!(matches!(
            repo.try_create(&u1, &DeskId::new("Desk 2"), monday()).await,
            Err(CreateBookingError::Rejected(BookingRejection::AlreadyBooked))
        ));
        assert!(matches!(
            repo.try_create(&u2, &DeskId::new("Desk 1"), monday()).await,
            Err(CreateBookingError::Rejected(BookingRejection::DeskTaken))
        ));

        let booked = repo.list_booked(monday()).await.expect("booked");
        assert_eq!(booked.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_creates_for_one_desk_admit_exactly_one() {
        let repo = Arc::new(InMemoryBookingRepository::default());
        let desk = DeskId::new("Desk 7");
        let (ua, ub) = (UserId("UA".to_owned()), UserId("UB".to_owned()));
        let (a, b) = tokio::join!(
            repo.try_create(&ua, &desk, monday()),
            repo.try_create(&ub, &desk, monday()),
        );

        let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(successes, 1);
        assert_eq!(repo.list_for_date(monday()).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let repo = InMemoryBookingRepository::default();
        repo.set_unavailable(true);

        assert!(repo.list_booked(monday()).await.is_err());
        assert!(matches!(
            repo.try_create(&UserId("U1".to_owned()), &DeskId::new("Desk 1"), monday()).await,
            Err(CreateBookingError::Store(_))
        ));

        repo.set_unavailable(false);
        assert!(repo.list_booked(monday()).await.expect("available again").is_empty());
    }

    #[tokio::test]
    async fn delete_requires_ownership() {
        let repo = InMemoryBookingRepository::default();
        let owner = UserId("U1".to_owned());
        let booking =
            repo.try_create(&owner, &DeskId::new("Desk 4"), monday()).await.expect("create");

        assert!(!repo.delete(booking.id, &UserId("U2".to_owned())).await.expect("foreign"));
        assert!(repo.delete(booking.id, &owner).await.expect("owned"));
        assert!(repo.find_by_id(booking.id).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn in_memory_announcements_upsert_by_date() {
        let repo = InMemoryAnnouncementRepository::default();
        for ts in ["1.1", "2.2"] {
            repo.upsert_announcement(AnnouncementRecord {
                target_date: monday(),
                channel_id: "C1".to_owned(),
                message_ref: MessageRef(ts.to_owned()),
            })
            .await
            .expect("upsert");
        }

        let loaded = repo.get_announcement(monday()).await.expect("get").expect("present");
        assert_eq!(loaded.message_ref, MessageRef("2.2".to_owned()));
    }
}
