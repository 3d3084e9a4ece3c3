//! Pure availability rules shared by the store-backed booking service.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::domain::booking::{Booking, BookingRejection};
use crate::domain::desk::{DeskId, DeskSet};

/// Desks of `desks` not present in `booked`, in desk-set order.
pub fn available_desks(desks: &DeskSet, booked: &BTreeSet<DeskId>) -> Vec<DeskId> {
    desks.iter().filter(|desk| !booked.contains(*desk)).cloned().collect()
}

/// Local checks run before the store insert. The store's unique constraints stay
/// authoritative; these only produce friendlier rejections in the common case.
pub fn precheck_booking(
    desks: &DeskSet,
    desk_id: &DeskId,
    date: NaiveDate,
    user_bookings: &[Booking],
) -> Result<(), BookingRejection> {
    if !desks.contains(desk_id) {
        return Err(BookingRejection::UnknownDesk);
    }
    if user_bookings.iter().any(|booking| booking.booking_date == date) {
        return Err(BookingRejection::AlreadyBooked);
    }
    Ok(())
}
