use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::desk::DeskId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BookingId(pub i64);

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for BookingId {
    type Err = std::num::ParseIntError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value.trim().parse::<i64>().map(Self)
    }
}

/// Slack member id of the person holding a booking.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub user_id: UserId,
    pub desk_id: DeskId,
    pub booking_date: NaiveDate,
}

/// Expected, user-facing reasons a booking attempt is refused.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum BookingRejection {
    #[error("user already holds a booking on this date")]
    AlreadyBooked,
    #[error("desk is already booked on this date")]
    DeskTaken,
    #[error("desk is not part of the office desk set")]
    UnknownDesk,
}

impl BookingRejection {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::AlreadyBooked => "❌ You already have a seat for this day!",
            Self::DeskTaken => "Someone just took this desk! Please pick another one.",
            Self::UnknownDesk => "That desk does not exist. Please pick one from the list.",
        }
    }
}
