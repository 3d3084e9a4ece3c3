pub mod availability;
pub mod config;
pub mod domain;
pub mod errors;
pub mod schedule;

pub use domain::announcement::{AnnouncementRecord, MessageRef};
pub use domain::booking::{Booking, BookingId, BookingRejection, UserId};
pub use domain::desk::{DeskId, DeskSet};
pub use errors::{ApplicationError, DomainError, InterfaceError};
