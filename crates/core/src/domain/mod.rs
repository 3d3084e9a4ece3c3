pub mod announcement;
pub mod booking;
pub mod desk;
