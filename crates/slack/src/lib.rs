//! Slack integration for the desk booking bot
//!
//! - **Block Kit** (`blocks`) - typed blocks, messages and modal views
//! - **Modal flow** (`modal`) - booking dialog state machine and dialog renderers
//! - **Booking** (`booking`) - store-backed availability and validate-and-book
//! - **Dashboard** (`dashboard`) - daily roster announcement and live edits
//! - **Notifier** (`notifier`) - Slack Web API client and a recording double
//! - **Commands / Events** (`commands`, `events`) - inbound parsing and dispatch
//! - **App** (`app`) - the `DeskBot` context wiring everything together
//!
//! # Architecture
//!
//! ```text
//! HTTP form → parse → EventDispatcher → Handlers → DeskBot
//!                                                    ├─ BookingService → BookingRepository
//!                                                    ├─ DashboardSync  → AnnouncementRepository
//!                                                    └─ Notifier (views.*, chat.*)
//! ```

pub mod app;
pub mod blocks;
pub mod booking;
pub mod commands;
pub mod dashboard;
pub mod events;
pub mod modal;
pub mod notifier;
