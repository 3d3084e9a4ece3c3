use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{info, warn};

use deskbook_core::domain::announcement::{AnnouncementRecord, MessageRef};
use deskbook_core::schedule::next_workday;
use deskbook_db::repositories::{AnnouncementRepository, BookingRepository, RepositoryError};

use crate::blocks::office_status_message;
use crate::notifier::{Notifier, NotifierError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No roster was posted for the date; nothing to edit.
    NoAnnouncement,
    Updated,
    /// Logged and swallowed; the stored record is kept for the next attempt.
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostedAnnouncement {
    pub target_date: NaiveDate,
    pub channel_id: String,
    pub message_ref: MessageRef,
    pub booking_count: usize,
}

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("no announcement channel configured")]
    MissingChannel,
    #[error(transparent)]
    Store(#[from] RepositoryError),
    #[error(transparent)]
    Notifier(#[from] NotifierError),
}

/// Keeps the daily roster message in step with the booking table.
#[derive(Clone)]
pub struct DashboardSync {
    bookings: Arc<dyn BookingRepository>,
    announcements: Arc<dyn AnnouncementRepository>,
    notifier: Arc<dyn Notifier>,
    channel_id: Option<String>,
}

impl DashboardSync {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        announcements: Arc<dyn AnnouncementRepository>,
        notifier: Arc<dyn Notifier>,
        channel_id: Option<String>,
    ) -> Self {
        Self { bookings, announcements, notifier, channel_id }
    }

    /// Best-effort edit of the roster posted for `date`. Never fails the caller.
    pub async fn refresh(&self, date: NaiveDate) -> RefreshOutcome {
        let record = match self.announcements.get_announcement(date).await {
            Ok(Some(record)) => record,
            Ok(None) => return RefreshOutcome::NoAnnouncement,
            Err(error) => {
                warn!(
                    event_name = "dashboard.refresh_failed",
                    stage = "lookup",
                    target_date = %date,
                    error = %error,
                    "could not load announcement record"
                );
                return RefreshOutcome::Failed;
            }
        };

        let bookings = match self.bookings.list_for_date(date).await {
            Ok(bookings) => bookings,
            Err(error) => {
                warn!(
                    event_name = "dashboard.refresh_failed",
                    stage = "roster",
                    target_date = %date,
                    error = %error,
                    "could not load roster"
                );
                return RefreshOutcome::Failed;
            }
        };

        let message = office_status_message(date, &bookings);
        match self.notifier.edit_message(&record.channel_id, &record.message_ref, &message).await {
            Ok(()) => {
                info!(
                    event_name = "dashboard.refreshed",
                    target_date = %date,
                    channel_id = %record.channel_id,
                    booking_count = bookings.len(),
                    "announcement updated"
                );
                RefreshOutcome::Updated
            }
            Err(error) => {
                warn!(
                    event_name = "dashboard.refresh_failed",
                    stage = "edit",
                    target_date = %date,
                    channel_id = %record.channel_id,
                    message_ref = %record.message_ref,
                    error = %error,
                    "could not edit announcement"
                );
                RefreshOutcome::Failed
            }
        }
    }

    /// Posts the roster for the workday after `today` and remembers where it went.
    pub async fn post_new(&self, today: NaiveDate) -> Result<PostedAnnouncement, DashboardError> {
        let channel_id = self
            .channel_id
            .as_deref()
            .map(str::trim)
            .filter(|channel| !channel.is_empty())
            .ok_or(DashboardError::MissingChannel)?
            .to_owned();
        let target_date = next_workday(today);

        let bookings = self.bookings.list_for_date(target_date).await?;
        let message = office_status_message(target_date, &bookings);
        let message_ref = self.notifier.post_message(&channel_id, &message).await?;

        self.announcements
            .upsert_announcement(AnnouncementRecord {
                target_date,
                channel_id: channel_id.clone(),
                message_ref: message_ref.clone(),
            })
            .await?;

        info!(
            event_name = "dashboard.posted",
            target_date = %target_date,
            channel_id = %channel_id,
            message_ref = %message_ref,
            booking_count = bookings.len(),
            "announcement posted"
        );

        Ok(PostedAnnouncement {
            target_date,
            channel_id,
            message_ref,
            booking_count: bookings.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use deskbook_core::domain::announcement::{AnnouncementRecord, MessageRef};
    use deskbook_core::domain::booking::UserId;
    use deskbook_core::domain::desk::DeskId;
    use deskbook_db::repositories::{
        AnnouncementRepository, BookingRepository, InMemoryAnnouncementRepository,
        InMemoryBookingRepository,
    };

    use super::{DashboardError, DashboardSync, RefreshOutcome};
    use crate::blocks::{Block, TextObject};
    use crate::notifier::{NotifierCall, RecordingNotifier};

    struct Fixture {
        bookings: Arc<InMemoryBookingRepository>,
        announcements: Arc<InMemoryAnnouncementRepository>,
        notifier: Arc<RecordingNotifier>,
        dashboard: DashboardSync,
    }

    fn fixture(channel: Option<&str>) -> Fixture {
        let bookings = Arc::new(InMemoryBookingRepository::default());
        let announcements = Arc::new(InMemoryAnnouncementRepository::default());
        let notifier = Arc::new(RecordingNotifier::new());
        let dashboard = DashboardSync::new(
            bookings.clone(),
            announcements.clone(),
            notifier.clone(),
            channel.map(str::to_owned),
        );
        Fixture { bookings, announcements, notifier, dashboard }
    }

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("valid date")
    }

    fn roster_text(call: &NotifierCall) -> Option<String> {
        let message = match call {
            NotifierCall::PostMessage { message, .. }
            | NotifierCall::EditMessage { message, .. } => message,
            _ => return None,
        };
        message.blocks.iter().find_map(|block| match block {
            Block::Section { block_id, text: TextObject::Mrkdwn { text }, .. }
                if block_id == "office_status.roster" =>
            {
                Some(text.clone())
            }
            _ => None,
        })
    }

    #[tokio::test]
    async fn refresh_without_record_makes_no_notifier_call() {
        let fx = fixture(Some("C-OFFICE"));

        let outcome = fx.dashboard.refresh(date("2024-06-10")).await;

        assert_eq!(outcome, RefreshOutcome::NoAnnouncement);
        assert!(fx.notifier.calls().await.is_empty());
    }

    #[tokio::test]
    async fn refresh_edits_the_stored_message_with_a_fresh_roster() {
        let fx = fixture(Some("C-OFFICE"));
        let day = date("2024-06-10");
        fx.announcements
            .upsert_announcement(AnnouncementRecord {
                target_date: day,
                channel_id: "C-OFFICE".to_owned(),
                message_ref: MessageRef("1718000000.000042".to_owned()),
            })
            .await
            .expect("seed record");
        fx.bookings
            .try_create(&UserId("U1".to_owned()), &DeskId::new("Desk 3"), day)
            .await
            .expect("seed booking");

        assert_eq!(fx.dashboard.refresh(day).await, RefreshOutcome::Updated);

        let calls = fx.notifier.calls().await;
        assert_eq!(calls.len(), 1);
        assert!(matches!(
            &calls[0],
            NotifierCall::EditMessage { channel, message_ref, .. }
                if channel == "C-OFFICE" && message_ref.0 == "1718000000.000042"
        ));
        assert_eq!(roster_text(&calls[0]).as_deref(), Some("• <@U1> ➝ *Desk 3*"));
    }

    #[tokio::test]
    async fn failed_edit_is_swallowed_and_record_kept() {
        let fx = fixture(Some("C-OFFICE"));
        let day = date("2024-06-10");
        let record = AnnouncementRecord {
            target_date: day,
            channel_id: "C-OFFICE".to_owned(),
            message_ref: MessageRef("1718000000.000042".to_owned()),
        };
        fx.announcements.upsert_announcement(record.clone()).await.expect("seed record");
        fx.notifier.set_failing(true);

        assert_eq!(fx.dashboard.refresh(day).await, RefreshOutcome::Failed);
        assert_eq!(fx.announcements.get_announcement(day).await.expect("get"), Some(record));
    }

    #[tokio::test]
    async fn refresh_reports_failed_when_store_is_down() {
        let fx = fixture(Some("C-OFFICE"));
        let day = date("2024-06-10");
        fx.announcements
            .upsert_announcement(AnnouncementRecord {
                target_date: day,
                channel_id: "C-OFFICE".to_owned(),
                message_ref: MessageRef("1.1".to_owned()),
            })
            .await
            .expect("seed record");
        fx.bookings.set_unavailable(true);

        assert_eq!(fx.dashboard.refresh(day).await, RefreshOutcome::Failed);
        assert!(fx.notifier.calls().await.is_empty());
    }

    #[tokio::test]
    async fn friday_post_targets_monday_and_records_the_message() {
        let fx = fixture(Some("C-OFFICE"));
        let friday = date("2024-06-07");

        let posted = fx.dashboard.post_new(friday).await.expect("post");

        assert_eq!(posted.target_date, date("2024-06-10"));
        assert_eq!(posted.booking_count, 0);
        let stored = fx
            .announcements
            .get_announcement(date("2024-06-10"))
            .await
            .expect("get")
            .expect("record stored");
        assert_eq!(stored.message_ref, posted.message_ref);
        assert_eq!(stored.channel_id, "C-OFFICE");

        let calls = fx.notifier.calls().await;
        assert_eq!(
            roster_text(&calls[0]).as_deref(),
            Some("The office is currently empty. 👻")
        );
    }

    #[tokio::test]
    async fn post_then_booking_refresh_edits_the_posted_message() {
        let fx = fixture(Some("C-OFFICE"));
        let posted = fx.dashboard.post_new(date("2024-06-11")).await.expect("post");
        fx.bookings
            .try_create(&UserId("U7".to_owned()), &DeskId::new("Desk 7"), posted.target_date)
            .await
            .expect("book");

        assert_eq!(fx.dashboard.refresh(posted.target_date).await, RefreshOutcome::Updated);
        let calls = fx.notifier.calls().await;
        assert!(matches!(
            &calls[1],
            NotifierCall::EditMessage { message_ref, .. } if *message_ref == posted.message_ref
        ));
    }

    #[tokio::test]
    async fn post_without_channel_fails_before_any_call() {
        let fx = fixture(None);

        let result = fx.dashboard.post_new(date("2024-06-10")).await;

        assert!(matches!(result, Err(DashboardError::MissingChannel)));
        assert!(fx.notifier.calls().await.is_empty());
    }

    #[tokio::test]
    async fn post_notifier_failure_leaves_no_record() {
        let fx = fixture(Some("C-OFFICE"));
        fx.notifier.set_failing(true);

        let result = fx.dashboard.post_new(date("2024-06-10")).await;

        assert!(matches!(result, Err(DashboardError::Notifier(_))));
        assert_eq!(fx.announcements.get_announcement(date("2024-06-11")).await.expect("get"), None);
    }
}
