use std::sync::Arc;

use chrono::{Local, NaiveDate};
use deskbook_db::repositories::{SqlAnnouncementRepository, SqlBookingRepository};
use deskbook_slack::dashboard::{DashboardError, DashboardSync};
use deskbook_slack::notifier::SlackWebApiClient;
use tracing::{error, warn};

use crate::commands::{build_runtime, load_config, open_store, CommandResult};

const COMMAND: &str = "announce";

/// Scheduled entrypoint: posts tomorrow's (or Monday's) roster once and exits.
pub fn run() -> CommandResult {
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(result) => return result,
    };
    crate::init_logging(&config);

    let channel_id = match config.announcement_channel() {
        Ok(channel) => channel.to_owned(),
        Err(error) => {
            return CommandResult::failure(COMMAND, "config_validation", error.to_string(), 2);
        }
    };
    let notifier = match SlackWebApiClient::from_config(&config.slack) {
        Ok(notifier) => notifier,
        Err(error) => {
            return CommandResult::failure(COMMAND, "slack_client", error.to_string(), 6);
        }
    };
    let runtime = match build_runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    runtime.block_on(async {
        let pool = match open_store(&config).await {
            Ok(pool) => pool,
            Err(failure) => return failure.into_result(COMMAND),
        };
        let dashboard = DashboardSync::new(
            Arc::new(SqlBookingRepository::new(pool.clone())),
            Arc::new(SqlAnnouncementRepository::new(pool.clone())),
            Arc::new(notifier),
            Some(channel_id),
        );

        let result = post_announcement(&dashboard, Local::now().date_naive()).await;
        pool.close().await;
        result
    })
}

pub async fn post_announcement(dashboard: &DashboardSync, today: NaiveDate) -> CommandResult {
    match dashboard.post_new(today).await {
        Ok(posted) => CommandResult::success(
            COMMAND,
            format!(
                "posted roster for {} to {} ({} bookings, ts {})",
                posted.target_date, posted.channel_id, posted.booking_count, posted.message_ref
            ),
        ),
        Err(DashboardError::Notifier(notifier_error)) => {
            warn!(
                event_name = "announce.post_failed",
                correlation_id = "announce",
                error = %notifier_error,
                "slack rejected the daily announcement"
            );
            CommandResult::degraded(COMMAND, "slack_api", notifier_error.to_string())
        }
        Err(DashboardError::Store(store_error)) => {
            error!(
                event_name = "announce.store_failed",
                correlation_id = "announce",
                error = %store_error,
                "could not read or record the daily announcement"
            );
            CommandResult::failure(COMMAND, "store", store_error.to_string(), 4)
        }
        Err(DashboardError::MissingChannel) => CommandResult::failure(
            COMMAND,
            "config_validation",
            DashboardError::MissingChannel.to_string(),
            2,
        ),
    }
}
