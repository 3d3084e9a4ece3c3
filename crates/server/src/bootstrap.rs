use std::sync::Arc;

use axum::Router;
use deskbook_core::config::{AppConfig, ConfigError, LoadOptions};
use deskbook_db::repositories::{SqlAnnouncementRepository, SqlBookingRepository};
use deskbook_db::{connect_with_settings, migrations, DbPool};
use deskbook_slack::app::{DeskBot, DeskBotParts};
use deskbook_slack::notifier::{NotifierError, SlackWebApiClient};
use thiserror::Error;
use tracing::info;

use crate::{health, interactions};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub bot: Arc<DeskBot>,
}

impl Application {
    /// Every HTTP route the server exposes.
    pub fn router(&self) -> Router {
        health::router(self.db_pool.clone())
            .merge(interactions::router(Arc::new(self.bot.dispatcher())))
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("slack client setup failed: {0}")]
    Notifier(#[source] NotifierError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let notifier = SlackWebApiClient::from_config(&config.slack).map_err(BootstrapError::Notifier)?;
    let bot = DeskBot::new(DeskBotParts {
        desks: config.office.desk_set(),
        bookings: Arc::new(SqlBookingRepository::new(db_pool.clone())),
        announcements: Arc::new(SqlAnnouncementRepository::new(db_pool.clone())),
        notifier: Arc::new(notifier),
        announcement_channel_id: config.slack.announcement_channel_id.clone(),
        map_image_url: config.office.map_image_url.clone(),
    });
    info!(
        event_name = "system.bootstrap.bot_ready",
        correlation_id = "bootstrap",
        desk_count = config.office.desk_count,
        "desk bot context initialized"
    );

    Ok(Application { config, db_pool, bot: Arc::new(bot) })
}
