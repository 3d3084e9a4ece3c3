use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use deskbook_core::domain::booking::UserId;
use deskbook_core::errors::ApplicationError;
use deskbook_db::repositories::RepositoryError;

use crate::events::EventContext;
use crate::notifier::NotifierError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub trigger_id: String,
    pub user_id: String,
    pub text: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeskCommand {
    /// `/book`
    Book,
    /// `/delete`
    MyBookings,
    /// `/who_is_in_the_house`
    WhoIsHere,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
}

#[derive(Debug, Error)]
pub enum CommandRouteError {
    #[error(transparent)]
    Store(#[from] RepositoryError),
    #[error(transparent)]
    Notifier(#[from] NotifierError),
}

impl From<CommandRouteError> for ApplicationError {
    fn from(value: CommandRouteError) -> Self {
        match value {
            CommandRouteError::Store(error) => Self::Persistence(error.to_string()),
            CommandRouteError::Notifier(error) => Self::Integration(error.to_string()),
        }
    }
}

pub fn parse_desk_command(command: &str) -> Result<DeskCommand, CommandParseError> {
    match command.trim() {
        "/book" => Ok(DeskCommand::Book),
        "/delete" => Ok(DeskCommand::MyBookings),
        "/who_is_in_the_house" => Ok(DeskCommand::WhoIsHere),
        other => Err(CommandParseError::UnsupportedCommand(other.to_owned())),
    }
}

pub struct CommandRouter<S> {
    service: S,
}

impl<S> CommandRouter<S>
where
    S: DeskCommandService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub async fn route(
        &self,
        command: DeskCommand,
        payload: &SlashCommandPayload,
        ctx: &EventContext,
    ) -> Result<(), CommandRouteError> {
        match command {
            DeskCommand::Book => self.service.open_booking_dialog(&payload.trigger_id, ctx).await,
            DeskCommand::MyBookings => {
                let user_id = UserId(payload.user_id.clone());
                self.service.open_my_bookings(&payload.trigger_id, &user_id, ctx).await
            }
            DeskCommand::WhoIsHere => self.service.open_who_is_here(&payload.trigger_id, ctx).await,
        }
    }
}

#[async_trait]
pub trait DeskCommandService: Send + Sync {
    async fn open_booking_dialog(
        &self,
        trigger_id: &str,
        ctx: &EventContext,
    ) -> Result<(), CommandRouteError>;

    async fn open_my_bookings(
        &self,
        trigger_id: &str,
        user_id: &UserId,
        ctx: &EventContext,
    ) -> Result<(), CommandRouteError>;

    async fn open_who_is_here(
        &self,
        trigger_id: &str,
        ctx: &EventContext,
    ) -> Result<(), CommandRouteError>;
}

#[async_trait]
impl<T> DeskCommandService for Arc<T>
where
    T: DeskCommandService + ?Sized,
{
    async fn open_booking_dialog(
        &self,
        trigger_id: &str,
        ctx: &EventContext,
    ) -> Result<(), CommandRouteError> {
        (**self).open_booking_dialog(trigger_id, ctx).await
    }

    async fn open_my_bookings(
        &self,
        trigger_id: &str,
        user_id: &UserId,
        ctx: &EventContext,
    ) -> Result<(), CommandRouteError> {
        (**self).open_my_bookings(trigger_id, user_id, ctx).await
    }

    async fn open_who_is_here(
        &self,
        trigger_id: &str,
        ctx: &EventContext,
    ) -> Result<(), CommandRouteError> {
        (**self).open_who_is_here(trigger_id, ctx).await
    }
}
