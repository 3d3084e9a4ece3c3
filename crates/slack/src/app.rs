use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{info, warn};

use deskbook_core::domain::booking::{BookingId, UserId};
use deskbook_core::domain::desk::{DeskId, DeskSet};
use deskbook_core::errors::ApplicationError;
use deskbook_db::repositories::{AnnouncementRepository, BookingRepository, CreateBookingError};

use crate::blocks::{booking_confirmation_message, ModalView, OPEN_BOOKING_MODAL_ACTION};
use crate::booking::BookingService;
use crate::commands::{CommandRouteError, DeskCommandService};
use crate::dashboard::DashboardSync;
use crate::events::{
    BlockActionEvent, BlockActionHandler, BlockActionService, EventContext, EventDispatcher,
    EventHandlerError, HandlerResult, SlashCommandHandler, ViewSubmissionEvent,
    ViewSubmissionHandler, ViewSubmissionResponse, ViewSubmissionService,
};
use crate::modal::{
    booking_modal, my_bookings_modal, who_is_here_modal, ModalEvent, ModalState,
    BOOKING_CALLBACK_ID, DATE_PICKER_ACTION, DATE_RADIO_ACTION, DELETE_BOOKING_ACTION,
    DESK_SELECT_BLOCK,
};
use crate::notifier::Notifier;

const MISSING_DESK_MESSAGE: &str = "Please choose a desk.";

/// Everything a request handler needs, built once at startup and shared.
pub struct DeskBot {
    booking: BookingService,
    dashboard: DashboardSync,
    notifier: Arc<dyn Notifier>,
    map_image_url: String,
}

pub struct DeskBotParts {
    pub desks: DeskSet,
    pub bookings: Arc<dyn BookingRepository>,
    pub announcements: Arc<dyn AnnouncementRepository>,
    pub notifier: Arc<dyn Notifier>,
    pub announcement_channel_id: Option<String>,
    pub map_image_url: String,
}

impl DeskBot {
    pub fn new(parts: DeskBotParts) -> Self {
        let booking = BookingService::new(parts.desks, parts.bookings.clone());
        let dashboard = DashboardSync::new(
            parts.bookings,
            parts.announcements,
            parts.notifier.clone(),
            parts.announcement_channel_id,
        );
        Self { booking, dashboard, notifier: parts.notifier, map_image_url: parts.map_image_url }
    }

    pub fn booking(&self) -> &BookingService {
        &self.booking
    }

    pub fn dashboard(&self) -> &DashboardSync {
        &self.dashboard
    }

    /// Dispatcher with every inbound handler bound to this bot.
    pub fn dispatcher(self: &Arc<Self>) -> EventDispatcher {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(SlashCommandHandler::new(self.clone()));
        dispatcher.register(BlockActionHandler::new(self.clone()));
        dispatcher.register(ViewSubmissionHandler::new(self.clone()));
        dispatcher
    }

    async fn render_booking_dialog(
        &self,
        state: &ModalState,
        today: NaiveDate,
    ) -> Result<ModalView, EventHandlerError> {
        let available = self.booking.available_desks(state.selected_date).await?;
        Ok(booking_modal(state, &available, today, &self.map_image_url))
    }

    async fn open_initial_booking_dialog(
        &self,
        trigger_id: &str,
        ctx: &EventContext,
    ) -> Result<(), CommandRouteError> {
        let state = ModalState::initial(ctx.today);
        let available = self.booking.available_desks(state.selected_date).await?;
        let view = booking_modal(&state, &available, ctx.today, &self.map_image_url);
        self.notifier.open_dialog(trigger_id, &view).await?;
        Ok(())
    }

    async fn update_dialog_best_effort(
        &self,
        view_id: &str,
        view: &ModalView,
        hash: Option<&str>,
        ctx: &EventContext,
    ) {
        if let Err(error) = self.notifier.update_dialog(view_id, view, hash).await {
            warn!(
                event_name = "slack.dialog.update_failed",
                correlation_id = %ctx.correlation_id,
                view_id = %view_id,
                error = %error,
                "could not update dialog"
            );
        }
    }

    async fn change_booking_date(
        &self,
        event: &BlockActionEvent,
        modal_event: ModalEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let Some(view) = &event.view else {
            return Ok(HandlerResult::Ignored);
        };
        let previous =
            view.private_metadata.as_deref().and_then(|raw| ModalState::from_metadata(raw).ok());
        let state = ModalState::transition(previous.as_ref(), modal_event, ctx.today);

        let rendered = self.render_booking_dialog(&state, ctx.today).await?;
        self.update_dialog_best_effort(&view.id, &rendered, view.hash.as_deref(), ctx).await;
        Ok(HandlerResult::Processed)
    }

    async fn delete_booking(
        &self,
        event: &BlockActionEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let Some(booking_id) =
            event.value.as_deref().and_then(|value| value.parse::<BookingId>().ok())
        else {
            warn!(
                event_name = "slack.action.invalid_booking_id",
                correlation_id = %ctx.correlation_id,
                value = ?event.value,
                "delete action without a usable booking id"
            );
            return Ok(HandlerResult::Ignored);
        };

        if let Some(removed) = self.booking.cancel(&event.user_id, booking_id).await? {
            self.dashboard.refresh(removed.booking_date).await;
        }

        if let Some(view) = &event.view {
            let upcoming = self.booking.upcoming_for_user(&event.user_id, ctx.today).await?;
            self.update_dialog_best_effort(&view.id, &my_bookings_modal(&upcoming), None, ctx)
                .await;
        }
        Ok(HandlerResult::Processed)
    }

    async fn send_confirmation(&self, user_id: &UserId, desk_id: &DeskId, date: NaiveDate) {
        let message = booking_confirmation_message(desk_id, date);
        if let Err(error) = self.notifier.post_message(user_id.as_str(), &message).await {
            warn!(
                event_name = "slack.booking.confirmation_failed",
                user_id = %user_id,
                error = %error,
                "could not send booking confirmation"
            );
        }
    }
}

#[async_trait]
impl DeskCommandService for DeskBot {
    async fn open_booking_dialog(
        &self,
        trigger_id: &str,
        ctx: &EventContext,
    ) -> Result<(), CommandRouteError> {
        self.open_initial_booking_dialog(trigger_id, ctx).await
    }

    async fn open_my_bookings(
        &self,
        trigger_id: &str,
        user_id: &UserId,
        ctx: &EventContext,
    ) -> Result<(), CommandRouteError> {
        let upcoming = self.booking.upcoming_for_user(user_id, ctx.today).await?;
        self.notifier.open_dialog(trigger_id, &my_bookings_modal(&upcoming)).await?;
        Ok(())
    }

    async fn open_who_is_here(
        &self,
        trigger_id: &str,
        ctx: &EventContext,
    ) -> Result<(), CommandRouteError> {
        let roster = self.booking.roster(ctx.today).await?;
        self.notifier.open_dialog(trigger_id, &who_is_here_modal(ctx.today, &roster)).await?;
        Ok(())
    }
}

#[async_trait]
impl BlockActionService for DeskBot {
    async fn handle_block_action(
        &self,
        event: &BlockActionEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        match event.action_id.as_str() {
            DATE_RADIO_ACTION => {
                match event.selected_option.as_deref().and_then(ModalEvent::from_radio_value) {
                    Some(modal_event) => self.change_booking_date(event, modal_event, ctx).await,
                    None => Ok(HandlerResult::Ignored),
                }
            }
            DATE_PICKER_ACTION => {
                match event.selected_date.as_deref().and_then(ModalEvent::from_picked_date) {
                    Some(modal_event) => self.change_booking_date(event, modal_event, ctx).await,
                    None => Ok(HandlerResult::Ignored),
                }
            }
            DELETE_BOOKING_ACTION => self.delete_booking(event, ctx).await,
            OPEN_BOOKING_MODAL_ACTION => {
                let Some(trigger_id) = event.trigger_id.as_deref() else {
                    return Ok(HandlerResult::Ignored);
                };
                self.open_initial_booking_dialog(trigger_id, ctx).await?;
                Ok(HandlerResult::Processed)
            }
            _ => Ok(HandlerResult::Ignored),
        }
    }
}

#[async_trait]
impl ViewSubmissionService for DeskBot {
    async fn handle_view_submission(
        &self,
        event: &ViewSubmissionEvent,
        ctx: &EventContext,
    ) -> Result<Option<ViewSubmissionResponse>, EventHandlerError> {
        if event.callback_id != BOOKING_CALLBACK_ID {
            return Ok(None);
        }
        // Any answer other than `errors` closes the dialog, so unusable
        // submissions are reported inline on the desk select.
        let state = match ModalState::from_metadata(&event.private_metadata) {
            Ok(state) => state,
            Err(error) => {
                warn!(
                    event_name = "slack.submission.bad_metadata",
                    correlation_id = %ctx.correlation_id,
                    error = %error,
                    "rejecting booking submission"
                );
                let interface =
                    ApplicationError::from(error).into_interface(&ctx.correlation_id);
                return Ok(Some(ViewSubmissionResponse::field_error(
                    DESK_SELECT_BLOCK,
                    interface.user_message(),
                )));
            }
        };
        let Some(desk) = event.selected_desk.as_deref() else {
            return Ok(Some(ViewSubmissionResponse::field_error(
                DESK_SELECT_BLOCK,
                MISSING_DESK_MESSAGE,
            )));
        };
        let desk_id = DeskId::new(desk);

        match self.booking.validate_and_book(&event.user_id, &desk_id, state.selected_date).await {
            Ok(booking) => {
                info!(
                    event_name = "slack.submission.booked",
                    correlation_id = %ctx.correlation_id,
                    booking_id = %booking.id,
                    "booking dialog submitted"
                );
                self.send_confirmation(&booking.user_id, &booking.desk_id, booking.booking_date)
                    .await;
                self.dashboard.refresh(booking.booking_date).await;
                Ok(Some(ViewSubmissionResponse::Clear))
            }
            Err(CreateBookingError::Rejected(rejection)) => Ok(Some(
                ViewSubmissionResponse::field_error(DESK_SELECT_BLOCK, rejection.user_message()),
            )),
            Err(CreateBookingError::Store(error)) => {
                let interface = ApplicationError::Persistence(error.to_string())
                    .into_interface(&ctx.correlation_id);
                Ok(Some(ViewSubmissionResponse::field_error(
                    DESK_SELECT_BLOCK,
                    interface.user_message(),
                )))
            }
        }
    }
}
