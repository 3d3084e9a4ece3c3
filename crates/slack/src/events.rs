use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use deskbook_core::domain::booking::UserId;
use deskbook_core::errors::ApplicationError;
use deskbook_db::repositories::RepositoryError;

use crate::commands::{
    parse_desk_command, CommandRouteError, CommandRouter, DeskCommandService, SlashCommandPayload,
};
use crate::modal::{DESK_SELECT_ACTION, DESK_SELECT_BLOCK};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    SlashCommand(SlashCommandPayload),
    BlockAction(BlockActionEvent),
    ViewSubmission(ViewSubmissionEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::SlashCommand(_) => SlackEventType::SlashCommand,
            Self::BlockAction(_) => SlackEventType::BlockAction,
            Self::ViewSubmission(_) => SlackEventType::ViewSubmission,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    SlashCommand,
    BlockAction,
    ViewSubmission,
    Unsupported,
}

/// The dialog an interaction came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewRef {
    pub id: String,
    pub hash: Option<String>,
    pub private_metadata: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockActionEvent {
    pub user_id: UserId,
    pub trigger_id: Option<String>,
    pub action_id: String,
    pub value: Option<String>,
    pub selected_option: Option<String>,
    pub selected_date: Option<String>,
    pub view: Option<ViewRef>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewSubmissionEvent {
    pub user_id: UserId,
    pub callback_id: String,
    pub private_metadata: String,
    pub selected_desk: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
    pub today: NaiveDate,
}

impl EventContext {
    pub fn new(correlation_id: impl Into<String>, today: NaiveDate) -> Self {
        Self { correlation_id: correlation_id.into(), today }
    }
}

impl Default for EventContext {
    fn default() -> Self {
        Self {
            correlation_id: "unknown-correlation-id".to_owned(),
            today: chrono::Local::now().date_naive(),
        }
    }
}

/// Body Slack expects in reply to a `view_submission`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "response_action", rename_all = "snake_case")]
pub enum ViewSubmissionResponse {
    Clear,
    Errors { errors: BTreeMap<String, String> },
}

impl ViewSubmissionResponse {
    pub fn field_error(block_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Errors { errors: BTreeMap::from([(block_id.into(), message.into())]) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    /// Text shown to the user who ran a slash command.
    Notice(String),
    ViewResponse(ViewSubmissionResponse),
    Processed,
    Ignored,
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("payload is missing `{0}`")]
    MissingField(&'static str),
}

#[derive(Debug, Error)]
pub enum EventHandlerError {
    #[error(transparent)]
    Route(#[from] CommandRouteError),
    #[error(transparent)]
    Store(#[from] RepositoryError),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[derive(Deserialize)]
struct RawInteraction {
    #[serde(rename = "type")]
    kind: String,
    user: Option<RawUser>,
    trigger_id: Option<String>,
    #[serde(default)]
    actions: Vec<RawAction>,
    view: Option<RawView>,
}

#[derive(Deserialize)]
struct RawUser {
    id: String,
}

#[derive(Deserialize)]
struct RawAction {
    action_id: String,
    value: Option<String>,
    selected_option: Option<RawOption>,
    selected_date: Option<String>,
}

#[derive(Deserialize)]
struct RawOption {
    value: String,
}

#[derive(Deserialize)]
struct RawView {
    id: Option<String>,
    hash: Option<String>,
    callback_id: Option<String>,
    private_metadata: Option<String>,
    state: Option<RawViewState>,
}

#[derive(Deserialize)]
struct RawViewState {
    #[serde(default)]
    values: HashMap<String, HashMap<String, RawStateValue>>,
}

#[derive(Deserialize)]
struct RawStateValue {
    selected_option: Option<RawOption>,
}

/// Parses the form body of an inbound request: slash commands arrive as flat
/// fields, interactions as a JSON `payload` field.
pub fn parse_form(fields: &HashMap<String, String>) -> Result<SlackEvent, PayloadError> {
    if let Some(command) = fields.get("command") {
        let field = |name: &'static str| {
            fields.get(name).cloned().ok_or(PayloadError::MissingField(name))
        };
        return Ok(SlackEvent::SlashCommand(SlashCommandPayload {
            command: command.clone(),
            trigger_id: field("trigger_id")?,
            user_id: field("user_id")?,
            text: fields.get("text").cloned().unwrap_or_default(),
        }));
    }

    match fields.get("payload") {
        Some(raw) => parse_interaction_payload(raw),
        None => Err(PayloadError::MissingField("command")),
    }
}

pub fn parse_interaction_payload(raw: &str) -> Result<SlackEvent, PayloadError> {
    let interaction: RawInteraction =
        serde_json::from_str(raw).map_err(|error| PayloadError::InvalidJson(error.to_string()))?;

    match interaction.kind.as_str() {
        "block_actions" => {
            let user_id = interaction.user.ok_or(PayloadError::MissingField("user.id"))?.id;
            let action = interaction
                .actions
                .into_iter()
                .next()
                .ok_or(PayloadError::MissingField("actions"))?;
            let view = interaction.view.and_then(|view| {
                view.id.map(|id| ViewRef {
                    id,
                    hash: view.hash,
                    private_metadata: view.private_metadata,
                })
            });

            Ok(SlackEvent::BlockAction(BlockActionEvent {
                user_id: UserId(user_id),
                trigger_id: interaction.trigger_id,
                action_id: action.action_id,
                value: action.value,
                selected_option: action.selected_option.map(|option| option.value),
                selected_date: action.selected_date,
                view,
            }))
        }
        "view_submission" => {
            let user_id = interaction.user.ok_or(PayloadError::MissingField("user.id"))?.id;
            let view = interaction.view.ok_or(PayloadError::MissingField("view"))?;
            let selected_desk = view
                .state
                .as_ref()
                .and_then(|state| state.values.get(DESK_SELECT_BLOCK))
                .and_then(|block| block.get(DESK_SELECT_ACTION))
                .and_then(|value| value.selected_option.as_ref())
                .map(|option| option.value.clone());

            Ok(SlackEvent::ViewSubmission(ViewSubmissionEvent {
                user_id: UserId(user_id),
                callback_id: view.callback_id.unwrap_or_default(),
                private_metadata: view.private_metadata.unwrap_or_default(),
                selected_desk,
            }))
        }
        other => Ok(SlackEvent::Unsupported { event_type: other.to_owned() }),
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        event: &SlackEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        event: &SlackEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(event, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

pub struct SlashCommandHandler<S> {
    router: CommandRouter<S>,
}

impl<S> SlashCommandHandler<S>
where
    S: DeskCommandService,
{
    pub fn new(service: S) -> Self {
        Self { router: CommandRouter::new(service) }
    }
}

#[async_trait]
impl<S> EventHandler for SlashCommandHandler<S>
where
    S: DeskCommandService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::SlashCommand
    }

    async fn handle(
        &self,
        event: &SlackEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::SlashCommand(payload) = event else {
            return Ok(HandlerResult::Ignored);
        };

        let command = match parse_desk_command(&payload.command) {
            Ok(command) => command,
            Err(error) => {
                debug!(
                    event_name = "slack.command.ignored",
                    correlation_id = %ctx.correlation_id,
                    error = %error,
                    "ignoring slash command"
                );
                return Ok(HandlerResult::Ignored);
            }
        };

        match self.router.route(command, payload, ctx).await {
            Ok(()) => Ok(HandlerResult::Processed),
            Err(error) => {
                warn!(
                    event_name = "slack.command.failed",
                    correlation_id = %ctx.correlation_id,
                    command = %payload.command,
                    user_id = %payload.user_id,
                    error = %error,
                    "slash command failed"
                );
                let interface = ApplicationError::from(error).into_interface(&ctx.correlation_id);
                Ok(HandlerResult::Notice(interface.user_message().to_owned()))
            }
        }
    }
}

#[async_trait]
pub trait BlockActionService: Send + Sync {
    async fn handle_block_action(
        &self,
        event: &BlockActionEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

pub struct BlockActionHandler<S> {
    service: S,
}

impl<S> BlockActionHandler<S>
where
    S: BlockActionService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for BlockActionHandler<S>
where
    S: BlockActionService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::BlockAction
    }

    async fn handle(
        &self,
        event: &SlackEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::BlockAction(action) = event else {
            return Ok(HandlerResult::Ignored);
        };

        self.service.handle_block_action(action, ctx).await
    }
}

#[async_trait]
impl<T> BlockActionService for Arc<T>
where
    T: BlockActionService + ?Sized,
{
    async fn handle_block_action(
        &self,
        event: &BlockActionEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        (**self).handle_block_action(event, ctx).await
    }
}

#[async_trait]
pub trait ViewSubmissionService: Send + Sync {
    /// `None` acknowledges without closing or annotating the dialog.
    async fn handle_view_submission(
        &self,
        event: &ViewSubmissionEvent,
        ctx: &EventContext,
    ) -> Result<Option<ViewSubmissionResponse>, EventHandlerError>;
}

#[async_trait]
impl<T> ViewSubmissionService for Arc<T>
where
    T: ViewSubmissionService + ?Sized,
{
    async fn handle_view_submission(
        &self,
        event: &ViewSubmissionEvent,
        ctx: &EventContext,
    ) -> Result<Option<ViewSubmissionResponse>, EventHandlerError> {
        (**self).handle_view_submission(event, ctx).await
    }
}

pub struct ViewSubmissionHandler<S> {
    service: S,
}

impl<S> ViewSubmissionHandler<S>
where
    S: ViewSubmissionService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for ViewSubmissionHandler<S>
where
    S: ViewSubmissionService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::ViewSubmission
    }

    async fn handle(
        &self,
        event: &SlackEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::ViewSubmission(submission) = event else {
            return Ok(HandlerResult::Ignored);
        };

        Ok(match self.service.handle_view_submission(submission, ctx).await? {
            Some(response) => HandlerResult::ViewResponse(response),
            None => HandlerResult::Processed,
        })
    }
}
