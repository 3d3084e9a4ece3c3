//! Inbound Slack endpoint.
//!
//! Slash commands and interactive payloads both arrive form-encoded at
//! `POST /slack/interactions`. The response is always 200 so Slack never
//! retries; failures are logged and acknowledged with an empty body.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Form, Json, Router,
};
use chrono::Local;
use deskbook_slack::events::{parse_form, EventContext, EventDispatcher, HandlerResult};
use tracing::{debug, error, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct InteractionState {
    dispatcher: Arc<EventDispatcher>,
}

pub fn router(dispatcher: Arc<EventDispatcher>) -> Router {
    Router::new()
        .route("/slack/interactions", post(interaction))
        .with_state(InteractionState { dispatcher })
}

pub async fn interaction(
    State(state): State<InteractionState>,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    let ctx = EventContext::new(Uuid::new_v4().simple().to_string(), Local::now().date_naive());

    let event = match parse_form(&fields) {
        Ok(event) => event,
        Err(error) => {
            warn!(
                event_name = "slack.payload.rejected",
                correlation_id = %ctx.correlation_id,
                error = %error,
                "malformed slack payload acknowledged without action"
            );
            return StatusCode::OK.into_response();
        }
    };

    match state.dispatcher.dispatch(&event, &ctx).await {
        Ok(HandlerResult::ViewResponse(response)) => Json(response).into_response(),
        Ok(HandlerResult::Notice(text)) => text.into_response(),
        Ok(result) => {
            debug!(
                event_name = "slack.event.acknowledged",
                correlation_id = %ctx.correlation_id,
                event_type = ?event.event_type(),
                result = ?result,
                "slack event acknowledged"
            );
            StatusCode::OK.into_response()
        }
        Err(dispatch_error) => {
            error!(
                event_name = "slack.event.failed",
                correlation_id = %ctx.correlation_id,
                event_type = ?event.event_type(),
                error = %dispatch_error,
                "slack event handler failed"
            );
            StatusCode::OK.into_response()
        }
    }
}
