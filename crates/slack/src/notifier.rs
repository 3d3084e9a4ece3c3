use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use deskbook_core::config::SlackConfig;
use deskbook_core::domain::announcement::MessageRef;

use crate::blocks::{Block, MessageTemplate, ModalView};

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("slack request failed: {0}")]
    Http(String),
    #[error("slack api returned error `{0}`")]
    Api(String),
    #[error("could not decode slack response: {0}")]
    Decode(String),
}

/// Outbound side of the Slack platform.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn open_dialog(&self, trigger_id: &str, view: &ModalView) -> Result<(), NotifierError>;

    /// `hash` guards against overwriting a newer version of the view.
    async fn update_dialog(
        &self,
        view_id: &str,
        view: &ModalView,
        hash: Option<&str>,
    ) -> Result<(), NotifierError>;

    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<MessageRef, NotifierError>;

    async fn edit_message(
        &self,
        channel: &str,
        message_ref: &MessageRef,
        message: &MessageTemplate,
    ) -> Result<(), NotifierError>;
}

pub struct SlackWebApiClient {
    client: Client,
    base_url: String,
    bot_token: SecretString,
}

#[derive(Serialize)]
struct ViewsOpenRequest<'a> {
    trigger_id: &'a str,
    view: &'a ModalView,
}

#[derive(Serialize)]
struct ViewsUpdateRequest<'a> {
    view_id: &'a str,
    view: &'a ModalView,
    #[serde(skip_serializing_if = "Option::is_none")]
    hash: Option<&'a str>,
}

#[derive(Serialize)]
struct ChatMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "no_blocks")]
    blocks: &'a [Block],
    #[serde(skip_serializing_if = "Option::is_none")]
    ts: Option<&'a str>,
}

fn no_blocks(blocks: &&[Block]) -> bool {
    blocks.is_empty()
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

impl SlackWebApiClient {
    pub fn new(
        base_url: &str,
        bot_token: SecretString,
        timeout_secs: u64,
    ) -> Result<Self, NotifierError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|error| NotifierError::Http(error.to_string()))?;

        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_owned(), bot_token })
    }

    pub fn from_config(config: &SlackConfig) -> Result<Self, NotifierError> {
        Self::new(&config.api_base_url, config.bot_token.clone(), config.timeout_secs)
    }

    async fn call<T: Serialize + Sync>(
        &self,
        method: &str,
        body: &T,
    ) -> Result<ApiResponse, NotifierError> {
        let response = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .bearer_auth(self.bot_token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|error| NotifierError::Http(error.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifierError::Http(format!(
                "{method} returned HTTP {}",
                response.status()
            )));
        }

        let payload: ApiResponse =
            response.json().await.map_err(|error| NotifierError::Decode(error.to_string()))?;
        if !payload.ok {
            return Err(NotifierError::Api(
                payload.error.unwrap_or_else(|| "unknown_error".to_owned()),
            ));
        }
        Ok(payload)
    }
}

#[async_trait]
impl Notifier for SlackWebApiClient {
    async fn open_dialog(&self, trigger_id: &str, view: &ModalView) -> Result<(), NotifierError> {
        self.call("views.open", &ViewsOpenRequest { trigger_id, view }).await.map(|_| ())
    }

    async fn update_dialog(
        &self,
        view_id: &str,
        view: &ModalView,
        hash: Option<&str>,
    ) -> Result<(), NotifierError> {
        self.call("views.update", &ViewsUpdateRequest { view_id, view, hash }).await.map(|_| ())
    }

    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<MessageRef, NotifierError> {
        let request = ChatMessageRequest {
            channel,
            text: &message.fallback_text,
            blocks: &message.blocks,
            ts: None,
        };
        let payload = self.call("chat.postMessage", &request).await?;
        payload
            .ts
            .map(MessageRef)
            .ok_or_else(|| {
                NotifierError::Decode("chat.postMessage response has no `ts`".to_owned())
            })
    }

    async fn edit_message(
        &self,
        channel: &str,
        message_ref: &MessageRef,
        message: &MessageTemplate,
    ) -> Result<(), NotifierError> {
        let request = ChatMessageRequest {
            channel,
            text: &message.fallback_text,
            blocks: &message.blocks,
            ts: Some(&message_ref.0),
        };
        self.call("chat.update", &request).await.map(|_| ())
    }
}

/// One outbound call captured by [`RecordingNotifier`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NotifierCall {
    OpenDialog { trigger_id: String, view: ModalView },
    UpdateDialog { view_id: String, hash: Option<String>, view: ModalView },
    PostMessage { channel: String, message: MessageTemplate },
    EditMessage { channel: String, message_ref: MessageRef, message: MessageTemplate },
}

/// In-process notifier that records every call. Can be switched to fail so
/// callers' best-effort paths can be exercised.
#[derive(Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<NotifierCall>>,
    failing: AtomicBool,
    next_ts: AtomicU64,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn calls(&self) -> Vec<NotifierCall> {
        self.calls.lock().await.clone()
    }

    async fn record(&self, call: NotifierCall) -> Result<(), NotifierError> {
        self.calls.lock().await.push(call);
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifierError::Api("message_not_found".to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn open_dialog(&self, trigger_id: &str, view: &ModalView) -> Result<(), NotifierError> {
        self.record(NotifierCall::OpenDialog {
            trigger_id: trigger_id.to_owned(),
            view: view.clone(),
        })
        .await
    }

    async fn update_dialog(
        &self,
        view_id: &str,
        view: &ModalView,
        hash: Option<&str>,
    ) -> Result<(), NotifierError> {
        self.record(NotifierCall::UpdateDialog {
            view_id: view_id.to_owned(),
            hash: hash.map(str::to_owned),
            view: view.clone(),
        })
        .await
    }

    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<MessageRef, NotifierError> {
        self.record(NotifierCall::PostMessage {
            channel: channel.to_owned(),
            message: message.clone(),
        })
        .await?;
        let sequence = self.next_ts.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MessageRef(format!("1718000000.{sequence:06}")))
    }

    async fn edit_message(
        &self,
        channel: &str,
        message_ref: &MessageRef,
        message: &MessageTemplate,
    ) -> Result<(), NotifierError> {
        self.record(NotifierCall::EditMessage {
            channel: channel.to_owned(),
            message_ref: message_ref.clone(),
            message: message.clone(),
        })
        .await
    }
}
