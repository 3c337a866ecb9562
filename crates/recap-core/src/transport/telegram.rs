//! Telegram Bot API transport
//!
//! Receives messages through `getUpdates` long polling and replies with
//! `sendMessage`. Only text messages from users are forwarded.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{InboundEvent, InboundStream, Transport, chunk_text};
use crate::error::{Error, Result};
use crate::ids::{ConversationId, ParticipantId};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Telegram hard limit for text messages
pub const TELEGRAM_MAX_MESSAGE_CHARS: usize = 4096;

/// Default timeout for non-polling API calls (seconds)
const API_TIMEOUT_SECS: u64 = 30;

/// Pause after a failed poll
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Telegram transport
#[derive(Clone)]
pub struct TelegramTransport {
    client: Client,
    token: String,
    api_base: String,
    polling_timeout: u32,
    /// Offset for the next `getUpdates` call
    next_offset: Arc<AtomicI64>,
    username: Arc<OnceLock<String>>,
}

impl std::fmt::Debug for TelegramTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramTransport")
            .field("api_base", &self.api_base)
            .field("polling_timeout", &self.polling_timeout)
            .field("username", &self.username.get())
            .finish()
    }
}

impl TelegramTransport {
    /// Create a transport for the given bot token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            api_base: TELEGRAM_API_BASE.to_string(),
            polling_timeout: 30,
            next_offset: Arc::new(AtomicI64::new(0)),
            username: Arc::new(OnceLock::new()),
        }
    }

    /// Set the long-polling timeout
    pub fn with_polling_timeout(mut self, secs: u32) -> Self {
        self.polling_timeout = secs;
        self
    }

    /// Point the transport at a different Bot API server
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    /// Offset that the next poll will send
    pub fn next_offset(&self) -> i64 {
        self.next_offset.load(Ordering::SeqCst)
    }

    /// Check the token by calling `getMe` and remember the bot username
    pub async fn identify(&self) -> Result<TelegramUser> {
        let response = self
            .client
            .get(self.api_url("getMe"))
            .timeout(Duration::from_secs(API_TIMEOUT_SECS))
            .send()
            .await
            .map_err(transport_error)?;

        let body: TelegramResponse<TelegramUser> =
            response.json().await.map_err(transport_error)?;
        let user = body.into_result()?;

        if let Some(username) = &user.username {
            let _ = self.username.set(username.clone());
        }
        info!(username = ?user.username, "Connected to Telegram");
        Ok(user)
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let params = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });

        let response = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&params)
            .timeout(Duration::from_secs(API_TIMEOUT_SECS))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::TransportError(format!(
                "Telegram HTTP error {}: {}",
                status, body
            )));
        }

        let body: TelegramResponse<serde_json::Value> =
            response.json().await.map_err(transport_error)?;
        body.into_result().map(|_| ())
    }

    async fn poll_updates(&self) -> Result<Vec<TelegramUpdate>> {
        let params = serde_json::json!({
            "offset": self.next_offset(),
            "timeout": self.polling_timeout,
            "allowed_updates": ["message"],
        });

        let response = self
            .client
            .post(self.api_url("getUpdates"))
            .json(&params)
            .timeout(Duration::from_secs(self.polling_timeout as u64 + 10))
            .send()
            .await
            .map_err(transport_error)?;

        let body: TelegramResponse<Vec<TelegramUpdate>> =
            response.json().await.map_err(transport_error)?;
        let updates = body.into_result()?;

        if let Some(last) = updates.last() {
            self.next_offset.store(last.update_id + 1, Ordering::SeqCst);
        }

        Ok(updates)
    }

    fn convert_update(&self, update: TelegramUpdate) -> Option<InboundEvent> {
        let message = update.message?;
        let from = message.from?;
        let text = message.text?;

        let profile_name = [from.first_name.as_deref(), from.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let event = InboundEvent::new(
            ConversationId(message.chat.id),
            ParticipantId(from.id),
            Some(profile_name).filter(|name| !name.is_empty()),
            text,
        );

        if let Some(command) = &event.command
            && !command.is_addressed_to(self.username.get().map(String::as_str))
        {
            debug!(command = %command.name, "Ignoring command addressed to another bot");
            return None;
        }

        Some(event)
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    fn name(&self) -> &str {
        "telegram"
    }

    fn bot_username(&self) -> Option<&str> {
        self.username.get().map(String::as_str)
    }

    async fn send_text(&self, conversation: ConversationId, text: &str) -> Result<()> {
        for chunk in chunk_text(text, TELEGRAM_MAX_MESSAGE_CHARS) {
            self.send_message(conversation.0, &chunk).await?;
        }
        Ok(())
    }

    fn start_receiving(&self, cancel: CancellationToken) -> InboundStream {
        let transport = self.clone();

        Box::pin(async_stream::stream! {
            info!("Starting Telegram polling");

            loop {
                let polled = tokio::select! {
                    _ = cancel.cancelled() => break,
                    polled = transport.poll_updates() => polled,
                };

                match polled {
                    Ok(updates) => {
                        for update in updates {
                            if let Some(event) = transport.convert_update(update) {
                                yield event;
                            }
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Telegram polling error");
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(POLL_ERROR_BACKOFF) => {}
                        }
                    }
                }
            }

            info!("Telegram polling stopped");
        })
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    warn!(error = %e, "Telegram request failed");
    Error::TransportError(e.without_url().to_string())
}

// Telegram API types

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> TelegramResponse<T> {
    fn into_result(self) -> Result<T> {
        if !self.ok {
            return Err(Error::TransportError(format!(
                "Telegram API error: {}",
                self.description.unwrap_or_default()
            )));
        }
        self.result
            .ok_or_else(|| Error::TransportError("Telegram returned ok but no result".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    from: Option<TelegramUser>,
    chat: TelegramChat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

/// A Telegram account
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
}
