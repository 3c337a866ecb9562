//! Command handling boundary
//!
//! Every failure is turned into exactly one reply here. Delivery failures are
//! logged and never affect buffer state.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::{Command, NicknameAction};
use crate::buffer::{BufferManager, parse_count};
use crate::error::{ErrorKind, Result};
use crate::ids::{ConversationId, ParticipantId};
use crate::nickname::{DisplayName, NicknameRepository};
use crate::storage::Database;
use crate::summary::Summarizer;
use crate::transport::{InboundEvent, Transport};

/// Reply to `/start` and `/help`
pub const HELP_TEXT: &str = "Hi! I keep track of recent messages in this chat and can retell them.\n\
/sum N - summarize the last N messages (5 by default)\n\
/nickname NAME - set the name used for you in summaries, /nickname off to remove it\n\
/clear - forget the buffered messages\n\
/debug - show how many messages are buffered";

/// Handles inbound events for all conversations
pub struct CommandHandler {
    buffers: Arc<BufferManager>,
    db: Database,
    summarizer: Summarizer,
    transport: Arc<dyn Transport>,
    default_window: usize,
}

impl CommandHandler {
    pub fn new(
        buffers: Arc<BufferManager>,
        db: Database,
        summarizer: Summarizer,
        transport: Arc<dyn Transport>,
        default_window: usize,
    ) -> Self {
        Self {
            buffers,
            db,
            summarizer,
            transport,
            default_window,
        }
    }

    pub fn buffers(&self) -> &Arc<BufferManager> {
        &self.buffers
    }

    /// Record a plain message in its conversation buffer
    ///
    /// The author's display name is resolved now and baked into the line.
    pub async fn ingest(&self, event: &InboundEvent) {
        let fallback = event.author_profile_name.as_deref();
        let author = match NicknameRepository::new(&self.db)
            .resolve_display_name(event.participant_id, fallback)
            .await
        {
            Ok(name) => name,
            Err(e) => {
                warn!(
                    participant_id = %event.participant_id,
                    error = %e,
                    "Nickname lookup failed, using profile name"
                );
                DisplayName::resolve(None, fallback)
            }
        };

        if self.buffers.append(event.conversation_id, &author, &event.raw_text) {
            debug!(
                conversation_id = %event.conversation_id,
                lines = self.buffers.count(event.conversation_id),
                "Message buffered"
            );
        }
    }

    /// Handle a command event; unknown commands are ignored
    pub async fn handle(&self, event: &InboundEvent) {
        let Some(command) = event.command.as_ref().and_then(Command::from_bot_command) else {
            return;
        };
        let conversation = event.conversation_id;

        info!(
            conversation_id = %conversation,
            participant_id = %event.participant_id,
            command = command.name(),
            "Handling command"
        );

        match command {
            Command::Start => self.reply(conversation, HELP_TEXT).await,
            Command::Nickname(action) => {
                let text = self
                    .nickname(event.participant_id, action)
                    .await
                    .unwrap_or_else(|e| failure_reply(conversation, &e));
                self.reply(conversation, &text).await;
            }
            Command::Sum(arg) => self.summarize(conversation, arg.as_deref()).await,
            Command::Clear => {
                self.buffers.clear(conversation);
                self.reply(conversation, "Buffer cleared").await;
            }
            Command::Debug => {
                let text = format!("Messages in buffer: {}", self.buffers.count(conversation));
                self.reply(conversation, &text).await;
            }
        }
    }

    async fn summarize(&self, conversation: ConversationId, arg: Option<&str>) {
        let result = match parse_count(arg, self.default_window) {
            Ok(count) => self.summarizer.summarize(conversation, count).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(summary) => {
                self.reply(conversation, &summary).await;
                // Cleared even when delivery failed: the summary was produced.
                self.buffers.clear(conversation);
            }
            Err(e) => {
                let text = failure_reply(conversation, &e);
                self.reply(conversation, &text).await;
            }
        }
    }

    async fn nickname(&self, participant: ParticipantId, action: NicknameAction) -> Result<String> {
        let repo = NicknameRepository::new(&self.db);
        match action {
            NicknameAction::Show => Ok(match repo.get(participant).await? {
                Some(name) => format!("Your nickname: {}", name),
                None => "You have no nickname. Summaries use your profile name.".to_string(),
            }),
            NicknameAction::Set(name) => {
                let stored = repo.set(participant, &name).await?;
                Ok(format!("Nickname set: {}", stored))
            }
            NicknameAction::Clear => {
                repo.clear(participant).await?;
                Ok("Nickname removed. Summaries will use your profile name.".to_string())
            }
        }
    }

    async fn reply(&self, conversation: ConversationId, text: &str) {
        if let Err(e) = self.transport.send_text(conversation, text).await {
            error!(
                conversation_id = %conversation,
                transport = self.transport.name(),
                error = %e,
                "Failed to deliver reply"
            );
        }
    }
}

fn failure_reply(conversation: ConversationId, e: &crate::error::Error) -> String {
    match e.kind() {
        ErrorKind::InvalidArgument | ErrorKind::EmptySelection => {
            debug!(conversation_id = %conversation, code = e.code(), error = %e, "Command rejected");
        }
        _ => {
            error!(conversation_id = %conversation, code = e.code(), error = %e, "Command failed");
        }
    }
    e.user_message()
}

impl std::fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandler")
            .field("conversations", &self.buffers.conversation_count())
            .field("default_window", &self.default_window)
            .finish()
    }
}
