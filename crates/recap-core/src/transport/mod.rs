//! Conversation transport boundary
//!
//! A transport turns chat-platform updates into [`InboundEvent`]s and
//! delivers plain-text replies back to a conversation. Delivery failures are
//! reported to the caller, which logs them; they never reach buffer logic.

mod telegram;

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use tokio_util::sync::CancellationToken;

use crate::buffer::COMMAND_PREFIX;
use crate::error::Result;
use crate::ids::{ConversationId, ParticipantId};

pub use telegram::{TelegramTransport, TelegramUser, TELEGRAM_MAX_MESSAGE_CHARS};

/// Stream of inbound events produced by a transport
pub type InboundStream = Pin<Box<dyn Stream<Item = InboundEvent> + Send>>;

/// A bot command such as `/sum 10` or `/sum@recap_bot 10`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotCommand {
    /// Lower-cased command name without the leading slash
    pub name: String,
    /// Whitespace-separated arguments
    pub args: Vec<String>,
    /// Bot username from a `/name@bot` suffix, if present
    pub addressee: Option<String>,
}

impl BotCommand {
    /// Parse a command from message text
    ///
    /// Returns `None` when the text is not a command.
    pub fn parse(text: &str) -> Option<Self> {
        let mut tokens = text.split_whitespace();
        let head = tokens.next()?.strip_prefix(COMMAND_PREFIX)?;

        let (name, addressee) = match head.split_once('@') {
            Some((name, bot)) => (name, Some(bot.to_string()).filter(|b| !b.is_empty())),
            None => (head, None),
        };
        if name.is_empty() {
            return None;
        }

        Some(Self {
            name: name.to_lowercase(),
            args: tokens.map(str::to_string).collect(),
            addressee,
        })
    }

    /// First argument, if any
    pub fn arg(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    /// Whether the command targets the bot with the given username
    ///
    /// Commands without an `@bot` suffix target every bot in the chat.
    pub fn is_addressed_to(&self, username: Option<&str>) -> bool {
        match (&self.addressee, username) {
            (Some(addressee), Some(username)) => addressee.eq_ignore_ascii_case(username),
            _ => true,
        }
    }
}

/// An inbound chat event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub conversation_id: ConversationId,
    pub participant_id: ParticipantId,
    /// Profile name supplied by the platform, used when no nickname is set
    pub author_profile_name: Option<String>,
    pub raw_text: String,
    pub command: Option<BotCommand>,
}

impl InboundEvent {
    /// Build an event from message text, detecting commands
    pub fn new(
        conversation_id: ConversationId,
        participant_id: ParticipantId,
        author_profile_name: Option<String>,
        raw_text: impl Into<String>,
    ) -> Self {
        let raw_text = raw_text.into();
        let command = BotCommand::parse(&raw_text);
        Self {
            conversation_id,
            participant_id,
            author_profile_name,
            raw_text,
            command,
        }
    }

    /// Whether this event is a command
    pub fn is_command(&self) -> bool {
        self.command.is_some()
    }
}

/// Outbound side and event source of a chat platform
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short platform name for logs
    fn name(&self) -> &str;

    /// Username of the bot account, when known
    fn bot_username(&self) -> Option<&str> {
        None
    }

    /// Send a plain-text message to a conversation
    async fn send_text(&self, conversation: ConversationId, text: &str) -> Result<()>;

    /// Start receiving events until `cancel` fires
    fn start_receiving(&self, cancel: CancellationToken) -> InboundStream;
}

/// Split text into chunks of at most `max_chars` characters
///
/// Prefers line boundaries and falls back to a hard cut.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.chars().count() <= max_chars {
            chunks.push(remaining.to_string());
            break;
        }

        // Byte offset just past the first `max_chars` characters
        let hard_end = remaining
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(remaining.len());
        let candidate = &remaining[..hard_end];

        let split_at = match candidate.rfind('\n') {
            Some(pos) if pos > 0 => pos,
            _ => hard_end,
        };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].strip_prefix('\n').unwrap_or(&remaining[split_at..]);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        let cmd = BotCommand::parse("/sum 10").unwrap();
        assert_eq!(cmd.name, "sum");
        assert_eq!(cmd.args, vec!["10"]);
        assert_eq!(cmd.arg(), Some("10"));
        assert_eq!(cmd.addressee, None);
    }

    #[test]
    fn test_parse_command_with_addressee() {
        let cmd = BotCommand::parse("/SUM@Recap_Bot  7 extra").unwrap();
        assert_eq!(cmd.name, "sum");
        assert_eq!(cmd.args, vec!["7", "extra"]);
        assert_eq!(cmd.addressee.as_deref(), Some("Recap_Bot"));
        assert!(cmd.is_addressed_to(Some("recap_bot")));
        assert!(!cmd.is_addressed_to(Some("other_bot")));
        assert!(cmd.is_addressed_to(None));
    }

    #[test]
    fn test_parse_non_commands() {
        assert_eq!(BotCommand::parse("hello /sum"), None);
        assert_eq!(BotCommand::parse("/"), None);
        assert_eq!(BotCommand::parse("/@bot"), None);
        assert_eq!(BotCommand::parse(""), None);
    }

    #[test]
    fn test_leading_whitespace_command() {
        let cmd = BotCommand::parse("   /clear").unwrap();
        assert_eq!(cmd.name, "clear");
        assert!(cmd.args.is_empty());
    }

    #[test]
    fn test_inbound_event_detects_command() {
        let event = InboundEvent::new(ConversationId(1), ParticipantId(2), None, "/debug");
        assert!(event.is_command());

        let event = InboundEvent::new(ConversationId(1), ParticipantId(2), None, "just text");
        assert!(!event.is_command());
    }

    #[test]
    fn test_chunk_short_text() {
        assert_eq!(chunk_text("hello", 4096), vec!["hello"]);
        assert!(chunk_text("", 4096).is_empty());
    }

    #[test]
    fn test_chunk_prefers_newlines() {
        let chunks = chunk_text("aaaa\nbbbb\ncc", 10);
        assert_eq!(chunks, vec!["aaaa\nbbbb", "cc"]);
    }

    #[test]
    fn test_chunk_hard_cut_respects_chars() {
        let text = "é".repeat(10);
        let chunks = chunk_text(&text, 4);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 4));
        assert_eq!(chunks.concat(), text);
    }
}
