//! Recap Core Library
//!
//! This crate provides the core functionality for Recap, a group chat
//! summarization bot:
//! - Per-conversation bounded message buffers
//! - Summary prompt construction and the generation backend client
//! - Nickname storage (SQLite)
//! - Telegram transport and command handling
//! - The bot runtime loop

pub mod bot;
pub mod buffer;
pub mod commands;
pub mod config;
pub mod error;
pub mod ids;
pub mod llm;
pub mod nickname;
pub mod storage;
pub mod summary;
pub mod transport;

pub use error::{Error, ErrorKind, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::bot::Bot;
    pub use crate::buffer::BufferManager;
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::ids::{ConversationId, ParticipantId};
    pub use crate::llm::{Generator, LlmClient};
    pub use crate::nickname::{DisplayName, NicknameRepository};
    pub use crate::storage::Database;
    pub use crate::transport::{InboundEvent, TelegramTransport, Transport};
}
