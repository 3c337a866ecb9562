//! Chat commands
//!
//! Maps parsed bot commands onto operations over the buffer manager, the
//! nickname store and the summarizer.

mod handler;

use crate::transport::BotCommand;

pub use handler::{CommandHandler, HELP_TEXT};

/// What a `/nickname` invocation asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NicknameAction {
    Show,
    Set(String),
    Clear,
}

/// A recognised chat command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/start` or `/help`
    Start,
    /// `/nickname [name|off]`
    Nickname(NicknameAction),
    /// `/sum [N]`, with the raw count argument
    Sum(Option<String>),
    /// `/clear`
    Clear,
    /// `/debug`
    Debug,
}

impl Command {
    /// Recognise a bot command; unknown names yield `None`
    pub fn from_bot_command(command: &BotCommand) -> Option<Self> {
        let parsed = match command.name.as_str() {
            "start" | "help" => Self::Start,
            "nickname" => {
                let name = command.args.join(" ");
                let action = match name.trim() {
                    "" => NicknameAction::Show,
                    off if off.eq_ignore_ascii_case("off") => NicknameAction::Clear,
                    name => NicknameAction::Set(name.to_string()),
                };
                Self::Nickname(action)
            }
            "sum" => Self::Sum(command.arg().map(str::to_string)),
            "clear" => Self::Clear,
            "debug" => Self::Debug,
            _ => return None,
        };
        Some(parsed)
    }

    /// Command name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Nickname(_) => "nickname",
            Self::Sum(_) => "sum",
            Self::Clear => "clear",
            Self::Debug => "debug",
        }
    }
}
