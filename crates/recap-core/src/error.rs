//! Error types for Recap

use thiserror::Error;

/// Result type alias using Recap's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Broad failure classes used at the command-handling boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad user input; nothing was mutated
    InvalidArgument,
    /// The selected window contained no eligible lines
    EmptySelection,
    /// The generation backend failed or timed out
    BackendFailure,
    /// Outbound delivery failed
    TransportFailure,
    /// Storage, configuration or I/O problems
    Internal,
}

/// Recap error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Input errors (E100-E199)
    #[error("Invalid message count '{0}'. Use a positive whole number, e.g. /sum 5")]
    InvalidCount(String),

    #[error("Nickname is {0} characters long; the limit is {1}")]
    NicknameTooLong(usize, usize),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Selection errors (E200-E299)
    #[error("No eligible messages in the buffer to summarize")]
    EmptySelection,

    // Backend errors (E300-E399)
    #[error("Network error: {0}. Check your internet connection.")]
    NetworkError(#[from] reqwest::Error),

    #[error("LLM API error: {0}")]
    LLMError(String),

    #[error("Rate limited. Waiting {0} seconds before retry.")]
    RateLimited(u64),

    #[error("Summary generation timed out after {0} seconds")]
    GenerationTimeout(u64),

    // Transport errors (E400-E499)
    #[error("Transport error: {0}")]
    TransportError(String),

    // Database errors (E500-E599)
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCount(_) => "E100",
            Self::NicknameTooLong(..) => "E101",
            Self::InvalidInput(_) => "E102",
            Self::EmptySelection => "E200",
            Self::NetworkError(_) => "E300",
            Self::LLMError(_) => "E301",
            Self::RateLimited(_) => "E302",
            Self::GenerationTimeout(_) => "E303",
            Self::TransportError(_) => "E400",
            Self::DatabaseError(_) => "E500",
            Self::ConfigError(_) => "E600",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Classify the error for the command-handling boundary
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidCount(_) | Self::NicknameTooLong(..) | Self::InvalidInput(_) => {
                ErrorKind::InvalidArgument
            }
            Self::EmptySelection => ErrorKind::EmptySelection,
            Self::NetworkError(_)
            | Self::LLMError(_)
            | Self::RateLimited(_)
            | Self::GenerationTimeout(_) => ErrorKind::BackendFailure,
            Self::TransportError(_) => ErrorKind::TransportFailure,
            Self::DatabaseError(_) | Self::ConfigError(_) | Self::Other(_) | Self::Io(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Text shown to chat participants when a command fails
    ///
    /// Backend and internal failures get a generic explanation so provider
    /// details and credentials never leak into the chat.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidCount(_) => {
                "Please put a positive number after the command, for example: /sum 5".to_string()
            }
            Self::NicknameTooLong(_, max) => {
                format!("That nickname is too long. Please keep it within {} characters.", max)
            }
            Self::InvalidInput(msg) => format!("Invalid input: {}", msg),
            Self::EmptySelection => {
                "There are no suitable messages in the buffer to summarize.".to_string()
            }
            Self::GenerationTimeout(_) => {
                "The summary took too long to generate. Please try again in a moment.".to_string()
            }
            Self::NetworkError(_) | Self::LLMError(_) | Self::RateLimited(_) => {
                "Failed to generate the summary. Please try again later.".to_string()
            }
            Self::TransportError(_)
            | Self::DatabaseError(_)
            | Self::ConfigError(_)
            | Self::Other(_)
            | Self::Io(_) => "Something went wrong while handling that command.".to_string(),
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::InvalidCount(_) => Some("/sum 5".to_string()),
            Self::NicknameTooLong(_, max) => {
                Some(format!("Pick a nickname of at most {} characters", max))
            }
            Self::NetworkError(_) => Some("Check internet connection".to_string()),
            Self::LLMError(_) => Some("recap config get llm.api_key".to_string()),
            Self::ConfigError(_) => Some("recap config list".to_string()),
            Self::DatabaseError(_) => Some("recap doctor".to_string()),
            _ => None,
        }
    }
}
