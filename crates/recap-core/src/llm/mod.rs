//! LLM integration - chat completions API
//!
//! This module provides:
//! - HTTP client for OpenAI-compatible chat completions
//! - Request/response types matching the API
//! - The [`Generator`] trait the summarizer depends on

mod client;
mod generator;
mod types;

pub use client::{LlmClient, LlmClientBuilder};
pub use generator::Generator;
pub use types::{
    ChatRequest, ChatResponse, Choice, FinishReason, LlmResponse, Message, MessageRole,
    ResponseMessage, Usage,
};
