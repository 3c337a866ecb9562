//! Summary prompt construction
//!
//! The instruction segments are fixed and order-sensitive. Only the final
//! data segment varies, and it carries nothing but the selected window.

use crate::buffer::Window;
use crate::config::LlmConfig;
use crate::llm::{ChatRequest, Message};

/// Narrator role, sent as the leading system segment
const ROLE_INSTRUCTION: &str = "You are an assistant that reads messages from a group chat \
     and retells what happened in it.";

/// Policy segments, sent in order as user segments after the role
const POLICY_INSTRUCTIONS: [&str; 8] = [
    "You will receive messages from the chat. \
     Each message has the format 'Name: message text'.",
    "Your task is to write one coherent short text, like a small story, \
     about what was discussed in the chat. Do not produce a list.",
    "You must mention every person by NAME \
     (the name is given at the start of each message, before the colon).",
    "Describe what each person said in your own words, for example \
     \"Name said that ...\" or \"Name talked about ...\". \
     Paraphrase; never repeat the messages verbatim and do not use the 'Name: ...' format.",
    "Do not invent facts or add anything that is not in the messages.",
    "Do not use @usernames or other technical handles.",
    "Do not use lists, bullet points or any other markup. \
     The answer must be plain connected prose.",
    "At the end, add one short sentence about the overall mood of the chat \
     (for example lively, cheerful, businesslike) if it can be felt from the messages.",
];

/// Build the completion request for a selected window
///
/// Model, token limit and temperature come from configuration only.
pub fn build(window: &Window, config: &LlmConfig) -> ChatRequest {
    debug_assert!(!window.is_empty());

    let mut messages = Vec::with_capacity(POLICY_INSTRUCTIONS.len() + 2);
    messages.push(Message::system(ROLE_INSTRUCTION));
    messages.extend(POLICY_INSTRUCTIONS.iter().map(|text| Message::user(*text)));
    messages.push(Message::system(window.joined()));

    let request = ChatRequest::new(&config.model, messages).with_max_tokens(config.max_tokens);

    match config.temperature {
        Some(temperature) => request.with_temperature(temperature),
        None => request,
    }
}
