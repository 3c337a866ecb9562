//! Summarization pipeline
//!
//! Selects a window from a conversation buffer, builds the prompt and waits
//! for the generation backend under a bounded timeout. Clearing the buffer is
//! left to the caller, once the summary has actually been produced.

pub mod prompt;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::buffer::BufferManager;
use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::ids::ConversationId;
use crate::llm::Generator;

pub use prompt::build as build_request;

/// Produces summaries for conversation buffers
pub struct Summarizer {
    buffers: Arc<BufferManager>,
    generator: Arc<dyn Generator>,
    config: LlmConfig,
}

impl Summarizer {
    pub fn new(buffers: Arc<BufferManager>, generator: Arc<dyn Generator>, config: LlmConfig) -> Self {
        Self {
            buffers,
            generator,
            config,
        }
    }

    /// Timeout applied to a single generation call
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.summary_timeout_secs)
    }

    /// Summarize the last `count` lines of a conversation
    ///
    /// Never mutates the buffer. The window is copied out before the backend
    /// is awaited, so appends proceed while the call is in flight.
    pub async fn summarize(&self, conversation: ConversationId, count: usize) -> Result<String> {
        let window = self
            .buffers
            .select_window(conversation, count)
            .ok_or(Error::EmptySelection)?;

        let request = prompt::build(&window, &self.config);
        debug!(
            conversation_id = %conversation,
            lines = window.len(),
            model = %request.model,
            "Requesting summary"
        );

        let timeout = self.timeout();
        let text = match tokio::time::timeout(timeout, self.generator.complete(&request)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    conversation_id = %conversation,
                    timeout_secs = timeout.as_secs(),
                    "Summary generation timed out"
                );
                return Err(Error::GenerationTimeout(timeout.as_secs()));
            }
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(Error::LLMError("Backend returned an empty summary".to_string()));
        }

        info!(conversation_id = %conversation, lines = window.len(), "Summary generated");
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatRequest;
    use crate::nickname::DisplayName;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Scripted {
        reply: Result<String>,
        delay: Option<Duration>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl Scripted {
        fn ok(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                delay: None,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Generator for Scripted {
        async fn complete(&self, request: &ChatRequest) -> Result<String> {
            self.seen.lock().unwrap().push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(Error::LLMError(e.to_string())),
            }
        }
    }

    fn seeded() -> Arc<BufferManager> {
        let buffers = Arc::new(BufferManager::default());
        let id = ConversationId(1);
        buffers.append(id, &DisplayName::resolve(None, Some("A")), "hi");
        buffers.append(id, &DisplayName::resolve(None, Some("B")), "yo");
        buffers
    }

    #[tokio::test]
    async fn test_summarize_success_leaves_buffer() {
        let buffers = seeded();
        let generator = Arc::new(Scripted::ok("  A and B said hello.  "));
        let summarizer = Summarizer::new(buffers.clone(), generator.clone(), LlmConfig::default());

        let text = summarizer.summarize(ConversationId(1), 5).await.unwrap();
        assert_eq!(text, "A and B said hello.");
        assert_eq!(buffers.count(ConversationId(1)), 2);

        let seen = generator.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].messages.last().unwrap().content, "A: hi\nB: yo");
    }

    #[tokio::test]
    async fn test_empty_selection_skips_backend() {
        let buffers = Arc::new(BufferManager::default());
        let generator = Arc::new(Scripted::ok("unused"));
        let summarizer = Summarizer::new(buffers, generator.clone(), LlmConfig::default());

        let err = summarizer.summarize(ConversationId(9), 5).await.unwrap_err();
        assert!(matches!(err, Error::EmptySelection));
        assert!(generator.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let generator = Arc::new(Scripted {
            reply: Err(Error::LLMError("down".to_string())),
            delay: None,
            seen: Mutex::new(Vec::new()),
        });
        let summarizer = Summarizer::new(seeded(), generator, LlmConfig::default());

        let err = summarizer.summarize(ConversationId(1), 5).await.unwrap_err();
        assert!(matches!(err, Error::LLMError(_)));
    }

    #[tokio::test]
    async fn test_blank_summary_is_failure() {
        let summarizer = Summarizer::new(seeded(), Arc::new(Scripted::ok("   ")), LlmConfig::default());
        let err = summarizer.summarize(ConversationId(1), 5).await.unwrap_err();
        assert!(matches!(err, Error::LLMError(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let generator = Arc::new(Scripted {
            reply: Ok("late".to_string()),
            delay: Some(Duration::from_secs(120)),
            seen: Mutex::new(Vec::new()),
        });
        let config = LlmConfig {
            summary_timeout_secs: 2,
            ..LlmConfig::default()
        };
        let summarizer = Summarizer::new(seeded(), generator, config);

        let err = summarizer.summarize(ConversationId(1), 5).await.unwrap_err();
        assert!(matches!(err, Error::GenerationTimeout(2)));
    }
}
