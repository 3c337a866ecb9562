//! The generation backend seam
//!
//! The summarizer only needs "request in, text out"; tests substitute their
//! own implementations.

use async_trait::async_trait;

use super::client::LlmClient;
use super::types::ChatRequest;
use crate::error::Result;

/// A remote text-completion service
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce text for the request, or fail
    async fn complete(&self, request: &ChatRequest) -> Result<String>;
}

#[async_trait]
impl Generator for LlmClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let response = self.complete_request(request).await?;
        Ok(response.content.trim().to_string())
    }
}
