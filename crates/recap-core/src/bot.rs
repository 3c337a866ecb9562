//! Bot runtime
//!
//! Consumes the transport's event stream. Plain messages are appended inline
//! so buffer order matches arrival order; commands run on their own tasks so
//! a slow summary never blocks ingestion.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::buffer::BufferManager;
use crate::commands::CommandHandler;
use crate::config::Config;
use crate::llm::Generator;
use crate::storage::Database;
use crate::summary::Summarizer;
use crate::transport::{InboundEvent, Transport};

/// The assembled bot
pub struct Bot {
    handler: Arc<CommandHandler>,
    transport: Arc<dyn Transport>,
}

impl Bot {
    pub fn new(handler: Arc<CommandHandler>, transport: Arc<dyn Transport>) -> Self {
        Self { handler, transport }
    }

    /// Wire up a bot from configuration and its collaborators
    pub fn from_config(
        config: &Config,
        db: Database,
        generator: Arc<dyn Generator>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let buffers = Arc::new(BufferManager::new(config.buffer.capacity));
        let summarizer = Summarizer::new(buffers.clone(), generator, config.llm.clone());
        let handler = CommandHandler::new(
            buffers,
            db,
            summarizer,
            transport.clone(),
            config.buffer.default_window,
        );
        Self::new(Arc::new(handler), transport)
    }

    pub fn handler(&self) -> &Arc<CommandHandler> {
        &self.handler
    }

    /// Run until `cancel` fires or the transport stops producing events
    ///
    /// Commands still in flight are awaited before returning.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut events = self.transport.start_receiving(cancel.clone());
        let mut tasks = JoinSet::new();

        info!(transport = self.transport.name(), "Bot started");

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.next() => event,
            };
            let Some(event) = event else {
                debug!("Event stream ended");
                break;
            };

            self.dispatch(event, &mut tasks).await;

            while let Some(result) = tasks.try_join_next() {
                log_task_result(result);
            }
        }

        if !tasks.is_empty() {
            info!(pending = tasks.len(), "Waiting for in-flight commands");
        }
        while let Some(result) = tasks.join_next().await {
            log_task_result(result);
        }

        info!("Bot stopped");
    }

    async fn dispatch(&self, event: InboundEvent, tasks: &mut JoinSet<()>) {
        if event.is_command() {
            let handler = self.handler.clone();
            tasks.spawn(async move { handler.handle(&event).await });
        } else {
            self.handler.ingest(&event).await;
        }
    }
}

fn log_task_result(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        error!(error = %e, "Command task failed");
    }
}
