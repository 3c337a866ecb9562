//! Recap Core Integration Tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use recap_core::{
    Error, ErrorKind, Result,
    bot::Bot,
    buffer::BufferManager,
    commands::CommandHandler,
    config::{Config, LlmConfig},
    ids::{ConversationId, ParticipantId},
    llm::{ChatRequest, Generator, LlmClient},
    nickname::NicknameRepository,
    storage::Database,
    summary::Summarizer,
    transport::{InboundEvent, InboundStream, Transport},
};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<(ConversationId, String)>>,
    inbound: Mutex<Vec<InboundEvent>>,
}

impl RecordingTransport {
    fn replies_to(&self, conversation: ConversationId) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == conversation)
            .map(|(_, t)| t.clone())
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send_text(&self, conversation: ConversationId, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push((conversation, text.to_string()));
        Ok(())
    }

    fn start_receiving(&self, _cancel: CancellationToken) -> InboundStream {
        let events = std::mem::take(&mut *self.inbound.lock().unwrap());
        Box::pin(futures_util::stream::iter(events))
    }
}

struct FailingTransport;

#[async_trait]
impl Transport for FailingTransport {
    fn name(&self) -> &str {
        "failing"
    }

    async fn send_text(&self, _conversation: ConversationId, _text: &str) -> Result<()> {
        Err(Error::TransportError("chat not found".to_string()))
    }

    fn start_receiving(&self, _cancel: CancellationToken) -> InboundStream {
        Box::pin(futures_util::stream::empty())
    }
}

fn message(conversation: i64, participant: i64, name: &str, text: &str) -> InboundEvent {
    InboundEvent::new(
        ConversationId(conversation),
        ParticipantId(participant),
        Some(name.to_string()),
        text,
    )
}

fn completion(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-1",
        "model": "gpt-4o-mini",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 50, "completion_tokens": 20, "total_tokens": 70}
    })
}

async fn setup(
    generator: Arc<dyn Generator>,
    llm: LlmConfig,
    transport: Arc<dyn Transport>,
) -> CommandHandler {
    let buffers = Arc::new(BufferManager::default());
    let db = Database::in_memory().await.unwrap();
    let summarizer = Summarizer::new(buffers.clone(), generator, llm);
    CommandHandler::new(buffers, db, summarizer, transport, 5)
}

fn client_for(server: &MockServer, llm: &LlmConfig) -> Arc<dyn Generator> {
    Arc::new(
        LlmClient::builder()
            .config(llm.clone())
            .api_key("sk-test")
            .base_url(server.uri())
            .max_attempts(1)
            .build()
            .unwrap(),
    )
}

#[tokio::test]
async fn test_summary_round_trip_through_http_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Alex said hi and Bo answered.")))
        .expect(1)
        .mount(&server)
        .await;

    let llm = LlmConfig::default();
    let transport = Arc::new(RecordingTransport::default());
    let handler = setup(client_for(&server, &llm), llm, transport.clone()).await;

    handler.ingest(&message(1, 10, "Alex", "hi")).await;
    handler.ingest(&message(1, 11, "Bo", "yo")).await;
    handler.handle(&message(1, 10, "Alex", "/sum 5")).await;

    assert_eq!(
        transport.replies_to(ConversationId(1)),
        vec!["Alex said hi and Bo answered."]
    );
    assert_eq!(handler.buffers().count(ConversationId(1)), 0);

    let requests: Vec<Request> = server.received_requests().await.unwrap();
    let body: serde_json::Value = requests[0].body_json().unwrap();
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["max_tokens"], 300);
    assert!(body.get("temperature").is_none());
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.first().unwrap()["role"], "system");
    assert_eq!(messages.last().unwrap()["role"], "system");
    assert_eq!(messages.last().unwrap()["content"], "Alex: hi\nBo: yo");
}

#[tokio::test]
async fn test_backend_failure_leaves_buffer_identical() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal: key sk-leak"))
        .mount(&server)
        .await;

    let llm = LlmConfig::default();
    let transport = Arc::new(RecordingTransport::default());
    let handler = setup(client_for(&server, &llm), llm, transport.clone()).await;

    handler.ingest(&message(1, 10, "Alex", "hi")).await;
    handler.ingest(&message(1, 11, "Bo", "/shrug")).await;
    let before = handler.buffers().snapshot(ConversationId(1));

    handler.handle(&message(1, 10, "Alex", "/sum")).await;

    assert_eq!(handler.buffers().snapshot(ConversationId(1)), before);
    let replies = transport.replies_to(ConversationId(1));
    assert_eq!(replies.len(), 1);
    assert!(!replies[0].contains("sk-leak"));
}

#[tokio::test]
async fn test_slow_backend_times_out_and_keeps_buffer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("too late"))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let llm = LlmConfig {
        summary_timeout_secs: 1,
        ..LlmConfig::default()
    };
    let transport = Arc::new(RecordingTransport::default());
    let handler = setup(client_for(&server, &llm), llm, transport.clone()).await;

    handler.ingest(&message(1, 10, "Alex", "hi")).await;
    handler.handle(&message(1, 10, "Alex", "/sum")).await;

    assert_eq!(handler.buffers().count(ConversationId(1)), 1);
    let replies = transport.replies_to(ConversationId(1));
    assert_eq!(replies, vec![Error::GenerationTimeout(1).user_message()]);
}

struct Gate {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl Generator for Gate {
    async fn complete(&self, _request: &ChatRequest) -> Result<String> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok("done".to_string())
    }
}

#[tokio::test]
async fn test_appends_continue_during_summary() {
    let gate = Arc::new(Gate {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let transport = Arc::new(RecordingTransport::default());
    let handler = Arc::new(setup(gate.clone(), LlmConfig::default(), transport.clone()).await);

    handler.ingest(&message(1, 10, "Alex", "first")).await;

    let summarizing = {
        let handler = handler.clone();
        tokio::spawn(async move { handler.handle(&message(1, 10, "Alex", "/sum")).await })
    };

    gate.entered.notified().await;
    handler.ingest(&message(1, 11, "Bo", "during")).await;
    assert_eq!(handler.buffers().count(ConversationId(1)), 2);

    gate.release.notify_one();
    summarizing.await.unwrap();

    assert_eq!(transport.replies_to(ConversationId(1)), vec!["done"]);
    assert_eq!(handler.buffers().count(ConversationId(1)), 0);
}

#[tokio::test]
async fn test_conversations_are_isolated() {
    struct Picky;

    #[async_trait]
    impl Generator for Picky {
        async fn complete(&self, request: &ChatRequest) -> Result<String> {
            let data = &request.messages.last().unwrap().content;
            if data.contains("boom") {
                Err(Error::LLMError("refused".to_string()))
            } else {
                Ok(format!("ok: {}", data))
            }
        }
    }

    let transport = Arc::new(RecordingTransport::default());
    let handler = setup(Arc::new(Picky), LlmConfig::default(), transport.clone()).await;

    handler.ingest(&message(1, 10, "Alex", "boom")).await;
    handler.ingest(&message(2, 10, "Alex", "calm")).await;

    handler.handle(&message(1, 10, "Alex", "/sum")).await;
    handler.handle(&message(2, 10, "Alex", "/sum")).await;

    assert_eq!(handler.buffers().count(ConversationId(1)), 1);
    assert_eq!(handler.buffers().count(ConversationId(2)), 0);
    assert_eq!(transport.replies_to(ConversationId(2)), vec!["ok: Alex: calm"]);
}

#[tokio::test]
async fn test_delivery_failure_does_not_block_clear() {
    struct Static;

    #[async_trait]
    impl Generator for Static {
        async fn complete(&self, _request: &ChatRequest) -> Result<String> {
            Ok("summary".to_string())
        }
    }

    let handler = setup(Arc::new(Static), LlmConfig::default(), Arc::new(FailingTransport)).await;

    handler.ingest(&message(1, 10, "Alex", "hi")).await;
    handler.handle(&message(1, 10, "Alex", "/sum")).await;
    assert_eq!(handler.buffers().count(ConversationId(1)), 0);
}

#[tokio::test]
async fn test_bot_run_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("A short story.")))
        .mount(&server)
        .await;

    let config = Config::default();
    let transport = Arc::new(RecordingTransport::default());
    *transport.inbound.lock().unwrap() = vec![
        message(5, 1, "Alex", "/nickname Sasha"),
        message(5, 2, "Bo", "hello"),
        message(5, 2, "Bo", "/debug"),
    ];

    let db = Database::in_memory().await.unwrap();
    let bot = Bot::from_config(&config, db, client_for(&server, &config.llm), transport.clone());
    bot.run(CancellationToken::new()).await;

    let replies = transport.replies_to(ConversationId(5));
    assert!(replies.contains(&"Nickname set: Sasha".to_string()));
    assert!(replies.contains(&"Messages in buffer: 1".to_string()));
}

#[tokio::test]
async fn test_nicknames_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("recap.db");

    {
        let db = Database::open(&db_path).await.unwrap();
        NicknameRepository::new(&db)
            .set(ParticipantId(42), "  Alex  ")
            .await
            .unwrap();
        db.close().await;
    }

    let db = Database::open(&db_path).await.unwrap();
    let repo = NicknameRepository::new(&db);
    assert_eq!(repo.get(ParticipantId(42)).await.unwrap().as_deref(), Some("Alex"));

    let name = repo
        .resolve_display_name(ParticipantId(42), Some("Profile"))
        .await
        .unwrap();
    assert_eq!(name.as_str(), "Alex");
}

#[tokio::test]
async fn test_error_kinds_at_boundary() {
    assert_eq!(Error::EmptySelection.kind(), ErrorKind::EmptySelection);
    assert_eq!(
        recap_core::buffer::parse_count(Some("-3"), 5).unwrap_err().kind(),
        ErrorKind::InvalidArgument
    );
}
