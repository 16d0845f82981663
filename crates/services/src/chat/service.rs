use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use config::ChatConfig;
use futures::future::join_all;
use futures::StreamExt;
use inference_providers::{
    ChatCompletionParams, ChatMessage, InferenceProvider, MessageRole, ToolCall,
};

use super::convert::convert_to_model_messages;
use super::errors::ChatError;
use super::models::{Chat, ChatId, ChatStreamRequest, FinishReason, Message, Role};
use super::ports::{ChatEventStream, ChatRepository, ChatServiceTrait, TranscriptStore};
use super::service_helpers::{ChatStreamContext, EventEmitter, ToolCallAccumulator, ToolCallInfo};
use super::smoothing::TextSmoother;
use super::title::TitleGenerator;
use super::tools::{ToolExecutionContext, ToolOutput, ToolRegistry};
use super::turn::{select_turn, CompletenessGate};
use crate::auth::AuthenticatedUser;

pub struct ChatServiceImpl {
    pub inference_provider: Arc<dyn InferenceProvider>,
    pub transcript_store: Arc<dyn TranscriptStore>,
    pub chat_repository: Arc<dyn ChatRepository>,
    pub tool_registry: Arc<ToolRegistry>,
    title_generator: Arc<TitleGenerator>,
    config: Arc<ChatConfig>,
    gate: CompletenessGate,
}

impl ChatServiceImpl {
    pub fn new(
        inference_provider: Arc<dyn InferenceProvider>,
        transcript_store: Arc<dyn TranscriptStore>,
        chat_repository: Arc<dyn ChatRepository>,
        tool_registry: Arc<ToolRegistry>,
        config: ChatConfig,
    ) -> Self {
        // Configured blocking tools win; otherwise each tool decides for itself
        let gate = if config.blocking_tools.is_empty() {
            CompletenessGate::new(tool_registry.blocking_tools())
        } else {
            CompletenessGate::new(config.blocking_tools.clone())
        };
        let title_generator = Arc::new(TitleGenerator::new(
            inference_provider.clone(),
            chat_repository.clone(),
            config.title_model.clone(),
        ));

        Self {
            inference_provider,
            transcript_store,
            chat_repository,
            tool_registry,
            title_generator,
            config: Arc::new(config),
            gate,
        }
    }

    fn validate(request: &ChatStreamRequest) -> Result<(), ChatError> {
        if request.chat_id.as_str().trim().is_empty() {
            return Err(ChatError::InvalidParams("chat id is required".to_string()));
        }
        match request.messages.last() {
            None => Err(ChatError::InvalidParams(
                "messages must not be empty".to_string(),
            )),
            Some(last) if last.role == Role::System => Err(ChatError::InvalidParams(
                "last message must be from the user or the assistant".to_string(),
            )),
            Some(_) => Ok(()),
        }
    }

    /// Web search requests always use the search model; otherwise the
    /// requested model, falling back to the default
    fn select_model(&self, request: &ChatStreamRequest) -> String {
        if request.web_search {
            return self.config.web_search_model.clone();
        }
        request
            .model
            .as_deref()
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.config.default_model.clone())
    }

    fn system_prompt(&self, user: &AuthenticatedUser) -> String {
        format!(
            "{}\n\nThe name of the user is {}.",
            self.config.system_prompt, user.name
        )
    }

    /// The chat must belong to the caller; a chat seen for the first time is created
    async fn ensure_chat(
        &self,
        chat_id: &ChatId,
        user: &AuthenticatedUser,
    ) -> Result<Chat, ChatError> {
        match self.chat_repository.get(chat_id).await? {
            Some(chat) if chat.user_id == user.id => Ok(chat),
            Some(_) => Err(ChatError::NotFound(chat_id.to_string())),
            None => Ok(self
                .chat_repository
                .create(&user.id, Some(chat_id.clone()))
                .await?),
        }
    }

    fn runner(&self, with_tools: bool) -> TurnRunner {
        TurnRunner {
            inference_provider: self.inference_provider.clone(),
            transcript_store: self.transcript_store.clone(),
            tool_registry: self.tool_registry.clone(),
            title_generator: self.title_generator.clone(),
            config: self.config.clone(),
            gate: self.gate.clone(),
            with_tools,
        }
    }
}

#[async_trait]
impl ChatServiceTrait for ChatServiceImpl {
    async fn create_chat_stream(
        &self,
        request: ChatStreamRequest,
        user: AuthenticatedUser,
    ) -> Result<ChatEventStream, ChatError> {
        use futures::channel::mpsc;

        Self::validate(&request)?;
        self.ensure_chat(&request.chat_id, &user).await?;

        let model = self.select_model(&request);
        let model_messages = convert_to_model_messages(&request.messages, &self.system_prompt(&user));
        let title_source = (request.messages.len() < 2).then(|| request.messages.clone());
        let ctx = ChatStreamContext::new(request.chat_id, user, request.messages);

        tracing::info!(
            chat_id = %ctx.chat_id,
            user_id = %ctx.user.id,
            model = %model,
            continuation = ctx.is_continuation,
            "Starting chat stream"
        );

        let (tx, rx) = mpsc::unbounded();
        // Perplexity models answer from their own search and take no tools
        let runner = self.runner(!request.web_search);
        tokio::spawn(async move {
            runner
                .run(ctx, EventEmitter::new(tx), model_messages, model, title_source)
                .await;
        });

        Ok(Box::pin(rx))
    }

    async fn create_chat(
        &self,
        user: &AuthenticatedUser,
        chat_id: Option<ChatId>,
    ) -> Result<Chat, ChatError> {
        if let Some(id) = &chat_id {
            if id.as_str().trim().is_empty() {
                return Err(ChatError::InvalidParams("chat id must not be blank".to_string()));
            }
        }
        let chat = self.chat_repository.create(&user.id, chat_id).await?;
        tracing::info!(chat_id = %chat.id, user_id = %user.id, "Chat created");
        Ok(chat)
    }

    async fn list_chats(&self, user: &AuthenticatedUser) -> Result<Vec<Chat>, ChatError> {
        Ok(self.chat_repository.list_by_user(&user.id).await?)
    }

    async fn load_chat(
        &self,
        chat_id: &ChatId,
        user: &AuthenticatedUser,
    ) -> Result<Vec<Message>, ChatError> {
        match self.chat_repository.get(chat_id).await? {
            Some(chat) if chat.user_id == user.id => {
                Ok(self.transcript_store.load_messages(chat_id).await?)
            }
            _ => Err(ChatError::NotFound(chat_id.to_string())),
        }
    }
}

/// Everything one spawned turn needs, detached from the service
struct TurnRunner {
    inference_provider: Arc<dyn InferenceProvider>,
    transcript_store: Arc<dyn TranscriptStore>,
    tool_registry: Arc<ToolRegistry>,
    title_generator: Arc<TitleGenerator>,
    config: Arc<ChatConfig>,
    gate: CompletenessGate,
    with_tools: bool,
}

impl TurnRunner {
    async fn run(
        self,
        mut ctx: ChatStreamContext,
        mut emitter: EventEmitter,
        mut model_messages: Vec<ChatMessage>,
        model: String,
        title_source: Option<Vec<Message>>,
    ) {
        let finish_reason = match self
            .run_steps(&mut ctx, &mut emitter, &mut model_messages, &model)
            .await
        {
            Ok(reason) => reason,
            Err(_) if emitter.is_closed() => FinishReason::Cancelled,
            Err(e) => {
                tracing::error!(chat_id = %ctx.chat_id, error = %e, "Chat stream failed");
                let _ = emitter.emit_error(&mut ctx, e.to_string()).await;
                FinishReason::Error
            }
        };

        if finish_reason == FinishReason::Cancelled {
            tracing::info!(chat_id = %ctx.chat_id, "Client went away, stopping generation");
        }
        let _ = emitter.emit_message_boundary(&mut ctx).await;
        let _ = emitter.emit_stream_end(&mut ctx, finish_reason).await;

        if let Some(messages) = title_source {
            self.title_generator.spawn(ctx.chat_id.clone(), messages);
        }
        // The stream stays open until the turn is stored
        self.persist(ctx).await;
        drop(emitter);
    }

    async fn run_steps(
        &self,
        ctx: &mut ChatStreamContext,
        emitter: &mut EventEmitter,
        model_messages: &mut Vec<ChatMessage>,
        model: &str,
    ) -> Result<FinishReason, ChatError> {
        emitter.emit_start(ctx).await?;
        let tools = (self.with_tools && !self.tool_registry.is_empty())
            .then(|| self.tool_registry.definitions());

        for step in 0..self.config.max_steps {
            emitter.emit_start_step(ctx).await?;

            let mut params = ChatCompletionParams::new(model, model_messages.clone());
            params.stream = Some(true);
            params.tools = tools.clone();
            params.user = Some(ctx.user.id.to_string());

            let (text, tool_calls) = self.stream_step(ctx, emitter, params).await?;
            if emitter.is_closed() {
                return Ok(FinishReason::Cancelled);
            }
            if tool_calls.is_empty() {
                emitter.emit_finish_step(ctx).await?;
                return Ok(FinishReason::Stop);
            }

            tracing::debug!(
                chat_id = %ctx.chat_id,
                step,
                tool_calls = tool_calls.len(),
                "Executing tool calls"
            );
            self.run_tools(ctx, emitter, model_messages, text, tool_calls)
                .await?;
            emitter.emit_finish_step(ctx).await?;
        }

        tracing::warn!(
            chat_id = %ctx.chat_id,
            max_steps = self.config.max_steps,
            "Step limit reached with tool calls outstanding"
        );
        Ok(FinishReason::MaxSteps)
    }

    /// Stream one model call. Returns the full text of the step and the
    /// tool calls it requested.
    async fn stream_step(
        &self,
        ctx: &mut ChatStreamContext,
        emitter: &mut EventEmitter,
        params: ChatCompletionParams,
    ) -> Result<(String, Vec<ToolCallInfo>), ChatError> {
        let mut stream = self
            .inference_provider
            .chat_completion_stream(params)
            .await
            .map_err(|e| ChatError::ModelError(e.to_string()))?;

        let mut smoother = TextSmoother::new(self.config.smoothing.chunking);
        let mut accumulator = ToolCallAccumulator::new();
        let mut text = String::new();

        while let Some(event) = stream.next().await {
            if emitter.is_closed() {
                break;
            }
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    self.flush_text(ctx, emitter, &mut smoother).await?;
                    return Err(ChatError::ModelError(e.to_string()));
                }
            };

            for choice in event.chunk.choices {
                let Some(delta) = choice.delta else {
                    continue;
                };

                if let Some(reasoning) = delta.reasoning_text().filter(|r| !r.is_empty()) {
                    let reasoning = reasoning.to_string();
                    self.flush_text(ctx, emitter, &mut smoother).await?;
                    emitter.emit_reasoning_delta(ctx, reasoning).await?;
                }

                if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
                    text.push_str(&content);
                    let chunks = smoother.push(&content);
                    if let Err(e) = emitter.emit_text_chunks(ctx, chunks, self.pace()).await {
                        // Record what the smoother still holds before giving up
                        let _ = self.flush_text(ctx, emitter, &mut smoother).await;
                        return Err(e);
                    }
                }

                if let Some(tool_calls) = &delta.tool_calls {
                    self.flush_text(ctx, emitter, &mut smoother).await?;
                    for fragment in tool_calls {
                        for input_event in accumulator.push(fragment) {
                            emitter.send_raw(ctx, input_event).await?;
                        }
                    }
                }
            }
        }

        self.flush_text(ctx, emitter, &mut smoother).await?;
        Ok((text, accumulator.finish()))
    }

    async fn flush_text(
        &self,
        ctx: &mut ChatStreamContext,
        emitter: &mut EventEmitter,
        smoother: &mut TextSmoother,
    ) -> Result<(), ChatError> {
        match smoother.flush() {
            Some(rest) => emitter.emit_text_delta(ctx, rest).await,
            None => Ok(()),
        }
    }

    fn pace(&self) -> Duration {
        Duration::from_millis(self.config.smoothing.delay_ms)
    }

    /// Announce, execute and report the tool calls of one step, then extend
    /// the model context with the call and its results.
    async fn run_tools(
        &self,
        ctx: &mut ChatStreamContext,
        emitter: &mut EventEmitter,
        model_messages: &mut Vec<ChatMessage>,
        text: String,
        tool_calls: Vec<ToolCallInfo>,
    ) -> Result<(), ChatError> {
        for tool_call in &tool_calls {
            emitter.emit_tool_call_start(ctx, tool_call).await?;
        }

        let outcomes = {
            let exec_ctx = ToolExecutionContext {
                chat_id: &ctx.chat_id,
                user: &ctx.user,
            };
            join_all(
                tool_calls
                    .iter()
                    .map(|tool_call| self.tool_registry.run(tool_call, &exec_ctx)),
            )
            .await
        };

        model_messages.push(ChatMessage {
            role: MessageRole::Assistant,
            content: (!text.is_empty()).then_some(text),
            name: None,
            tool_call_id: None,
            tool_calls: Some(
                tool_calls
                    .iter()
                    .map(|c| ToolCall::function(c.id.clone(), c.name.clone(), c.arguments.clone()))
                    .collect(),
            ),
        });

        // Keep recording outputs after a disconnect so they are persisted
        let mut first_error = None;
        for (tool_call, outcome) in tool_calls.iter().zip(outcomes) {
            let mut sent = emitter
                .emit_tool_call_output(ctx, tool_call, outcome.output.clone(), outcome.is_error)
                .await;

            match outcome.result {
                Some(ToolOutput::WebSearch { results }) => {
                    for (index, result) in results.into_iter().enumerate() {
                        let source = emitter
                            .emit_source_url(
                                ctx,
                                format!("{}-{}", tool_call.id, index),
                                result.url,
                                Some(result.title),
                            )
                            .await;
                        sent = sent.and(source);
                    }
                }
                Some(ToolOutput::Image { url, media_type }) => {
                    let file = emitter.emit_file(ctx, media_type, url).await;
                    sent = sent.and(file);
                }
                Some(ToolOutput::Json(_)) | None => {}
            }

            model_messages.push(ChatMessage::tool(
                tool_call.id.clone(),
                outcome.output.to_string(),
            ));
            if let Err(e) = sent {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Store the latest complete (user, assistant) pair. Failures are
    /// logged and never reach the client.
    async fn persist(&self, ctx: ChatStreamContext) {
        let chat_id = ctx.chat_id.clone();
        let messages = ctx.into_messages();

        let Some((user_message, assistant_message)) = select_turn(&messages, &self.gate) else {
            tracing::debug!(chat_id = %chat_id, "No complete turn to persist");
            return;
        };

        match self
            .transcript_store
            .upsert_turn(
                &chat_id,
                vec![user_message.clone(), assistant_message.clone()],
            )
            .await
        {
            Ok(inserted) => tracing::info!(
                chat_id = %chat_id,
                message_id = %assistant_message.id,
                inserted = inserted.len(),
                "Chat turn persisted"
            ),
            Err(e) => tracing::error!(chat_id = %chat_id, error = %e, "Failed to persist chat turn"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserId;
    use crate::chat::models::{MessageId, Part, StreamEvent, ToolState};
    use crate::chat::tools::{ToolExecutor, ToolOutput};
    use crate::chat::errors::ToolError;
    use crate::memory::{InMemoryChatRepository, InMemoryTranscriptStore};
    use inference_providers::{CompletionError, MockProvider, RequestMatcher, ResponseTemplate};
    use serde_json::{json, Value};

    struct FakeImageTool;

    #[async_trait]
    impl ToolExecutor for FakeImageTool {
        fn name(&self) -> &str {
            "imageGenerator"
        }

        fn description(&self) -> &str {
            "Draws"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(
            &self,
            input: &Value,
            _context: &ToolExecutionContext<'_>,
        ) -> Result<ToolOutput, ToolError> {
            match input.get("prompt").and_then(Value::as_str) {
                Some("fail") => Err(ToolError::execution("imageGenerator", "quota exceeded")),
                Some(_) => Ok(ToolOutput::Image {
                    url: "https://cdn.example.com/cat.png".to_string(),
                    media_type: "image/png".to_string(),
                }),
                None => Err(ToolError::invalid_input("imageGenerator", "missing prompt")),
            }
        }
    }

    struct Harness {
        provider: MockProvider,
        store: Arc<InMemoryTranscriptStore>,
        chats: Arc<InMemoryChatRepository>,
        service: ChatServiceImpl,
    }

    fn harness() -> Harness {
        let provider = MockProvider::new();
        let store = Arc::new(InMemoryTranscriptStore::new());
        let chats = Arc::new(InMemoryChatRepository::new());
        let mut registry = ToolRegistry::new(Duration::from_secs(5));
        registry.register(Arc::new(FakeImageTool));

        let config = ChatConfig {
            smoothing: config::SmoothingConfig {
                delay_ms: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        let service = ChatServiceImpl::new(
            Arc::new(provider.clone()),
            store.clone(),
            chats.clone(),
            Arc::new(registry),
            config,
        );
        Harness {
            provider,
            store,
            chats,
            service,
        }
    }

    fn user() -> AuthenticatedUser {
        AuthenticatedUser {
            id: UserId::from("u1"),
            name: "Ada".to_string(),
            email: None,
        }
    }

    fn request(messages: Vec<Message>) -> ChatStreamRequest {
        ChatStreamRequest {
            chat_id: ChatId::from("c1"),
            messages,
            model: None,
            web_search: false,
        }
    }

    async fn run(harness: &Harness, request: ChatStreamRequest) -> Vec<StreamEvent> {
        harness
            .service
            .create_chat_stream(request, user())
            .await
            .unwrap()
            .collect()
            .await
    }

    fn types(events: &[StreamEvent]) -> Vec<&'static str> {
        events.iter().map(StreamEvent::event_type).collect()
    }

    fn streamed_text(events: &[StreamEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::TextDelta { delta } => Some(delta.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_simple_turn_streams_and_persists() {
        let h = harness();
        h.provider
            .enqueue(ResponseTemplate::new("Hello there, Ada!"))
            .await;

        let events = run(&h, request(vec![Message::user_text(MessageId::from("u1"), "hi")])).await;

        assert_eq!(types(&events).first(), Some(&"start"));
        assert_eq!(
            &types(&events)[types(&events).len() - 3..],
            &["finish-step", "message-boundary", "stream-end"]
        );
        assert_eq!(streamed_text(&events), "Hello there, Ada!");
        assert_eq!(
            events.last(),
            Some(&StreamEvent::StreamEnd {
                finish_reason: FinishReason::Stop
            })
        );

        let stored = h.store.load_messages(&ChatId::from("c1")).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].id.as_str(), "u1");
        assert_eq!(stored[1].role, Role::Assistant);
        assert_eq!(stored[1].text(), "Hello there, Ada!");
    }

    #[tokio::test]
    async fn test_system_prompt_names_user_and_default_model() {
        let h = harness();
        h.provider.enqueue(ResponseTemplate::new("ok")).await;
        run(&h, request(vec![Message::user_text(MessageId::from("u1"), "hi")])).await;

        let requests = h.provider.recorded_requests().await;
        let title_free: Vec<_> = requests
            .iter()
            .filter(|r| r.model == "openai/gpt-4o-mini")
            .collect();
        assert_eq!(title_free.len(), 1);
        let system = title_free[0].messages[0].content.as_deref().unwrap();
        assert!(system.ends_with("The name of the user is Ada."));
        assert!(title_free[0].tools.is_some());
    }

    #[tokio::test]
    async fn test_web_search_selects_search_model_without_tools() {
        let h = harness();
        h.provider
            .when(RequestMatcher::Model("perplexity/sonar".to_string()))
            .respond_with(ResponseTemplate::new("Searched"))
            .await;

        let mut req = request(vec![Message::user_text(MessageId::from("u1"), "news?")]);
        req.web_search = true;
        req.model = Some("openai/gpt-4o".to_string());
        let events = run(&h, req).await;
        assert_eq!(streamed_text(&events), "Searched");

        let requests = h.provider.recorded_requests().await;
        let search = requests
            .iter()
            .find(|r| r.model == "perplexity/sonar")
            .unwrap();
        assert!(search.tools.is_none());
    }

    #[tokio::test]
    async fn test_tool_step_then_answer() {
        let h = harness();
        h.provider
            .enqueue(
                ResponseTemplate::new("Drawing it.")
                    .with_tool_call_id("call_img", "imageGenerator", r#"{"prompt":"a cat"}"#),
            )
            .await;
        h.provider
            .enqueue(ResponseTemplate::new("Here is your cat."))
            .await;

        let events = run(
            &h,
            request(vec![Message::user_text(MessageId::from("u1"), "draw a cat")]),
        )
        .await;

        let kinds = types(&events);
        let start = kinds.iter().position(|k| *k == "tool-call-start").unwrap();
        let output = kinds.iter().position(|k| *k == "tool-call-output").unwrap();
        let file = kinds.iter().position(|k| *k == "file").unwrap();
        assert!(kinds.iter().position(|k| *k == "tool-input-start").unwrap() < start);
        assert!(start < output && output < file);
        assert_eq!(kinds.iter().filter(|k| **k == "start-step").count(), 2);

        let second_request = &h.provider.recorded_requests().await[1];
        let tool_result = second_request
            .messages
            .iter()
            .find(|m| m.role == MessageRole::Tool)
            .unwrap();
        assert_eq!(tool_result.tool_call_id.as_deref(), Some("call_img"));

        let stored = h.store.load_messages(&ChatId::from("c1")).await.unwrap();
        let assistant = &stored[1];
        let invocation = assistant.tool_invocations().next().unwrap();
        assert_eq!(invocation.state, ToolState::OutputAvailable);
        assert_eq!(invocation.output, Some(json!({"url": "https://cdn.example.com/cat.png"})));
        assert!(assistant
            .parts
            .iter()
            .any(|p| matches!(p, Part::File { url, .. } if url == "https://cdn.example.com/cat.png")));
        assert_eq!(assistant.text(), "Drawing it.Here is your cat.");
    }

    #[tokio::test]
    async fn test_tool_failure_is_reported_to_model() {
        let h = harness();
        h.provider
            .enqueue(
                ResponseTemplate::new("")
                    .with_tool_call_id("call_img", "imageGenerator", r#"{"prompt":"fail"}"#),
            )
            .await;
        h.provider
            .enqueue(ResponseTemplate::new("Sorry, that failed."))
            .await;

        let events = run(
            &h,
            request(vec![Message::user_text(MessageId::from("u1"), "draw")]),
        )
        .await;

        let output = events
            .iter()
            .find_map(|e| match e {
                StreamEvent::ToolCallOutput {
                    output, is_error, ..
                } => Some((output.clone(), *is_error)),
                _ => None,
            })
            .unwrap();
        assert!(output.1);
        assert_eq!(output.0["error"], "imageGenerator failed: quota exceeded");
        assert_eq!(
            events.last(),
            Some(&StreamEvent::StreamEnd {
                finish_reason: FinishReason::Stop
            })
        );
    }

    #[tokio::test]
    async fn test_max_steps() {
        let h = harness();
        h.provider
            .set_default_response(
                ResponseTemplate::new("again")
                    .with_tool_call("imageGenerator", r#"{"prompt":"cat"}"#),
            )
            .await;

        let events = run(
            &h,
            request(vec![Message::user_text(MessageId::from("u1"), "loop")]),
        )
        .await;
        assert_eq!(
            types(&events).iter().filter(|k| **k == "start-step").count(),
            5
        );
        assert_eq!(
            events.last(),
            Some(&StreamEvent::StreamEnd {
                finish_reason: FinishReason::MaxSteps
            })
        );
    }

    #[tokio::test]
    async fn test_provider_error_mid_stream() {
        let h = harness();
        h.provider
            .enqueue(ResponseTemplate::new("one two three four").with_error_after(2))
            .await;

        let events = run(
            &h,
            request(vec![Message::user_text(MessageId::from("u1"), "count")]),
        )
        .await;
        let kinds = types(&events);
        assert!(kinds.contains(&"error"));
        assert_eq!(
            events.last(),
            Some(&StreamEvent::StreamEnd {
                finish_reason: FinishReason::Error
            })
        );
        assert_eq!(streamed_text(&events), "one two");

        // Partial text still forms a complete turn
        let stored = h.store.load_messages(&ChatId::from("c1")).await.unwrap();
        assert_eq!(stored[1].text(), "one two");
    }

    #[tokio::test]
    async fn test_request_failure_emits_error() {
        let h = harness();
        h.provider
            .enqueue(ResponseTemplate::failing(CompletionError::HttpError {
                status: 503,
                message: "overloaded".to_string(),
            }))
            .await;

        let events = run(
            &h,
            request(vec![Message::user_text(MessageId::from("u1"), "hi")]),
        )
        .await;
        assert!(types(&events).contains(&"error"));
        assert!(h
            .store
            .load_messages(&ChatId::from("c1"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_after_tool_start_still_persists_output() {
        let h = harness();
        h.provider
            .enqueue(ResponseTemplate::new("Drawing").with_tool_call_id(
                "call_img",
                "imageGenerator",
                r#"{"prompt":"cat"}"#,
            ))
            .await;

        let mut stream = h
            .service
            .create_chat_stream(
                request(vec![Message::user_text(MessageId::from("u1"), "draw")]),
                user(),
            )
            .await
            .unwrap();

        while let Some(event) = stream.next().await {
            if matches!(event, StreamEvent::ToolCallStart { .. }) {
                break;
            }
        }
        drop(stream);

        // The turn finishes in the background
        let mut stored = Vec::new();
        for _ in 0..100 {
            stored = h.store.load_messages(&ChatId::from("c1")).await.unwrap();
            if !stored.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(stored.len(), 2);
        let invocation = stored[1].tool_invocations().next().unwrap();
        assert_eq!(invocation.state, ToolState::OutputAvailable);
    }

    #[tokio::test]
    async fn test_continuation_extends_last_assistant_message() {
        let h = harness();
        h.provider
            .enqueue(ResponseTemplate::new("Here is the picture."))
            .await;

        let mut invocation = crate::chat::models::ToolInvocation::with_input(
            "call_img",
            "imageGenerator",
            json!({"prompt": "cat"}),
        );
        invocation
            .complete(json!({"url": "https://cdn.example.com/cat.png"}), false)
            .unwrap();
        let assistant = Message::new(
            MessageId::from("a1"),
            Role::Assistant,
            vec![Part::StepStart, Part::ToolInvocation(invocation)],
        );

        let events = run(
            &h,
            request(vec![
                Message::user_text(MessageId::from("u1"), "draw a cat"),
                assistant,
            ]),
        )
        .await;

        assert_eq!(
            events.first(),
            Some(&StreamEvent::Start {
                message_id: MessageId::from("a1")
            })
        );
        let stored = h.store.load_messages(&ChatId::from("c1")).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].id.as_str(), "a1");
        assert_eq!(stored[1].tool_invocations().count(), 1);
        assert_eq!(stored[1].text(), "Here is the picture.");
    }

    #[tokio::test]
    async fn test_title_generated_for_first_message() {
        let h = harness();
        h.provider
            .when(RequestMatcher::Model("google/gemini-2.5-flash".to_string()))
            .respond_with(ResponseTemplate::new("Greetings"))
            .await;
        h.provider
            .when(RequestMatcher::Model("openai/gpt-4o-mini".to_string()))
            .respond_with(ResponseTemplate::new("Hello!"))
            .await;

        run(&h, request(vec![Message::user_text(MessageId::from("u1"), "hi")])).await;

        let mut title = None;
        for _ in 0..100 {
            title = h
                .chats
                .get(&ChatId::from("c1"))
                .await
                .unwrap()
                .and_then(|chat| chat.title);
            if title.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(title.as_deref(), Some("Greetings"));
    }

    #[tokio::test]
    async fn test_validation() {
        let h = harness();
        let empty = h.service.create_chat_stream(request(Vec::new()), user()).await;
        assert!(matches!(empty, Err(ChatError::InvalidParams(_))));

        let mut blank = request(vec![Message::user_text(MessageId::from("u1"), "hi")]);
        blank.chat_id = ChatId::from(" ");
        assert!(matches!(
            h.service.create_chat_stream(blank, user()).await,
            Err(ChatError::InvalidParams(_))
        ));
    }

    #[tokio::test]
    async fn test_foreign_chat_is_not_found() {
        let h = harness();
        h.chats
            .create(&UserId::from("someone-else"), Some(ChatId::from("c1")))
            .await
            .unwrap();

        let result = h
            .service
            .create_chat_stream(
                request(vec![Message::user_text(MessageId::from("u1"), "hi")]),
                user(),
            )
            .await;
        assert!(matches!(result, Err(ChatError::NotFound(_))));
        assert!(matches!(
            h.service.load_chat(&ChatId::from("c1"), &user()).await,
            Err(ChatError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_list_and_load_chat() {
        let h = harness();
        let chat = h
            .service
            .create_chat(&user(), Some(ChatId::from("c9")))
            .await
            .unwrap();
        assert_eq!(chat.id.as_str(), "c9");

        let chats = h.service.list_chats(&user()).await.unwrap();
        assert_eq!(chats.len(), 1);
        assert!(h
            .service
            .load_chat(&chat.id, &user())
            .await
            .unwrap()
            .is_empty());
    }
}
