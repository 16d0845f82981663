// E2E tests for the chat stream endpoint
mod common;

use common::*;
use inference_providers::{CompletionError, RequestMatcher, ResponseTemplate};
use serde_json::json;
use services::chat::tools::{MockWebSearchProviderTrait, WebSearchResult};
use services::chat::{ChatId, Role, ToolState, TranscriptStore};
use std::sync::Arc;

#[tokio::test]
async fn test_chat_stream_without_session_is_rejected() {
    let ctx = setup_test_server().await;

    let response = ctx
        .server
        .post("/api/chat")
        .json(&json!({"id": "c1", "messages": [user_message("u1", "hi")]}))
        .await;
    assert_eq!(response.status_code(), 401);
    let err = response.json::<api::models::ErrorResponse>();
    assert_eq!(err.error.r#type, "unauthorized");

    let response = ctx
        .server
        .post("/api/chat")
        .add_header("Authorization", bearer("expired-or-unknown"))
        .json(&json!({"id": "c1", "messages": [user_message("u1", "hi")]}))
        .await;
    assert_eq!(response.status_code(), 401);
    assert!(ctx.provider.recorded_requests().await.is_empty());
}

#[tokio::test]
async fn test_chat_stream_events_and_headers() {
    let ctx = setup_test_server().await;
    ctx.provider
        .enqueue(ResponseTemplate::new("Hello there, Ada!"))
        .await;

    let response = ctx
        .server
        .post("/api/chat")
        .add_header("Authorization", bearer(SESSION_TOKEN))
        .json(&json!({"id": "c1", "messages": [user_message("u1", "hi")]}))
        .await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.header("x-chat-stream-version"), "v1");
    assert_eq!(response.header("x-chat-sources"), "included");
    assert_eq!(response.header("x-chat-reasoning"), "included");
    assert!(response
        .header("content-type")
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let events = sse_events(&response.text());
    let types = event_types(&events);
    assert_eq!(types.first().map(String::as_str), Some("start"));
    assert_eq!(
        &types[types.len() - 2..],
        &["message-boundary".to_string(), "stream-end".to_string()]
    );
    assert_eq!(streamed_text(&events), "Hello there, Ada!");
    assert_eq!(events.last().unwrap()["finishReason"], "stop");

    let stored = ctx
        .repositories
        .transcripts
        .load_messages(&ChatId::from("c1"))
        .await
        .unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].id.as_str(), "u1");
    assert_eq!(stored[1].role, Role::Assistant);
    assert_eq!(stored[1].text(), "Hello there, Ada!");
    assert_eq!(events[0]["messageId"], stored[1].id.as_str());
}

#[tokio::test]
async fn test_chat_stream_accepts_session_cookie() {
    let ctx = setup_test_server().await;
    ctx.provider.enqueue(ResponseTemplate::new("Hi")).await;

    let response = ctx
        .server
        .post("/api/chat")
        .add_header("Cookie", format!("{SESSION_COOKIE}={SESSION_TOKEN}.signature"))
        .json(&json!({"id": "c-cookie", "messages": [user_message("u1", "hi")]}))
        .await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(streamed_text(&sse_events(&response.text())), "Hi");
}

#[tokio::test]
async fn test_chat_stream_invalid_request() {
    let ctx = setup_test_server().await;

    let response = ctx
        .server
        .post("/api/chat")
        .add_header("Authorization", bearer(SESSION_TOKEN))
        .json(&json!({"id": "  ", "messages": [user_message("u1", "hi")]}))
        .await;
    assert_eq!(response.status_code(), 400);

    let response = ctx
        .server
        .post("/api/chat")
        .add_header("Authorization", bearer(SESSION_TOKEN))
        .json(&json!({"id": "c1", "messages": []}))
        .await;
    assert_eq!(response.status_code(), 400);
    let err = response.json::<api::models::ErrorResponse>();
    assert_eq!(err.error.r#type, "invalid_request_error");
}

#[tokio::test]
async fn test_chat_of_another_user_is_not_found() {
    let ctx = setup_test_server().await;
    ctx.provider.enqueue(ResponseTemplate::new("Hi Ada")).await;

    let response = ctx
        .server
        .post("/api/chat")
        .add_header("Authorization", bearer(SESSION_TOKEN))
        .json(&json!({"id": "shared", "messages": [user_message("u1", "hi")]}))
        .await;
    assert_eq!(response.status_code(), 200);

    let response = ctx
        .server
        .post("/api/chat")
        .add_header("Authorization", bearer(OTHER_SESSION_TOKEN))
        .json(&json!({"id": "shared", "messages": [user_message("u2", "hijack")]}))
        .await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_tool_call_is_streamed_and_answered() {
    let mut search = MockWebSearchProviderTrait::new();
    search.expect_search().returning(|_| {
        Ok(vec![WebSearchResult {
            title: "The Rust Book".to_string(),
            url: "https://doc.rust-lang.org/book/".to_string(),
            snippet: "Learn Rust".to_string(),
        }])
    });
    let ctx = setup_test_server_with(TestOptions {
        web_search: Some(Arc::new(search)),
        ..Default::default()
    })
    .await;
    ctx.provider
        .enqueue(
            ResponseTemplate::new("")
                .with_tool_call_id("call_1", "webSearcher", r#"{"query":"rust book"}"#),
        )
        .await;
    ctx.provider
        .enqueue(ResponseTemplate::new("See the Rust Book."))
        .await;

    let response = ctx
        .server
        .post("/api/chat")
        .add_header("Authorization", bearer(SESSION_TOKEN))
        .json(&json!({"id": "c-tools", "messages": [user_message("u1", "find the rust book")]}))
        .await;
    assert_eq!(response.status_code(), 200);

    let events = sse_events(&response.text());
    let types = event_types(&events);
    let position = |kind: &str| types.iter().position(|t| t == kind).unwrap();
    assert!(position("tool-call-start") < position("tool-call-output"));
    assert!(position("tool-call-output") < position("source-url"));
    assert_eq!(types.iter().filter(|t| *t == "start-step").count(), 2);

    let output = &events[position("tool-call-output")];
    assert_eq!(output["toolCallId"], "call_1");
    assert_eq!(output["toolName"], "webSearcher");
    assert_eq!(output["isError"], false);
    assert_eq!(
        events[position("source-url")]["url"],
        "https://doc.rust-lang.org/book/"
    );
    assert_eq!(streamed_text(&events), "See the Rust Book.");

    let stored = ctx
        .repositories
        .transcripts
        .load_messages(&ChatId::from("c-tools"))
        .await
        .unwrap();
    let invocation = stored[1].tool_invocations().next().unwrap();
    assert_eq!(invocation.tool_call_id, "call_1");
    assert_eq!(invocation.state, ToolState::OutputAvailable);
}

#[tokio::test]
async fn test_web_search_mode_uses_search_model_without_tools() {
    let mut search = MockWebSearchProviderTrait::new();
    search.expect_search().never();
    let ctx = setup_test_server_with(TestOptions {
        web_search: Some(Arc::new(search)),
        ..Default::default()
    })
    .await;
    ctx.provider
        .enqueue(ResponseTemplate::new("Fresh results."))
        .await;

    let response = ctx
        .server
        .post("/api/chat")
        .add_header("Authorization", bearer(SESSION_TOKEN))
        .json(&json!({
            "id": "c-search",
            "messages": [user_message("u1", "news today")],
            "webSearch": true
        }))
        .await;
    assert_eq!(response.status_code(), 200);

    let requests = ctx.provider.recorded_requests().await;
    let turn = requests
        .iter()
        .find(|r| r.model == "perplexity/sonar")
        .expect("search model was not used");
    assert!(turn.tools.is_none());
}

#[tokio::test]
async fn test_model_failure_ends_stream_with_error() {
    let ctx = setup_test_server().await;
    ctx.provider
        .enqueue(ResponseTemplate::new("one two three").with_error_after(2))
        .await;

    let response = ctx
        .server
        .post("/api/chat")
        .add_header("Authorization", bearer(SESSION_TOKEN))
        .json(&json!({"id": "c-err", "messages": [user_message("u1", "hi")]}))
        .await;
    assert_eq!(response.status_code(), 200);

    let events = sse_events(&response.text());
    let types = event_types(&events);
    assert!(types.contains(&"error".to_string()));
    assert_eq!(types.last().map(String::as_str), Some("stream-end"));
    assert_eq!(events.last().unwrap()["finishReason"], "error");
}

#[tokio::test]
async fn test_rejected_model_request_still_closes_stream() {
    let ctx = setup_test_server().await;
    ctx.provider
        .enqueue(ResponseTemplate::failing(CompletionError::CompletionError(
            "upstream unavailable".to_string(),
        )))
        .await;

    let response = ctx
        .server
        .post("/api/chat")
        .add_header("Authorization", bearer(SESSION_TOKEN))
        .json(&json!({"id": "c-down", "messages": [user_message("u1", "hi")]}))
        .await;
    assert_eq!(response.status_code(), 200);

    let events = sse_events(&response.text());
    let error = events.iter().find(|e| e["type"] == "error").unwrap();
    assert!(error["errorText"]
        .as_str()
        .unwrap()
        .contains("upstream unavailable"));
    assert_eq!(events.last().unwrap()["type"], "stream-end");
}

#[tokio::test]
async fn test_resent_history_is_not_duplicated() {
    let ctx = setup_test_server().await;
    ctx.provider.enqueue(ResponseTemplate::new("First.")).await;

    let response = ctx
        .server
        .post("/api/chat")
        .add_header("Authorization", bearer(SESSION_TOKEN))
        .json(&json!({"id": "c-history", "messages": [user_message("u1", "one")]}))
        .await;
    let events = sse_events(&response.text());
    let assistant_id = events[0]["messageId"].as_str().unwrap().to_string();

    // Title generation for the first turn may still be running, so the
    // second answer is keyed on the prompt rather than queued
    ctx.provider
        .when(RequestMatcher::LastUserMessageContains("two".to_string()))
        .respond_with(ResponseTemplate::new("Second."))
        .await;
    let history = json!([
        user_message("u1", "one"),
        {"id": assistant_id, "role": "assistant", "parts": [{"type": "text", "text": "First."}]},
        user_message("u2", "two")
    ]);
    let response = ctx
        .server
        .post("/api/chat")
        .add_header("Authorization", bearer(SESSION_TOKEN))
        .json(&json!({"id": "c-history", "messages": history}))
        .await;
    assert_eq!(response.status_code(), 200);

    let stored = ctx
        .repositories
        .transcripts
        .load_messages(&ChatId::from("c-history"))
        .await
        .unwrap();
    let ids: Vec<&str> = stored.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids.len(), 4);
    assert_eq!(&ids[..3], &["u1", assistant_id.as_str(), "u2"]);
    assert_eq!(stored[3].text(), "Second.");
}
