//! End-to-end streaming through the client with a scripted transport.

mod common;

use common::{builder_with, client_with, MockTransport};
use futures::StreamExt;
use hchat_rust::telemetry::InMemoryDeltaSink;
use hchat_rust::{ChatRequest, Error, FinishReason, ThinkingRender};
use serde_json::json;
use std::sync::Arc;

async fn collect_text(client: &hchat_rust::HChatClient, request: &ChatRequest) -> Vec<String> {
    client
        .stream(request)
        .await
        .unwrap()
        .map(|r| r.unwrap())
        .collect()
        .await
}

fn claude_thinking_events() -> Vec<serde_json::Value> {
    vec![
        json!({"type": "message_start", "message": {"id": "msg_1", "role": "assistant"}}),
        json!({"type": "content_block_start", "index": 0, "content_block": {"type": "thinking", "thinking": ""}}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "thinking_delta", "thinking": "a"}}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "thinking_delta", "thinking": "b"}}),
        json!({"type": "content_block_stop", "index": 0}),
        json!({"type": "content_block_start", "index": 1, "content_block": {"type": "text", "text": ""}}),
        json!({"type": "content_block_delta", "index": 1, "delta": {"type": "text_delta", "text": "Answer"}}),
        json!({"type": "content_block_stop", "index": 1}),
        json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}}),
        json!({"type": "message_stop"}),
    ]
}

#[tokio::test]
async fn test_openai_text_stream() {
    let transport = Arc::new(MockTransport::events(&[
        json!({"id": "c1", "object": "chat.completion.chunk", "choices": [{"index": 0, "delta": {"role": "assistant", "content": ""}}]}),
        json!({"id": "c1", "choices": [{"index": 0, "delta": {"content": "Hel"}}]}),
        json!({"id": "c1", "choices": [{"index": 0, "delta": {"content": "lo"}, "finish_reason": "stop"}]}),
    ]));
    let client = client_with(transport.clone());

    let text = collect_text(&client, &ChatRequest::new("gpt-4o", "hi")).await;
    assert_eq!(text, vec!["Hel", "lo"]);

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].stream);
    assert!(requests[0]
        .url
        .starts_with("https://gateway.test/v2/api/openai/deployments/gpt-4o/chat/completions"));
    assert_eq!(requests[0].headers.get("api-key").map(String::as_str), Some("test-key"));
}

#[tokio::test]
async fn test_claude_thinking_is_inlined() {
    let transport = Arc::new(MockTransport::events(&claude_thinking_events()));
    let client = client_with(transport.clone());

    let request = ChatRequest::new("claude-sonnet-4", "why?").thinking(true);
    let text = collect_text(&client, &request).await;
    assert_eq!(text, vec!["<thinking>a", "b", "</thinking>\n", "Answer"]);

    let body = &transport.requests()[0].body;
    assert_eq!(body["thinking"]["type"], "enabled");
    assert_eq!(body["stream"], true);
}

#[tokio::test]
async fn test_claude_thinking_can_be_omitted() {
    let transport = Arc::new(MockTransport::events(&claude_thinking_events()));
    let client = builder_with(transport)
        .thinking_render(ThinkingRender::Omit)
        .build()
        .unwrap();

    let text = collect_text(&client, &ChatRequest::new("claude-sonnet-4", "why?")).await;
    assert_eq!(text, vec!["Answer"]);
}

#[tokio::test]
async fn test_gemini_stream_with_thought_part() {
    let transport = Arc::new(MockTransport::events(&[
        json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "plan", "thought": true}]}}]}),
        json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "Hi"}]}}]}),
        json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "!"}]}, "finishReason": "STOP"}]}),
    ]));
    let client = client_with(transport.clone());

    let text = collect_text(&client, &ChatRequest::new("gemini-2.5-flash", "hello")).await;
    assert_eq!(text, vec!["\n<thinking>\nplan\n</thinking>\n", "Hi", "!"]);

    let url = &transport.requests()[0].url;
    assert!(url.contains("/models/gemini-2.5-flash:streamGenerateContent"));
    assert!(url.contains("alt=sse"));
}

#[tokio::test]
async fn test_done_sentinel_ends_stream_before_trailing_bytes() {
    let transport = Arc::new(MockTransport::sse(&[
        "data: {\"choices\":[{\"delta\":{\"content\":\"one\"}}]}\n\n",
        "data: [DONE]\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"two\"}}]}\n\n",
    ]));
    let client = client_with(transport.clone());

    let text = collect_text(&client, &ChatRequest::new("gpt-4o", "hi")).await;
    assert_eq!(text, vec!["one"]);
    assert!(transport.body_dropped());
}

#[tokio::test]
async fn test_malformed_event_between_valid_events() {
    let transport = Arc::new(MockTransport::sse(&[
        "data: {\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\n\n",
        "data: not json\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"B\"}}]}\n\n",
    ]));
    let client = client_with(transport);

    let text = collect_text(&client, &ChatRequest::new("gpt-4o", "hi")).await;
    assert_eq!(text, vec!["A", "B"]);
}

#[tokio::test]
async fn test_cancel_after_first_item() {
    let transport = Arc::new(MockTransport::events(&claude_thinking_events()));
    let client = client_with(transport.clone());

    let (mut stream, cancel) = client
        .stream_with_cancel(&ChatRequest::new("claude-sonnet-4", "why?"))
        .await
        .unwrap();

    assert_eq!(stream.next().await.unwrap().unwrap(), "<thinking>a");
    assert!(!transport.body_dropped());

    cancel.cancel();
    assert!(stream.next().await.is_none());
    assert!(transport.body_dropped());
}

#[tokio::test]
async fn test_dropping_stream_releases_body() {
    let transport = Arc::new(MockTransport::events(&claude_thinking_events()));
    let client = client_with(transport.clone());

    let mut stream = client
        .stream(&ChatRequest::new("claude-sonnet-4", "why?"))
        .await
        .unwrap();
    let _ = stream.next().await;
    drop(stream);
    assert!(transport.body_dropped());
}

#[tokio::test]
async fn test_vendor_error_mid_stream_terminates() {
    let transport = Arc::new(MockTransport::events(&[
        json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "partial"}}),
        json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "never"}}),
    ]));
    let client = client_with(transport);

    let items: Vec<_> = client
        .stream(&ChatRequest::new("claude-sonnet-4", "hi"))
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap(), "partial");
    match &items[1] {
        Err(Error::Stream { provider, message }) => {
            assert_eq!(provider, "claude");
            assert_eq!(message, "Overloaded");
        }
        other => panic!("expected stream error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_transport_failure_mid_body() {
    let transport = Arc::new(
        MockTransport::sse(&["data: {\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\n\n"])
            .with_tail_error("connection reset"),
    );
    let client = client_with(transport);

    let items: Vec<_> = client
        .stream(&ChatRequest::new("gpt-4o", "hi"))
        .await
        .unwrap()
        .collect()
        .await;
    assert_eq!(items.len(), 2);
    assert!(matches!(items[1], Err(Error::Transport(_))));
}

#[tokio::test]
async fn test_non_2xx_fails_before_stream_starts() {
    let transport = Arc::new(MockTransport::failing(
        "claude",
        400,
        "thinking blocks are not supported for this model",
    ));
    let client = client_with(transport);

    let err = client
        .stream(&ChatRequest::new("claude-3-haiku", "hi").thinking(true))
        .await
        .err()
        .expect("stream should not start");
    assert_eq!(err.status(), Some(400));
    assert_eq!(
        err.feature_code(),
        Some(hchat_rust::FeatureErrorCode::ThinkingNotSupported)
    );
}

#[tokio::test]
async fn test_unknown_model_sends_nothing() {
    let transport = Arc::new(MockTransport::events(&[]));
    let client = client_with(transport.clone());

    let err = client
        .stream(&ChatRequest::new("llama-3-70b", "hi"))
        .await
        .err()
        .expect("unknown prefix must fail");
    assert!(matches!(err, Error::UnknownModel { .. }));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_tool_fragments_reach_sink_not_text() {
    let transport = Arc::new(MockTransport::events(&[
        json!({"type": "content_block_start", "index": 0, "content_block": {"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {}}}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "input_json_delta", "partial_json": "{\"x\":"}}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "input_json_delta", "partial_json": "1}"}}),
        json!({"type": "content_block_stop", "index": 0}),
        json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"}}),
        json!({"type": "message_stop"}),
    ]));
    let sink = Arc::new(InMemoryDeltaSink::new(100));
    let client = builder_with(transport)
        .delta_sink(sink.clone())
        .build()
        .unwrap();

    let text = collect_text(&client, &ChatRequest::new("claude-sonnet-4", "weather?")).await;
    assert!(text.is_empty());

    let fragments: Vec<_> = sink
        .get_events()
        .into_iter()
        .flat_map(|e| e.delta.tool_calls)
        .collect();
    assert_eq!(fragments.len(), 3);
    assert_eq!(fragments[0].id.as_deref(), Some("toolu_1"));
    let args: String = fragments
        .iter()
        .filter_map(|f| f.arguments_chunk.clone())
        .collect();
    assert_eq!(args, "{\"x\":1}");
}

#[tokio::test]
async fn test_collect_assembles_tool_calls() {
    let transport = Arc::new(MockTransport::events(&[
        json!({"type": "content_block_start", "index": 0, "content_block": {"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {}}}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "input_json_delta", "partial_json": "{\"x\":"}}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "input_json_delta", "partial_json": "1}"}}),
        json!({"type": "content_block_stop", "index": 0}),
        json!({"type": "message_stop"}),
    ]));
    let client = client_with(transport);

    let completion = client
        .collect(&ChatRequest::new("claude-sonnet-4", "weather?"))
        .await
        .unwrap();
    let calls = completion.tool_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].function.name, "get_weather");
    assert_eq!(calls[0].arguments_json().unwrap(), json!({"x": 1}));
    // message_stop is authoritative.
    assert_eq!(completion.finish_reason(), Some(FinishReason::Stop));
}

#[tokio::test]
async fn test_collect_separates_thinking_from_content() {
    let transport = Arc::new(MockTransport::events(&claude_thinking_events()));
    let client = client_with(transport);

    let completion = client
        .collect(&ChatRequest::new("claude-sonnet-4", "why?"))
        .await
        .unwrap();
    assert_eq!(completion.content(), "Answer");
    assert_eq!(completion.choices[0].message.thinking.as_deref(), Some("ab"));
}

#[tokio::test]
async fn test_chunk_surface() {
    let transport = Arc::new(MockTransport::events(&[
        json!({"candidates": [{"content": {"parts": [{"text": "Hi"}]}}]}),
        json!({"candidates": [{"content": {"parts": [{"text": "!"}]}, "finishReason": "MAX_TOKENS"}]}),
    ]));
    let client = client_with(transport);

    let chunks: Vec<_> = client
        .stream_chunks(&ChatRequest::new("gemini-2.5-pro", "hi"))
        .await
        .unwrap()
        .map(|r| r.unwrap())
        .collect()
        .await;

    assert_eq!(chunks.len(), 2);
    assert!(chunks.iter().all(|c| c.object == "chat.completion.chunk"));
    assert!(chunks.iter().all(|c| c.model == "gemini-2.5-pro"));
    assert_eq!(chunks[0].id, chunks[1].id);
    assert_eq!(chunks[0].choices[0].delta.content.as_deref(), Some("Hi"));
    assert_eq!(chunks[1].choices[0].finish_reason, Some(FinishReason::Length));
}

#[tokio::test]
async fn test_concurrent_streams_keep_separate_state() {
    let transport = Arc::new(MockTransport::events(&claude_thinking_events()));
    let client = client_with(transport);
    let request = ChatRequest::new("claude-sonnet-4", "why?");

    let (a, b) = tokio::join!(collect_text(&client, &request), collect_text(&client, &request));
    assert_eq!(a, b);
    assert_eq!(a[0], "<thinking>a");
}
