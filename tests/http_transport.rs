//! reqwest transport against a local mock HTTP server.

use futures::StreamExt;
use hchat_rust::{ChatRequest, ClientConfig, Error, FeatureErrorCode, HChatClientBuilder};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

fn client_for(url: &str) -> hchat_rust::HChatClient {
    HChatClientBuilder::new()
        .config(ClientConfig::new("secret").with_base_url(url))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_sse_body_over_http() {
    let mut server = mockito::Server::new_async().await;
    let body = concat!(
        "event: content_block_delta\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n\n",
        ": keep-alive\n\n",
        "event: message_stop\n",
        "data: {\"type\":\"message_stop\"}\n\n",
    );
    let mock = server
        .mock("POST", "/claude/messages")
        .match_header("authorization", "secret")
        .match_header("accept", "text/event-stream")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let client = client_for(&server.url());
    let text: Vec<String> = client
        .stream(&ChatRequest::new("claude-sonnet-4", "hi"))
        .await
        .unwrap()
        .map(|r| r.unwrap())
        .collect()
        .await;

    assert_eq!(text, vec!["Hi"]);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_non_2xx_is_remote_error_with_hint() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/claude/messages")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"type":"error","error":{"type":"invalid_request_error","message":"tools.0.name: String should match pattern"}}"#)
        .create_async()
        .await;

    let client = client_for(&server.url());
    let err = client
        .stream(&ChatRequest::new("claude-sonnet-4", "hi"))
        .await
        .err()
        .expect("non-2xx must fail before streaming");

    match &err {
        Error::Remote {
            provider,
            status,
            message,
            code,
            hint,
        } => {
            assert_eq!(provider, "claude");
            assert_eq!(*status, 400);
            assert_eq!(message, "tools.0.name: String should match pattern");
            assert_eq!(*code, Some(FeatureErrorCode::InvalidToolName));
            assert!(hint.is_some());
        }
        other => panic!("expected remote error, got {:?}", other),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn test_plain_text_error_body_is_kept() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/claude/messages")
        .with_status(502)
        .with_body("bad gateway")
        .create_async()
        .await;

    let client = client_for(&server.url());
    let err = client
        .chat(&ChatRequest::new("claude-sonnet-4", "hi"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(502));
    assert_eq!(err.feature_code(), None);
    assert_eq!(err.to_string(), "claude API error (502): bad gateway");
}

#[tokio::test]
async fn test_json_completion_over_http() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/claude/messages")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"msg_9","type":"message","role":"assistant","content":[{"type":"text","text":"pong"}],"stop_reason":"end_turn","usage":{"input_tokens":1,"output_tokens":1}}"#)
        .create_async()
        .await;

    let client = client_for(&server.url());
    let completion = client
        .chat(&ChatRequest::new("claude-sonnet-4", "ping"))
        .await
        .unwrap();
    assert_eq!(completion.id, "msg_9");
    assert_eq!(completion.content(), "pong");
}

fn chunk(data: &str) -> String {
    format!("{:x}\r\n{}\r\n", data.len(), data)
}

async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];
    loop {
        let n = socket.read(&mut tmp).await.unwrap();
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&tmp[..n]);
        let text = String::from_utf8_lossy(&buf);
        if let Some(end) = text.find("\r\n\r\n") {
            let body_len = text[..end]
                .lines()
                .filter_map(|l| l.split_once(':'))
                .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + body_len {
                return;
            }
        }
    }
}

/// One chunked SSE response: `first`, a pause of `gap`, then `rest`.
async fn paused_sse_server(first: &'static str, gap: Duration, rest: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;
        let head = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n";
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(chunk(first).as_bytes()).await.unwrap();
        socket.flush().await.unwrap();
        tokio::time::sleep(gap).await;
        let _ = socket.write_all(chunk(rest).as_bytes()).await;
        let _ = socket.write_all(b"0\r\n\r\n").await;
        let _ = socket.flush().await;
    });
    format!("http://{}/v2/api", addr)
}

const FIRST: &str = "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"one\"}}]}\n\n";
const REST: &str = "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"two\"}}]}\n\ndata: [DONE]\n\n";

#[tokio::test]
async fn test_stream_outlives_request_timeout() {
    let url = paused_sse_server(FIRST, Duration::from_millis(1500), REST).await;
    let client = HChatClientBuilder::new()
        .config(
            ClientConfig::new("secret")
                .with_base_url(url)
                .with_timeout(Duration::from_secs(1)),
        )
        .build()
        .unwrap();

    let text: Vec<String> = client
        .stream(&ChatRequest::new("gpt-4o", "hi"))
        .await
        .unwrap()
        .map(|r| r.unwrap())
        .collect()
        .await;
    assert_eq!(text, vec!["one", "two"]);
}

#[tokio::test]
async fn test_silent_stream_hits_idle_timeout() {
    let url = paused_sse_server(FIRST, Duration::from_millis(1500), REST).await;
    let client = HChatClientBuilder::new()
        .config(
            ClientConfig::new("secret")
                .with_base_url(url)
                .with_stream_idle_timeout(Duration::from_millis(300)),
        )
        .build()
        .unwrap();

    let items: Vec<_> = client
        .stream(&ChatRequest::new("gpt-4o", "hi"))
        .await
        .unwrap()
        .collect()
        .await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_deref().unwrap(), "one");
    assert!(matches!(items[1], Err(Error::Transport(_))));
}

#[tokio::test]
async fn test_transport_error_hides_query_api_key() {
    let client = HChatClientBuilder::new()
        .config(ClientConfig::new("SECRET-KEY-123").with_base_url("http://127.0.0.1:1/v2/api"))
        .build()
        .unwrap();

    let err = client
        .stream(&ChatRequest::new("gemini-2.5-flash", "hi"))
        .await
        .err()
        .expect("nothing listens on port 1");
    assert!(matches!(err, Error::Transport(_)));
    assert!(!err.to_string().contains("SECRET-KEY-123"));
    assert!(!format!("{:?}", err).contains("SECRET-KEY-123"));

    let err = client
        .chat(&ChatRequest::new("gemini-2.5-flash", "hi"))
        .await
        .unwrap_err();
    assert!(!err.to_string().contains("SECRET-KEY-123"));
}
