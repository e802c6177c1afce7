//! Streaming chat against the gateway (no mock).
//!
//! Prerequisites:
//! - Set `HCHAT_API_KEY`
//! - Optionally set `HCHAT_BASE_URL`, `AI_PROXY_URL`, `HCHAT_DEBUG=1`
//!
//! Run:
//!   HCHAT_API_KEY=your_key cargo run --example stream_chat -- claude-sonnet-4 "Why is the sky blue?"
//!
//! Set `RUST_LOG=hchat_rust=debug` to see skipped payloads and tool-call fragments.

use anyhow::Context;
use futures::StreamExt;
use hchat_rust::telemetry::TracingDeltaSink;
use hchat_rust::{ChatRequest, HChatClient, Message};
use std::io::Write;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if std::env::var("HCHAT_API_KEY").is_err() {
        eprintln!("Error: HCHAT_API_KEY environment variable is not set.");
        eprintln!("Run with: HCHAT_API_KEY=your_key cargo run --example stream_chat");
        std::process::exit(1);
    }

    let mut args = std::env::args().skip(1);
    let model = args.next().unwrap_or_else(|| "claude-sonnet-4".to_string());
    let prompt = args
        .next()
        .unwrap_or_else(|| "Say hello in one short sentence, then list two numbers.".to_string());

    let client = HChatClient::builder()
        .delta_sink(Arc::new(TracingDeltaSink))
        .build()
        .context("building client")?;

    let request = ChatRequest::with_messages(
        model.clone(),
        vec![
            Message::system("You are a helpful assistant."),
            Message::user(prompt),
        ],
    )
    .thinking(model.to_lowercase().starts_with("claude-"))
    .max_tokens(2048);

    let mut stream = client
        .stream(&request)
        .await
        .with_context(|| format!("starting stream for {}", model))?;

    let mut stdout = std::io::stdout();
    while let Some(text) = stream.next().await {
        let text = text.context("stream failed")?;
        write!(stdout, "{}", text)?;
        stdout.flush()?;
    }
    println!();

    Ok(())
}
