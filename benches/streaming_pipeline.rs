//! Benchmarks for streaming pipeline performance
//!
//! This benchmark measures:
//! - SSE event assembly over fragmented input
//! - Claude adapter throughput (thinking state machine)
//! - Tool call assembly
//! - The full bytes → delta pipeline

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use futures::StreamExt;
use hchat_rust::drivers::{AdapterState, AnthropicDriver, OpenAiDriver, ProviderDriver};
use hchat_rust::pipeline::{Pipeline, SseEventAssembler};
use hchat_rust::types::events::ToolCallFragment;
use hchat_rust::utils::ToolCallAssembler;
use hchat_rust::BoxStream;
use std::sync::Arc;

/// Sample SSE frames (OpenAI format)
const SSE_FRAMES: &[&str] = &[
    r#"data: {"id":"chatcmpl-123","object":"chat.completion.chunk","created":1694268190,"model":"gpt-4o","choices":[{"index":0,"delta":{"role":"assistant","content":""},"finish_reason":null}]}"#,
    r#"data: {"id":"chatcmpl-123","object":"chat.completion.chunk","created":1694268190,"model":"gpt-4o","choices":[{"index":0,"delta":{"content":"Hello"},"finish_reason":null}]}"#,
    r#"data: {"id":"chatcmpl-123","object":"chat.completion.chunk","created":1694268190,"model":"gpt-4o","choices":[{"index":0,"delta":{"content":" there"},"finish_reason":null}]}"#,
    r#"data: {"id":"chatcmpl-123","object":"chat.completion.chunk","created":1694268190,"model":"gpt-4o","choices":[{"index":0,"delta":{"content":"!"},"finish_reason":null}]}"#,
    r#"data: {"id":"chatcmpl-123","object":"chat.completion.chunk","created":1694268190,"model":"gpt-4o","choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#,
    "data: [DONE]",
];

/// Claude thinking block followed by text
const CLAUDE_EVENTS: &[&str] = &[
    r#"{"type":"content_block_start","index":0,"content_block":{"type":"thinking","thinking":""}}"#,
    r#"{"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"Let me think"}}"#,
    r#"{"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":" about it."}}"#,
    r#"{"type":"content_block_stop","index":0}"#,
    r#"{"type":"content_block_start","index":1,"content_block":{"type":"text","text":""}}"#,
    r#"{"type":"content_block_delta","index":1,"delta":{"type":"text_delta","text":"The answer is 42."}}"#,
    r#"{"type":"content_block_stop","index":1}"#,
    r#"{"type":"message_stop"}"#,
];

fn sse_body() -> String {
    let mut body = SSE_FRAMES.join("\n\n");
    body.push_str("\n\n");
    body
}

fn bench_sse_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("sse_assembly");
    let body = sse_body();
    group.throughput(Throughput::Bytes(body.len() as u64));

    group.bench_function("single_chunk", |b| {
        b.iter(|| {
            let mut asm = SseEventAssembler::new();
            let events = asm.push(black_box(&body)).unwrap();
            black_box(events.len())
        })
    });

    for size in [16usize, 64, 512] {
        let pieces: Vec<&str> = body
            .as_bytes()
            .chunks(size)
            .map(|c| std::str::from_utf8(c).unwrap())
            .collect();
        group.bench_function(format!("fragmented_{}b", size), |b| {
            b.iter(|| {
                let mut asm = SseEventAssembler::new();
                let mut n = 0;
                for piece in &pieces {
                    n += asm.push(black_box(piece)).unwrap().len();
                }
                n
            })
        });
    }

    group.finish();
}

fn bench_claude_adapter(c: &mut Criterion) {
    let mut group = c.benchmark_group("claude_adapter");
    let driver = AnthropicDriver::new();
    let payloads: Vec<serde_json::Value> = CLAUDE_EVENTS
        .iter()
        .map(|e| serde_json::from_str(e).unwrap())
        .collect();
    group.throughput(Throughput::Elements(payloads.len() as u64));

    group.bench_function("thinking_block", |b| {
        b.iter(|| {
            let mut state = AdapterState::default();
            let mut emitted = 0;
            for p in &payloads {
                let (next, delta) = driver.adapt(state, black_box(p), "claude-sonnet-4").unwrap();
                state = next;
                emitted += delta.is_some() as usize;
            }
            emitted
        })
    });

    group.finish();
}

fn bench_tool_call_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("tool_call_assembly");
    let mut fragments = vec![ToolCallFragment::start(0, "call_abc123", "get_weather")];
    for chunk in ["{\"lo", "cation", "\": \"To", "kyo\"}"] {
        fragments.push(ToolCallFragment::arguments(0, chunk));
    }

    group.bench_function("single_call", |b| {
        b.iter(|| {
            let mut asm = ToolCallAssembler::new();
            asm.extend(black_box(&fragments));
            asm.finalize()
        })
    });

    group.finish();
}

fn bench_full_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_pipeline");
    let rt = tokio::runtime::Runtime::new().unwrap();
    let body = Bytes::from(sse_body());
    let pipeline = Pipeline::for_driver(Arc::new(OpenAiDriver::new()), "gpt-4o");
    group.throughput(Throughput::Bytes(body.len() as u64));

    group.bench_function("openai_stream", |b| {
        b.to_async(&rt).iter(|| async {
            let input: BoxStream<'static, Bytes> =
                Box::pin(futures::stream::iter(vec![Ok(body.clone())]));
            let deltas = pipeline.process_stream(input).await.unwrap();
            deltas.count().await
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_sse_assembly,
    bench_claude_adapter,
    bench_tool_call_assembly,
    bench_full_pipeline
);
criterion_main!(benches);
