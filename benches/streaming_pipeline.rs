//! Benchmarks for streaming reconstruction
//!
//! This benchmark measures:
//! - Event reconstruction over different chunk sizes
//! - SSE frame decoding of provider output
//! - Payload extraction and validation

use ai_codegen::pipeline::{collect_events, create_decoder, Decoder, Framing, StreamReconstructor};
use ai_codegen::structured::PayloadValidator;
use ai_codegen::{encode_event, BoxStream, StreamEvent};
use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use futures::{stream, StreamExt};

/// A ten-file project in wire format.
fn sample_wire() -> String {
    let mut wire = encode_event(&StreamEvent::status("Planning files"));
    for i in 0..10 {
        wire.push_str(&encode_event(&StreamEvent::File {
            path: format!("src/components/Widget{}.tsx", i),
            content: "export function Widget() {\n  return <div className=\"p-4\">Hello</div>;\n}\n"
                .repeat(20),
            language: None,
        }));
    }
    wire.push_str(&encode_event(&StreamEvent::Complete));
    wire
}

fn bench_reconstructor(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconstructor");
    let wire = sample_wire();
    group.throughput(Throughput::Bytes(wire.len() as u64));

    for chunk in [16usize, 256, 4096] {
        group.bench_with_input(BenchmarkId::new("chunk_size", chunk), &chunk, |b, &chunk| {
            b.iter(|| {
                let mut rec = StreamReconstructor::new();
                let mut count = 0;
                for piece in wire.as_bytes().chunks(chunk) {
                    count += rec.push(black_box(piece)).len();
                }
                count += rec.finish().len();
                assert_eq!(count, 12);
            })
        });
    }

    let rt = tokio::runtime::Runtime::new().unwrap();
    group.bench_function("stream_adapter", |b| {
        b.iter(|| {
            let chunks: Vec<Bytes> = wire
                .as_bytes()
                .chunks(512)
                .map(Bytes::copy_from_slice)
                .collect();
            let input: BoxStream<'static, Bytes> = Box::pin(stream::iter(chunks.into_iter().map(Ok)));
            let events = rt.block_on(collect_events(input)).unwrap();
            black_box(events.len())
        })
    });

    group.finish();
}

fn bench_sse_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("sse_decoding");
    let wire = sample_wire();
    let body: String = wire
        .as_bytes()
        .chunks(64)
        .map(|piece| {
            let text = String::from_utf8_lossy(piece);
            format!(
                "data: {}\n\n",
                serde_json::json!({"choices": [{"delta": {"content": text}}]})
            )
        })
        .collect();
    group.throughput(Throughput::Bytes(body.len() as u64));

    let rt = tokio::runtime::Runtime::new().unwrap();
    group.bench_function("openai_frames", |b| {
        b.iter(|| {
            rt.block_on(async {
                let input: BoxStream<'static, Bytes> =
                    Box::pin(stream::iter(vec![Ok(Bytes::from(body.clone()))]));
                let frames = create_decoder(Framing::Sse).decode_stream(input).await.unwrap();
                black_box(frames.count().await)
            })
        })
    });

    group.finish();
}

fn bench_payload_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("payload_validation");
    let validator = PayloadValidator::new().unwrap();
    let files: Vec<serde_json::Value> = (0..10)
        .map(|i| {
            serde_json::json!({
                "path": format!("src/module{}.ts", i),
                "content": "export const value = 1;\n".repeat(40),
            })
        })
        .collect();
    let fenced = format!(
        "Here you go:\n```json\n{}\n```\n",
        serde_json::json!({ "files": files })
    );

    group.bench_function("parse_fenced_payload", |b| {
        b.iter(|| validator.parse(black_box(&fenced)).unwrap())
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_reconstructor,
    bench_sse_decoding,
    bench_payload_validation
);
criterion_main!(benches);
