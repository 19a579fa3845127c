//! HTTP provider adapters against a mock server.

use std::time::Duration;

use ai_codegen::drivers::{create_driver, HttpProvider, Prompt, Provider, ProviderId};
use ai_codegen::error_code::ErrorClass;
use ai_codegen::pipeline::collect_events;
use ai_codegen::resilience::{CredentialLease, CredentialPool};
use ai_codegen::transport::HttpTransport;
use ai_codegen::{encode_event, StreamEvent};
use futures::StreamExt;
use mockito::Matcher;
use serde_json::json;

fn provider(id: ProviderId, url: &str, model: &str) -> HttpProvider {
    let transport = HttpTransport::new(url, Duration::from_secs(5)).unwrap();
    HttpProvider::new(create_driver(id), transport, model)
}

fn lease(id: ProviderId, secret: &str) -> CredentialLease {
    CredentialPool::new(id, [secret]).next().unwrap()
}

fn file_record(path: &str, content: &str) -> String {
    encode_event(&StreamEvent::File {
        path: path.into(),
        content: content.into(),
        language: None,
    })
}

#[tokio::test]
async fn ollama_complete_requests_json_format() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/generate")
        .match_body(Matcher::PartialJson(json!({
            "model": "qwen2.5-coder:7b",
            "stream": false,
            "format": "json",
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"response": "{\"files\":[]}", "done": true}).to_string())
        .create_async()
        .await;

    let ollama = provider(ProviderId::Ollama, &server.url(), "qwen2.5-coder:7b");
    let text = ollama.complete(&Prompt::files("todo app"), None).await.unwrap();
    assert_eq!(text, "{\"files\":[]}");
    mock.assert_async().await;
}

#[tokio::test]
async fn ollama_tags_endpoint_decides_reachability() {
    let mut server = mockito::Server::new_async().await;
    let tags = server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_body(r#"{"models":[]}"#)
        .create_async()
        .await;

    let up = provider(ProviderId::Ollama, &server.url(), "qwen2.5-coder:7b");
    assert!(up.is_reachable().await);
    tags.assert_async().await;

    let down = provider(ProviderId::Ollama, "http://127.0.0.1:9", "qwen2.5-coder:7b");
    assert!(!down.is_reachable().await);
}

#[tokio::test]
async fn ollama_ndjson_stream_rebuilds_file_events() {
    let wire = file_record("index.html", "<p>hi</p>");
    let (head, tail) = wire.split_at(20);
    let body = format!(
        "{}\n{}\n{}\n",
        json!({"response": head, "done": false}),
        json!({"response": tail, "done": false}),
        json!({"response": "", "done": true}),
    );

    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/generate")
        .match_body(Matcher::PartialJson(json!({"stream": true})))
        .with_status(200)
        .with_header("content-type", "application/x-ndjson")
        .with_body(body)
        .create_async()
        .await;

    let ollama = provider(ProviderId::Ollama, &server.url(), "qwen2.5-coder:7b");
    let bytes = ollama.stream(&Prompt::streaming("hi page"), None).await.unwrap();
    let events = collect_events(bytes).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].as_file().unwrap().path, "index.html");
}

#[tokio::test]
async fn gemini_complete_sends_key_header_and_model_path() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1beta/models/gemini-1.5-pro:generateContent")
        .match_header("x-goog-api-key", "AIza-test")
        .match_body(Matcher::PartialJson(json!({
            "generationConfig": {"responseMimeType": "application/json"}
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"candidates": [{"content": {"parts": [{"text": "{\"files\":[]}"}]}}]}).to_string(),
        )
        .create_async()
        .await;

    let gemini = provider(ProviderId::Gemini, &server.url(), "gemini-1.5-flash");
    let prompt = Prompt::files("x").with_model(Some("gemini-1.5-pro".into()));
    let text = gemini
        .complete(&prompt, Some(&lease(ProviderId::Gemini, "AIza-test")))
        .await
        .unwrap();
    assert_eq!(text, "{\"files\":[]}");
    mock.assert_async().await;
}

#[tokio::test]
async fn gemini_missing_candidates_is_malformed() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", Matcher::Regex("^/v1beta/models/".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#)
        .create_async()
        .await;

    let gemini = provider(ProviderId::Gemini, &server.url(), "gemini-1.5-flash");
    let err = gemini
        .complete(&Prompt::files("x"), Some(&lease(ProviderId::Gemini, "k")))
        .await
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::MalformedOutput);
}

#[tokio::test]
async fn gemini_sse_stream_yields_text_chunks() {
    let frame = |t: &str| {
        format!(
            "data: {}\n\n",
            json!({"candidates": [{"content": {"parts": [{"text": t}]}}]})
        )
    };
    let body = format!("{}{}", frame("data: {\"type\":\"status\","), frame("\"message\":\"ok\"}\n\n"));

    let mut server = mockito::Server::new_async().await;
    server
        .mock(
            "POST",
            Matcher::Regex("^/v1beta/models/gemini-1\\.5-flash:streamGenerateContent".into()),
        )
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let gemini = provider(ProviderId::Gemini, &server.url(), "gemini-1.5-flash");
    let bytes = gemini
        .stream(&Prompt::streaming("x"), Some(&lease(ProviderId::Gemini, "k")))
        .await
        .unwrap();
    let events = collect_events(bytes).await.unwrap();
    assert_eq!(events, vec![StreamEvent::status("ok")]);
}

#[tokio::test]
async fn groq_rate_limit_carries_retry_after() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer gsk-test")
        .with_status(429)
        .with_header("retry-after", "12")
        .with_body(r#"{"error":{"message":"Rate limit reached"}}"#)
        .create_async()
        .await;

    let groq = provider(ProviderId::Groq, &server.url(), "llama-3.1-8b-instant");
    let err = groq
        .complete(&Prompt::files("x"), Some(&lease(ProviderId::Groq, "gsk-test")))
        .await
        .unwrap_err();
    assert!(err.is_rate_limited());
    assert_eq!(err.retry_after(), Some(Duration::from_secs(12)));
    assert!(err.to_string().contains("Rate limit reached"));
}

#[tokio::test]
async fn openai_stream_stops_at_done() {
    let delta = |t: &str| format!("data: {}\n\n", json!({"choices": [{"delta": {"content": t}}]}));
    let body = format!(
        "{}{}data: [DONE]\n\n{}",
        delta(&file_record("a.ts", "let a = 1")),
        delta(""),
        delta(&file_record("ignored.ts", "")),
    );

    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::PartialJson(json!({"model": "gpt-4o-mini", "stream": true})))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let openai = provider(ProviderId::OpenAi, &server.url(), "gpt-4o-mini");
    let bytes = openai
        .stream(&Prompt::streaming("x"), Some(&lease(ProviderId::OpenAi, "sk")))
        .await
        .unwrap();
    let events = collect_events(bytes).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].as_file().unwrap().path, "a.ts");
}

#[tokio::test]
async fn anthropic_stream_sends_version_and_reads_deltas() {
    let sse = |event: &str, data: serde_json::Value| format!("event: {}\ndata: {}\n\n", event, data);
    let record = file_record("main.py", "print(1)");
    let (head, tail) = record.split_at(15);
    let body = [
        sse("message_start", json!({"type": "message_start", "message": {}})),
        sse(
            "content_block_delta",
            json!({"type": "content_block_delta", "delta": {"type": "text_delta", "text": head}}),
        ),
        sse("ping", json!({"type": "ping"})),
        sse(
            "content_block_delta",
            json!({"type": "content_block_delta", "delta": {"type": "text_delta", "text": tail}}),
        ),
        sse("message_stop", json!({"type": "message_stop"})),
    ]
    .concat();

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "sk-ant")
        .match_header("anthropic-version", "2023-06-01")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let anthropic = provider(ProviderId::Anthropic, &server.url(), "claude-3-5-sonnet-latest");
    let bytes = anthropic
        .stream(&Prompt::streaming("x"), Some(&lease(ProviderId::Anthropic, "sk-ant")))
        .await
        .unwrap();
    let events = collect_events(bytes).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].as_file().unwrap().language, "python");
    mock.assert_async().await;
}

#[tokio::test]
async fn anthropic_overloaded_event_fails_the_stream() {
    let body = format!(
        "event: error\ndata: {}\n\n",
        json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}})
    );
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let anthropic = provider(ProviderId::Anthropic, &server.url(), "claude-3-5-sonnet-latest");
    let mut bytes = anthropic
        .stream(&Prompt::streaming("x"), Some(&lease(ProviderId::Anthropic, "k")))
        .await
        .unwrap();
    let err = bytes.next().await.unwrap().unwrap_err();
    assert_eq!(err.class(), ErrorClass::Overloaded);
}
