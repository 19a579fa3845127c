//! Non-streaming orchestrator scenarios against scripted providers.

mod common;

use ai_codegen::drivers::ProviderId;
use ai_codegen::resilience::CredentialHealth;
use ai_codegen::{GenerationRequest, HealthStatus};
use common::{debounce_payload, orchestrator, profile, Reply, ScriptedProvider, DEBOUNCE_PROMPT};

#[tokio::test]
async fn end_to_end_debounce_is_cached_on_repeat() {
    let ollama = ScriptedProvider::down(ProviderId::Ollama);
    let gemini = ScriptedProvider::always(ProviderId::Gemini, Reply::Text(debounce_payload()));
    let orch = orchestrator(vec![
        profile(ollama.clone(), &[], 0, true),
        profile(gemini.clone(), &["g1", "g2"], 1, true),
    ]);

    let request = GenerationRequest::new(DEBOUNCE_PROMPT);
    let first = orch.generate_code(&request).await;
    assert!(first.success);
    assert!(!first.cached);
    assert_eq!(first.provider.as_deref(), Some("gemini"));
    assert!(!first.files.is_empty());
    assert_eq!(first.files[0].language, "typescript");

    let second = orch.generate_code(&request).await;
    assert!(second.cached);
    assert_eq!(second.provider.as_deref(), Some("gemini"));
    assert_eq!(second.files, first.files);

    assert_eq!(gemini.calls().len(), 1);
    assert!(ollama.calls().is_empty());
    let stats = orch.stats();
    assert_eq!(stats.total_requests, 2);
    assert_eq!(stats.cache_hits, 1);
}

#[tokio::test]
async fn normalized_prompt_hits_exact_key() {
    let gemini = ScriptedProvider::always(ProviderId::Gemini, Reply::Text(debounce_payload()));
    let orch = orchestrator(vec![profile(gemini.clone(), &["g1"], 1, true)]);

    orch.generate_code(&GenerationRequest::new(DEBOUNCE_PROMPT)).await;
    let again = orch
        .generate_code(&GenerationRequest::new(
            "  create a typescript   FUNCTION to debounce user input ",
        ))
        .await;
    assert!(again.cached);
    assert_eq!(gemini.calls().len(), 1);
}

#[tokio::test]
async fn local_runner_wins_when_reachable() {
    let ollama = ScriptedProvider::always(ProviderId::Ollama, Reply::Text(debounce_payload()));
    let gemini = ScriptedProvider::always(ProviderId::Gemini, Reply::Text(debounce_payload()));
    let orch = orchestrator(vec![
        profile(gemini.clone(), &["g1"], 1, true),
        profile(ollama.clone(), &[], 0, true),
    ]);

    let result = orch.generate_code(&GenerationRequest::new("a landing page")).await;
    assert_eq!(result.provider.as_deref(), Some("ollama"));
    assert_eq!(ollama.calls()[0].credential, None);
    assert!(gemini.calls().is_empty());
}

#[tokio::test]
async fn rate_limit_rotates_to_next_credential() {
    let gemini = ScriptedProvider::new(
        ProviderId::Gemini,
        vec![Reply::Status(429, Some(30_000))],
        Reply::Text(debounce_payload()),
    );
    let g = profile(gemini.clone(), &["key-a", "key-b", "key-c"], 1, true);
    let pool = g.pool.clone();
    let orch = orchestrator(vec![g]);

    let result = orch.generate_code(&GenerationRequest::new("todo app")).await;
    assert!(result.success);

    let used: Vec<Option<String>> = gemini.calls().into_iter().map(|c| c.secret).collect();
    assert_eq!(used, vec![Some("key-a".into()), Some("key-b".into())]);
    assert!(matches!(
        pool.credential(0).unwrap().health,
        CredentialHealth::RateLimited { .. }
    ));
    assert_eq!(pool.credential(1).unwrap().consecutive_errors, 0);
    assert_eq!(orch.stats().key_rotations, 1);
    assert_eq!(orch.stats().per_provider_calls.get("gemini"), Some(&2));
}

#[tokio::test]
async fn exhaustion_is_a_soft_failure_with_retry_hint() {
    let ollama = ScriptedProvider::down(ProviderId::Ollama);
    let gemini = ScriptedProvider::always(ProviderId::Gemini, Reply::Status(429, Some(30_000)));
    let groq = ScriptedProvider::always(ProviderId::Groq, Reply::Status(429, Some(45_000)));
    let orch = orchestrator(vec![
        profile(ollama, &[], 0, true),
        profile(gemini.clone(), &["g1", "g2"], 1, true),
        profile(groq.clone(), &["q1"], 2, true),
    ]);

    let result = orch.generate_code(&GenerationRequest::new("weather widget")).await;
    assert!(!result.success);
    assert!(result.is_refreshing);
    assert!(result.files.is_empty());
    assert!(result.message.as_deref().unwrap_or_default().contains("try again"));
    let wait = result.retry_after_secs.unwrap();
    assert!((29..=30).contains(&wait), "wait was {}", wait);
    assert_eq!(gemini.calls().len(), 2);
    assert_eq!(groq.calls().len(), 1);

    // Every key is still cooling down: no provider call at all this time.
    let again = orch.generate_code(&GenerationRequest::new("weather widget")).await;
    assert!(again.is_refreshing);
    assert_eq!(gemini.calls().len(), 2);
    assert_eq!(groq.calls().len(), 1);

    let json = serde_json::to_value(&again).unwrap();
    assert_eq!(json["isRefreshing"], true);
    assert!(json.get("retryAfterSecs").is_some());
}

#[tokio::test]
async fn malformed_payload_falls_back_without_penalty() {
    let gemini = ScriptedProvider::always(
        ProviderId::Gemini,
        Reply::Text("Sure! Here is how you could build it...".into()),
    );
    let groq = ScriptedProvider::always(ProviderId::Groq, Reply::Text(debounce_payload()));
    let g = profile(gemini.clone(), &["g1", "g2"], 1, true);
    let gemini_pool = g.pool.clone();
    let orch = orchestrator(vec![g, profile(groq, &["q1"], 2, true)]);

    let result = orch.generate_code(&GenerationRequest::new("debounce helper")).await;
    assert_eq!(result.provider.as_deref(), Some("groq"));
    assert_eq!(gemini.calls().len(), 1);
    let cred = gemini_pool.credential(0).unwrap();
    assert_eq!(cred.consecutive_errors, 0);
    assert_eq!(cred.health, CredentialHealth::Healthy);
}

#[tokio::test]
async fn empty_file_list_is_malformed() {
    let gemini = ScriptedProvider::always(ProviderId::Gemini, Reply::Text(r#"{"files":[]}"#.into()));
    let orch = orchestrator(vec![profile(gemini, &["g1"], 1, true)]);
    let result = orch.generate_code(&GenerationRequest::new("anything")).await;
    assert!(result.is_refreshing);
    assert_eq!(result.retry_after_secs, None);
}

#[tokio::test]
async fn auth_failures_disable_a_credential_after_five() {
    let gemini = ScriptedProvider::always(ProviderId::Gemini, Reply::Status(401, None));
    let g = profile(gemini.clone(), &["bad"], 1, true);
    let pool = g.pool.clone();
    let orch = orchestrator(vec![g]);

    for i in 0..5 {
        let result = orch
            .generate_code(&GenerationRequest::new(format!("request number {}", i)))
            .await;
        assert!(result.is_refreshing);
    }
    assert_eq!(pool.credential(0).unwrap().health, CredentialHealth::Disabled);
    assert_eq!(pool.snapshot().disabled, 1);

    orch.generate_code(&GenerationRequest::new("one more")).await;
    assert_eq!(gemini.calls().len(), 5);
}

#[tokio::test]
async fn providers_without_keys_are_skipped() {
    let gemini = ScriptedProvider::always(ProviderId::Gemini, Reply::Text(debounce_payload()));
    let groq = ScriptedProvider::always(ProviderId::Groq, Reply::Text(debounce_payload()));
    let orch = orchestrator(vec![
        profile(gemini.clone(), &[], 1, true),
        profile(groq, &["q1"], 2, true),
    ]);
    let result = orch.generate_code(&GenerationRequest::new("calculator")).await;
    assert_eq!(result.provider.as_deref(), Some("groq"));
    assert!(gemini.calls().is_empty());
}

#[tokio::test]
async fn paid_backends_stay_out_of_the_chain() {
    let openai = ScriptedProvider::always(ProviderId::OpenAi, Reply::Text(debounce_payload()));
    let orch = orchestrator(vec![profile(openai.clone(), &["sk"], 3, false)]);
    let result = orch
        .generate_code(&GenerationRequest::new("calculator").with_model("gpt-4o"))
        .await;
    assert!(result.is_refreshing);
    assert!(openai.calls().is_empty());
}

#[tokio::test]
async fn model_hint_overrides_matching_chain_member() {
    let gemini = ScriptedProvider::new(
        ProviderId::Gemini,
        vec![Reply::Status(503, None)],
        Reply::Text(debounce_payload()),
    );
    let groq = ScriptedProvider::always(ProviderId::Groq, Reply::Text(debounce_payload()));
    let orch = orchestrator(vec![
        profile(gemini.clone(), &["g1"], 1, true),
        profile(groq.clone(), &["q1"], 2, true),
    ]);

    let result = orch
        .generate_code(&GenerationRequest::new("snake game").with_model("groq/llama-3.3-70b-versatile"))
        .await;
    assert_eq!(result.provider.as_deref(), Some("groq"));
    assert_eq!(gemini.calls()[0].model, None);
    assert_eq!(groq.calls()[0].model.as_deref(), Some("llama-3.3-70b-versatile"));
}

#[tokio::test]
async fn blank_prompt_is_a_soft_failure() {
    let gemini = ScriptedProvider::always(ProviderId::Gemini, Reply::Text(debounce_payload()));
    let orch = orchestrator(vec![profile(gemini.clone(), &["g1"], 1, true)]);
    let result = orch.generate_code(&GenerationRequest::new("   ")).await;
    assert!(!result.success);
    assert!(result.is_refreshing);
    assert!(gemini.calls().is_empty());
    assert_eq!(orch.stats().errors, 1);
}

#[tokio::test]
async fn clear_cache_forces_a_new_call() {
    let gemini = ScriptedProvider::always(ProviderId::Gemini, Reply::Text(debounce_payload()));
    let orch = orchestrator(vec![profile(gemini.clone(), &["g1"], 1, true)]);
    let request = GenerationRequest::new(DEBOUNCE_PROMPT);
    orch.generate_code(&request).await;
    orch.clear_cache().await.unwrap();
    let result = orch.generate_code(&request).await;
    assert!(!result.cached);
    assert_eq!(gemini.calls().len(), 2);
}

#[tokio::test]
async fn health_reports_degraded_and_down() {
    let ollama = ScriptedProvider::down(ProviderId::Ollama);
    let gemini = ScriptedProvider::always(ProviderId::Gemini, Reply::Text(debounce_payload()));
    let groq = ScriptedProvider::always(ProviderId::Groq, Reply::Text(debounce_payload()));
    let orch = orchestrator(vec![
        profile(ollama, &[], 0, true),
        profile(gemini, &["g1", "g2"], 1, true),
        profile(groq, &[], 2, true),
    ]);

    let report = orch.health().await;
    assert_eq!(report.status, HealthStatus::Degraded);
    let ids: Vec<ProviderId> = report.providers.iter().map(|p| p.provider).collect();
    assert_eq!(ids, vec![ProviderId::Ollama, ProviderId::Gemini, ProviderId::Groq]);
    assert_eq!(report.providers[1].credential_count, 2);
    assert!(report.providers[1].available);
    assert!(!report.providers[2].available);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["providers"][1]["credentialCount"], 2);

    let empty = orchestrator(vec![]);
    assert_eq!(empty.health().await.status, HealthStatus::Down);
}

#[tokio::test]
async fn connection_failures_leave_the_key_usable() {
    let gemini = ScriptedProvider::new(
        ProviderId::Gemini,
        vec![Reply::Unreachable; 5],
        Reply::Text(debounce_payload()),
    );
    let g = profile(gemini.clone(), &["g1"], 1, true);
    let pool = g.pool.clone();
    let orch = orchestrator(vec![g]);

    for i in 0..5 {
        let result = orch
            .generate_code(&GenerationRequest::new(format!("offline attempt {}", i)))
            .await;
        assert!(result.is_refreshing);
    }
    let cred = pool.credential(0).unwrap();
    assert_eq!(cred.consecutive_errors, 0);
    assert_eq!(cred.health, CredentialHealth::Healthy);

    let result = orch.generate_code(&GenerationRequest::new("back online")).await;
    assert!(result.success);
    assert_eq!(result.provider.as_deref(), Some("gemini"));
    assert_eq!(gemini.calls().len(), 6);
}

#[tokio::test]
async fn refused_prompt_does_not_count_against_the_key() {
    let gemini = ScriptedProvider::always(ProviderId::Gemini, Reply::Status(413, None));
    let g = profile(gemini, &["g1"], 1, true);
    let pool = g.pool.clone();
    let orch = orchestrator(vec![g]);

    let result = orch.generate_code(&GenerationRequest::new("a very long prompt")).await;
    assert!(result.is_refreshing);
    assert_eq!(pool.credential(0).unwrap().consecutive_errors, 0);
}
