//! Shared fixtures: scripted providers and registry builders.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use ai_codegen::audit::Auditor;
use ai_codegen::cache::{CacheConfig, ResponseCache};
use ai_codegen::drivers::{Prompt, Provider, ProviderId};
use ai_codegen::error::Error;
use ai_codegen::registry::{ModelRouter, ProviderProfile, ProviderRegistry};
use ai_codegen::resilience::{CredentialLease, CredentialPool};
use ai_codegen::transport::TransportError;
use ai_codegen::{BoxStream, Orchestrator, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use parking_lot::Mutex;

pub const DEBOUNCE_PROMPT: &str = "Create a TypeScript function to debounce user input";

pub fn debounce_payload() -> String {
    serde_json::json!({
        "files": [{
            "path": "src/debounce.ts",
            "content": "export function debounce<T extends (...args: any[]) => void>(fn: T, wait = 300) {\n  let t: ReturnType<typeof setTimeout> | undefined;\n  return (...args: Parameters<T>) => {\n    clearTimeout(t);\n    t = setTimeout(() => fn(...args), wait);\n  };\n}\n",
            "language": "typescript"
        }]
    })
    .to_string()
}

/// One scripted provider answer.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Status(u16, Option<u32>),
    Unreachable,
    Chunks(Vec<String>),
}

/// What the provider saw on one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub credential: Option<usize>,
    pub secret: Option<String>,
    pub model: Option<String>,
}

pub struct ScriptedProvider {
    id: ProviderId,
    reachable: bool,
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedProvider {
    /// Plays `script` in order, then repeats `fallback`.
    pub fn new(id: ProviderId, script: Vec<Reply>, fallback: Reply) -> Arc<Self> {
        Arc::new(Self {
            id,
            reachable: true,
            script: Mutex::new(script.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn always(id: ProviderId, reply: Reply) -> Arc<Self> {
        Self::new(id, Vec::new(), reply)
    }

    pub fn down(id: ProviderId) -> Arc<Self> {
        Arc::new(Self {
            id,
            reachable: false,
            script: Mutex::new(VecDeque::new()),
            fallback: Reply::Unreachable,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    fn next_reply(&self, prompt: &Prompt, credential: Option<&CredentialLease>) -> Reply {
        self.calls.lock().push(Call {
            credential: credential.map(|c| c.index()),
            secret: credential.map(|c| c.secret().to_string()),
            model: prompt.model.clone(),
        });
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

fn failure(reply: &Reply) -> Option<Error> {
    match reply {
        Reply::Status(status, retry) => Some(Error::remote(*status, "scripted failure", *retry)),
        Reply::Unreachable => Some(Error::Transport(TransportError::Connect(
            "connection refused".into(),
        ))),
        _ => None,
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }

    async fn is_reachable(&self) -> bool {
        self.reachable
    }

    async fn complete(&self, prompt: &Prompt, credential: Option<&CredentialLease>) -> Result<String> {
        let reply = self.next_reply(prompt, credential);
        if let Some(e) = failure(&reply) {
            return Err(e);
        }
        Ok(match reply {
            Reply::Text(t) => t,
            Reply::Chunks(c) => c.concat(),
            _ => unreachable!(),
        })
    }

    async fn stream(
        &self,
        prompt: &Prompt,
        credential: Option<&CredentialLease>,
    ) -> Result<BoxStream<'static, Bytes>> {
        let reply = self.next_reply(prompt, credential);
        if let Some(e) = failure(&reply) {
            return Err(e);
        }
        let chunks = match reply {
            Reply::Text(t) => vec![t],
            Reply::Chunks(c) => c,
            _ => unreachable!(),
        };
        Ok(Box::pin(stream::iter(
            chunks.into_iter().map(|c| Ok(Bytes::from(c))),
        )))
    }
}

pub fn profile(
    provider: Arc<ScriptedProvider>,
    keys: &[&str],
    priority: u32,
    fallback: bool,
) -> ProviderProfile {
    let pool = CredentialPool::new(provider.id(), keys.iter().copied());
    ProviderProfile::new(provider, Arc::new(pool), priority, fallback)
}

pub fn orchestrator(profiles: Vec<ProviderProfile>) -> Orchestrator {
    orchestrator_with(profiles, Auditor::default())
}

pub fn orchestrator_with(profiles: Vec<ProviderProfile>, auditor: Auditor) -> Orchestrator {
    let mut registry = ProviderRegistry::new();
    for p in profiles {
        registry.register(p);
    }
    Orchestrator::new(
        registry,
        ModelRouter::default(),
        ResponseCache::from_config(CacheConfig::default()),
        auditor,
    )
    .unwrap()
}
