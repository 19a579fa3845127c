//! Streaming entry points.
//!
//! One run moves through fixed phases. Each step of the `unfold` drains the outbox
//! first, so events leave in the order they were produced.

use std::collections::VecDeque;

use futures::{stream, StreamExt};

use super::{report_failure, wait_hint, EventStream, Orchestrator};
use crate::audit::AuditContext;
use crate::drivers::Prompt;
use crate::pipeline::reconstruct;
use crate::registry::ProviderProfile;
use crate::resilience::{CredentialLease, PoolError};
use crate::types::{EditRequest, GeneratedFile, GenerationRequest, StreamEvent};
use crate::BoxStream;

enum Phase {
    Start,
    Streaming {
        events: BoxStream<'static, StreamEvent>,
        profile: ProviderProfile,
        lease: Option<CredentialLease>,
    },
    Audit,
    Finish,
    Done,
}

struct Run {
    orchestrator: Orchestrator,
    model_hint: Option<String>,
    prompt: Prompt,
    context: AuditContext,
    phase: Phase,
    outbox: VecDeque<StreamEvent>,
    files: Vec<GeneratedFile>,
    /// Zero files is a failure for generation; an edit may leave everything as is.
    require_files: bool,
}

impl Orchestrator {
    /// Stream generated files as they are reconstructed.
    ///
    /// Always ends with exactly one `Complete`; any failure becomes an `Error` event first.
    pub fn generate_files(&self, request: GenerationRequest) -> EventStream {
        let prompt = Prompt::streaming(&request.prompt);
        let context = AuditContext::new(request.prompt);
        self.run_stream(prompt, request.model_hint, context, true)
    }

    /// Same contract as [`generate_files`](Self::generate_files); the prompt carries the
    /// current files and the edit instruction. An edit that changes no file is not an
    /// error: the stream simply ends with `Complete`.
    pub fn edit_files(&self, request: EditRequest) -> EventStream {
        let prompt = Prompt::edit(&request.files, &request.instruction);
        let context =
            AuditContext::new(request.instruction.clone()).with_diagnostics(request.instruction);
        self.run_stream(prompt, request.model_hint, context, false)
    }

    fn run_stream(
        &self,
        prompt: Prompt,
        model_hint: Option<String>,
        context: AuditContext,
        require_files: bool,
    ) -> EventStream {
        let run = Run {
            orchestrator: self.clone(),
            model_hint,
            prompt,
            context,
            phase: Phase::Start,
            outbox: VecDeque::new(),
            files: Vec::new(),
            require_files,
        };
        Box::pin(stream::unfold(run, |mut run| async move {
            loop {
                if let Some(event) = run.outbox.pop_front() {
                    return Some((event, run));
                }
                if matches!(run.phase, Phase::Done) {
                    return None;
                }
                run.advance().await;
            }
        }))
    }
}

impl Run {
    async fn advance(&mut self) {
        let phase = std::mem::replace(&mut self.phase, Phase::Done);
        self.phase = match phase {
            Phase::Start => self.start().await,
            Phase::Streaming {
                mut events,
                profile,
                lease,
            } => match events.next().await {
                Some(Ok(event)) => {
                    self.accept(event);
                    Phase::Streaming {
                        events,
                        profile,
                        lease,
                    }
                }
                Some(Err(e)) => {
                    self.orchestrator.stats.record_error();
                    report_failure(&profile.pool, lease.as_ref(), &e);
                    tracing::warn!(provider = %profile.id, error = %e, "stream failed");
                    self.outbox
                        .push_back(StreamEvent::error(format!("Generation with {} failed: {}", profile.id, e)));
                    Phase::Finish
                }
                None => {
                    if let Some(lease) = &lease {
                        profile.pool.mark_success(lease);
                    }
                    tracing::info!(provider = %profile.id, files = self.files.len(), "stream finished");
                    if self.files.is_empty() {
                        if self.require_files {
                            self.outbox
                                .push_back(StreamEvent::error("The model finished without producing any files"));
                        }
                        Phase::Finish
                    } else if self.orchestrator.auditor.is_enabled() {
                        self.outbox
                            .push_back(StreamEvent::status("Checking generated files"));
                        Phase::Audit
                    } else {
                        Phase::Finish
                    }
                }
            },
            Phase::Audit => {
                self.audit().await;
                Phase::Finish
            }
            Phase::Finish => {
                self.outbox.push_back(StreamEvent::Complete);
                Phase::Done
            }
            Phase::Done => Phase::Done,
        };
    }

    async fn start(&mut self) -> Phase {
        let orch = &self.orchestrator;
        orch.stats.record_request();

        let route = orch.router.route(self.model_hint.as_deref());
        let Some(profile) = orch.registry.get(route.provider).cloned() else {
            orch.stats.record_error();
            self.outbox.push_back(StreamEvent::error(format!(
                "Provider {} is not configured",
                route.provider
            )));
            return Phase::Finish;
        };
        if !profile.is_configured() {
            orch.stats.record_error();
            self.outbox.push_back(StreamEvent::error(format!(
                "Provider {} has no credentials",
                profile.id
            )));
            return Phase::Finish;
        }

        let lease = if profile.id.requires_credential() {
            match profile.pool.next() {
                Ok(lease) => Some(lease),
                Err(e @ PoolError::Exhausted { .. }) => {
                    orch.stats.record_error();
                    self.outbox.push_back(StreamEvent::error(format!(
                        "All {} credentials are busy, {}",
                        profile.id,
                        wait_hint(e.retry_after())
                    )));
                    return Phase::Finish;
                }
            }
        } else {
            None
        };

        orch.stats.record_call(profile.id);
        self.outbox
            .push_back(StreamEvent::status(format!("Generating with {}", profile.id)));

        let prompt = self.prompt.clone().with_model(route.model);
        tracing::debug!(
            provider = %profile.id,
            model = prompt.model.as_deref().unwrap_or(profile.provider.default_model()),
            credential = lease.as_ref().map(|l| l.index()),
            "opening stream"
        );

        match profile.provider.stream(&prompt, lease.as_ref()).await {
            Ok(body) => Phase::Streaming {
                events: reconstruct(body),
                profile,
                lease,
            },
            Err(e) => {
                orch.stats.record_error();
                report_failure(&profile.pool, lease.as_ref(), &e);
                tracing::warn!(provider = %profile.id, error = %e, "stream could not be opened");
                self.outbox
                    .push_back(StreamEvent::error(format!("Generation with {} failed: {}", profile.id, e)));
                Phase::Finish
            }
        }
    }

    fn accept(&mut self, event: StreamEvent) {
        match event {
            // Terminal event is ours to send.
            StreamEvent::Complete => {}
            event @ StreamEvent::File { .. } => {
                if let Some(file) = event.as_file() {
                    self.outbox.push_back(StreamEvent::from(file.clone()));
                    self.files.push(file);
                }
            }
            other => self.outbox.push_back(other),
        }
    }

    async fn audit(&mut self) {
        let auditor = &self.orchestrator.auditor;
        let before = std::mem::take(&mut self.files);
        let outcome = auditor.audit(before.clone(), &self.context).await;
        let changed: Vec<StreamEvent> = outcome
            .changed(&before)
            .cloned()
            .map(StreamEvent::from)
            .collect();
        if !changed.is_empty() {
            tracing::info!(files = changed.len(), "audit replaced files");
        }
        self.outbox.extend(changed);
        self.files = outcome.files_after;
    }
}
