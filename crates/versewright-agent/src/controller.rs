use anyhow::{Result, bail};
use serde::Serialize;
use std::path::PathBuf;
use versewright_core::{Action, Console, SessionConfig, SessionEvent, SessionState};
use versewright_local_ml::{SampleRequest, SequenceSampler, TokenCodec};
use versewright_observe::Observer;
use versewright_store::SaveGateway;

use crate::decision::{DecisionEngine, RoundView};
use crate::session::Session;

/// Result of a session that ended through `Quit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionOutcome {
    pub document: String,
    pub rounds: u64,
    pub saved: Vec<PathBuf>,
}

/// Batch request for `config` once the candidate length is known.
pub fn sample_request(config: &SessionConfig, length: usize) -> SampleRequest {
    SampleRequest {
        batch_size: config.batch_size,
        length,
        temperature: config.temperature,
        top_k: config.top_k,
        top_p: config.top_p,
    }
}

/// Drives sampling rounds and applies the human's decisions.
pub struct EditingController<'a> {
    codec: &'a dyn TokenCodec,
    sampler: &'a mut dyn SequenceSampler,
    console: &'a mut dyn Console,
    gateway: &'a SaveGateway,
    observer: Option<&'a Observer>,
    request: SampleRequest,
}

impl<'a> EditingController<'a> {
    pub fn new(
        codec: &'a dyn TokenCodec,
        sampler: &'a mut dyn SequenceSampler,
        console: &'a mut dyn Console,
        gateway: &'a SaveGateway,
        request: SampleRequest,
    ) -> Self {
        Self {
            codec,
            sampler,
            console,
            gateway,
            observer: None,
            request,
        }
    }

    pub fn with_observer(mut self, observer: &'a Observer) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn run(&mut self, prompt: &str) -> Result<SessionOutcome> {
        let codec = self.codec;
        let mut session = Session::start(codec, prompt)?;
        let mut rounds: u64 = 0;
        let mut saved = Vec::new();
        self.observe(SessionEvent::SessionStartedV1 {
            model: self.sampler.model_id().to_string(),
            prompt_tokens: session.context().len(),
        });

        loop {
            let visible = session.visible_text(codec)?;
            let batch = self.sampler.sample(session.context(), &self.request)?;
            if batch.is_empty() {
                bail!("sampler returned an empty batch");
            }
            rounds += 1;
            self.observe(SessionEvent::BatchSampledV1 {
                round: rounds,
                candidates: batch.len(),
                context_tokens: session.context().len(),
            });
            session.transition(SessionState::Presenting)?;

            let mut decision = None;
            for (index, ids) in batch.iter().enumerate() {
                let candidate = codec.decode(ids)?;
                let view = RoundView {
                    visible: &visible,
                    candidate: &candidate,
                    visible_tokens: session.visible_tokens(),
                };
                let action = DecisionEngine::new(codec).decide(&mut *self.console, &view)?;
                if !action.ends_round() {
                    session.transition(SessionState::Presenting)?;
                    self.observe(SessionEvent::CandidateRejectedV1 {
                        round: rounds,
                        candidate: index,
                    });
                    continue;
                }
                decision = Some(action);
                break;
            }

            let Some(action) = decision else {
                self.log(&format!("round {rounds}: every candidate rejected, resampling"));
                session.transition(SessionState::Resample)?;
                session.transition(SessionState::Sampling)?;
                continue;
            };
            session.transition(SessionState::for_action(&action))?;
            self.log(&format!("round {rounds}: {}", action.label()));

            if session.state().is_terminal() {
                let document = session.visible_text(codec)?;
                self.observe(SessionEvent::SessionEndedV1 {
                    rounds,
                    document_tokens: session.visible_tokens().len(),
                });
                return Ok(SessionOutcome {
                    document,
                    rounds,
                    saved,
                });
            }

            match &action {
                Action::Save(document) => {
                    match self.gateway.save(&mut *self.console, document)? {
                        Some(path) => {
                            self.observe(SessionEvent::DocumentSavedV1 {
                                path: path.display().to_string(),
                                bytes: document.len(),
                            });
                            saved.push(path);
                        }
                        None => self.warn("document not saved, continuing the session"),
                    }
                }
                Action::Accept(_) | Action::CustomText(_) => {
                    let tokens = session.apply(codec, &action)?;
                    self.observe(SessionEvent::ContinuationAcceptedV1 {
                        round: rounds,
                        tokens,
                        custom: matches!(action, Action::CustomText(_)),
                    });
                }
                Action::DeleteChunk(requested) => {
                    let removed = session.apply(codec, &action)?;
                    self.observe(SessionEvent::ChunksDeletedV1 {
                        requested: *requested,
                        removed,
                    });
                }
                Action::ResetPrompt => {
                    let discarded_tokens = session.apply(codec, &action)?;
                    self.observe(SessionEvent::PromptResetV1 { discarded_tokens });
                }
                Action::Reject | Action::Quit => {}
            }
            session.transition(SessionState::Sampling)?;
        }
    }

    fn observe(&self, event: SessionEvent) {
        if let Some(observer) = self.observer
            && let Err(e) = observer.record(event)
        {
            observer.warn_log(&format!("failed to record session event: {e}"));
        }
    }

    fn warn(&self, msg: &str) {
        if let Some(observer) = self.observer {
            observer.warn_log(msg);
        }
    }

    fn log(&self, msg: &str) {
        if let Some(observer) = self.observer {
            observer.verbose_log(msg);
        }
    }
}
