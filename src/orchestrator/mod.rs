//! Interaction orchestrator.
//!
//! Owns the listening state, the event history, the keyword poller lifecycle
//! and the collaborators. `Orchestrator` is a cheap clonable handle; every
//! flow runs against the same shared core.
//!
//! Mutations of state and history go through this module only. Each one bumps
//! a revision counter that presentation layers subscribe to.

mod consent_flow;
mod dispatch;
mod wake_flow;

pub use dispatch::Dispatch;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::audio::{AudioSink, Cue, CueBank};
use crate::cancellation::{guarded, TaskGeneration};
use crate::capture::ScreenEngine;
use crate::config::AppConfig;
use crate::error::{IveeError, Result};
use crate::history::{Event, EventHistory};
use crate::keyword::KeywordEngine;
use crate::llm::{ChatMessage, CompletionRequest, LanguageModel};
use crate::metrics::{metric_names, MetricSummary, MetricsRegistry};
use crate::poller::KeywordPoller;
use crate::responder::ResponseSynthesizer;
use crate::speech::SpeechEngine;
use crate::state_machine::{ConsentPhase, ListeningState, StateMachine};
use crate::tts::SpeechSynthesizer;

/// External services the orchestrator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub keywords: Arc<dyn KeywordEngine>,
    pub speech: Arc<dyn SpeechEngine>,
    pub screen: Arc<dyn ScreenEngine>,
    pub model: Arc<dyn LanguageModel>,
    pub tts: Arc<dyn SpeechSynthesizer>,
    pub sink: Arc<dyn AudioSink>,
}

/// Presentation-facing status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub state: ListeningState,
    pub loading: bool,
    pub speech_listening: bool,
    pub error: Option<String>,
    pub consent_phase: Option<ConsentPhase>,
}

#[derive(Debug, Default)]
struct StatusFlags {
    loading: bool,
    speech_listening: bool,
    error: Option<String>,
    consent_phase: Option<ConsentPhase>,
}

struct Inner {
    config: AppConfig,
    keywords: Arc<dyn KeywordEngine>,
    speech: Arc<dyn SpeechEngine>,
    screen: Arc<dyn ScreenEngine>,
    model: Arc<dyn LanguageModel>,
    sink: Arc<dyn AudioSink>,
    responder: ResponseSynthesizer,
    cues: CueBank,
    state: StateMachine,
    history: RwLock<EventHistory>,
    status: Mutex<StatusFlags>,
    poller: TaskGeneration,
    /// Parent of every pipeline run; cancelled on shutdown.
    root: CancellationToken,
    metrics: Arc<MetricsRegistry>,
    /// One permit: serializes wake flows under `WakePolicy::Serialize`.
    wake_gate: Semaphore,
    revision_tx: watch::Sender<u64>,
}

#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(config: AppConfig, collaborators: Collaborators, cues: CueBank) -> Self {
        let Collaborators {
            keywords,
            speech,
            screen,
            model,
            tts,
            sink,
        } = collaborators;
        let responder = ResponseSynthesizer::new(tts, Arc::clone(&sink), config.voice_id.clone());
        let history = EventHistory::with_capacity(config.history_capacity.max(1));
        let (revision_tx, _) = watch::channel(0);

        Self {
            inner: Arc::new(Inner {
                config,
                keywords,
                speech,
                screen,
                model,
                sink,
                responder,
                cues,
                state: StateMachine::new(),
                history: RwLock::new(history),
                status: Mutex::new(StatusFlags::default()),
                poller: TaskGeneration::new(),
                root: CancellationToken::new(),
                metrics: Arc::new(MetricsRegistry::new()),
                wake_gate: Semaphore::new(1),
                revision_tx,
            }),
        }
    }

    // --- Control surface ---

    /// Start the detection engine and enter `Listening` with an active poller.
    /// While a consent flow holds the state, only the engine is started.
    pub async fn start_listening(&self) -> Result<()> {
        let inner = &self.inner;
        let started = guarded(
            "detection",
            inner.config.timeouts.detection(),
            &inner.root,
            inner.keywords.start(&inner.config.access_key),
        )
        .await;
        if let Err(e) = started {
            self.record_failure("start_listening", &e);
            return Err(e);
        }

        match inner.state.current() {
            ListeningState::Idle => {
                // a consent flow may have claimed the state since the read
                if inner.state.transition(ListeningState::Listening).is_ok() {
                    self.restart_poller();
                }
            }
            ListeningState::Listening => {
                if !inner.poller.is_active() {
                    self.restart_poller();
                }
            }
            ListeningState::AwaitingConsent => {
                debug!("consent flow active; poller resumes on finalization");
            }
        }
        self.clear_error();
        info!("listening started");
        Ok(())
    }

    /// Stop polling and the detection engine. Running pipelines are not interrupted.
    pub async fn stop_listening(&self) -> Result<()> {
        let inner = &self.inner;
        inner.poller.cancel_all();
        let stopped = guarded(
            "detection",
            inner.config.timeouts.detection(),
            &inner.root,
            inner.keywords.stop(),
        )
        .await;
        if let Err(e) = stopped {
            self.record_failure("stop_listening", &e);
            return Err(e);
        }

        if !inner.state.try_enter_idle() {
            debug!(state = %inner.state.current(), "stop kept the current state");
        }
        self.clear_error();
        info!("listening stopped");
        Ok(())
    }

    /// Cancel in-flight calls and the poller, then stop the engine.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        inner.root.cancel();
        inner.poller.cancel_all();
        if let Err(e) = inner.keywords.stop().await {
            warn!(error = %e, "failed to stop detection engine on shutdown");
        }
        info!("orchestrator shut down");
    }

    // --- Presentation surface ---

    pub fn state(&self) -> ListeningState {
        self.inner.state.current()
    }

    pub fn history(&self) -> Vec<Event> {
        self.inner.history.read().snapshot()
    }

    pub fn status(&self) -> StatusSnapshot {
        let flags = self.inner.status.lock();
        StatusSnapshot {
            state: self.inner.state.current(),
            loading: flags.loading,
            speech_listening: flags.speech_listening,
            error: flags.error.clone(),
            consent_phase: flags.consent_phase,
        }
    }

    pub fn is_polling(&self) -> bool {
        self.inner.poller.is_active()
    }

    /// Revision counter bumped on every history or status change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision_tx.subscribe()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ListeningState> {
        self.inner.state.subscribe()
    }

    pub fn metrics_summary(&self) -> HashMap<String, MetricSummary> {
        self.inner.metrics.summary()
    }

    // --- Internals shared by the flows ---

    fn downgrade(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    /// Cancel the running poller (if any) and spawn a fresh generation.
    fn restart_poller(&self) {
        let inner = &self.inner;
        let (token, generation) = inner.poller.cancel_and_advance();
        let poller = KeywordPoller::new(
            Arc::clone(&inner.keywords),
            inner.config.poll_interval(),
            inner.config.timeouts.poll(),
            Arc::clone(&inner.metrics),
        );

        let on_keyword = {
            let weak = self.downgrade();
            move |keyword: String| {
                if let Some(inner) = weak.upgrade() {
                    let this = Orchestrator { inner };
                    tokio::spawn(async move {
                        this.dispatch(&keyword).await;
                    });
                }
            }
        };
        let on_error = {
            let weak = self.downgrade();
            move |e: IveeError| {
                if let Some(inner) = weak.upgrade() {
                    Orchestrator { inner }.set_error(&e);
                }
            }
        };
        poller.spawn(token, generation, on_keyword, on_error);
    }

    fn append(&self, event: Event) {
        self.inner.history.write().append(event);
        self.notify();
    }

    fn render_context(&self, limit: usize) -> String {
        self.inner.history.read().render_context(limit)
    }

    fn update_status(&self, f: impl FnOnce(&mut StatusFlags)) {
        f(&mut self.inner.status.lock());
        self.notify();
    }

    fn set_error(&self, e: &IveeError) {
        let message = e.to_string();
        self.update_status(|s| s.error = Some(message));
    }

    fn clear_error(&self) {
        self.update_status(|s| s.error = None);
    }

    /// Log a pipeline failure and surface it through the error flag.
    fn record_failure(&self, flow: &'static str, e: &IveeError) {
        if let IveeError::Cancelled(stage) = e {
            debug!(flow, stage, "pipeline cancelled");
            return;
        }
        error!(flow, error = %e, "pipeline step failed");
        self.set_error(e);
    }

    fn notify(&self) {
        self.inner.revision_tx.send_modify(|rev| *rev += 1);
    }

    /// Guard an external call and record its latency under `metric`.
    async fn call<T, F>(
        &self,
        metric: &'static str,
        stage: &'static str,
        timeout: Duration,
        token: &CancellationToken,
        fut: F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let span = self.inner.metrics.span(metric);
        let result = guarded(stage, timeout, token, fut).await;
        span.finish();
        result
    }

    /// Play a cue to completion. A missing cue or playback failure is logged only.
    async fn play_cue(&self, cue: Cue, token: &CancellationToken) {
        let inner = &self.inner;
        let Some(clip) = inner.cues.get(cue) else {
            debug!(cue = %cue, "cue not loaded, skipping");
            return;
        };
        let played = guarded("playback", inner.config.timeouts.playback(), token, inner.sink.play(clip)).await;
        if let Err(e) = played {
            warn!(cue = %cue, error = %e, "cue playback failed");
        }
    }

    async fn infer(
        &self,
        model: &str,
        max_tokens: u32,
        messages: Vec<ChatMessage>,
        token: &CancellationToken,
    ) -> Result<String> {
        let inner = &self.inner;
        let request = CompletionRequest {
            model: model.to_string(),
            max_tokens,
            messages,
        };
        let text = self
            .call(
                metric_names::INFERENCE,
                "inference",
                inner.config.timeouts.inference(),
                token,
                inner.model.complete(request),
            )
            .await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(IveeError::Inference("model returned an empty reply".into()));
        }
        Ok(text.to_string())
    }

    async fn speak(&self, text: &str, token: &CancellationToken) -> Result<()> {
        let inner = &self.inner;
        let budget = inner.config.timeouts.synthesis() + inner.config.timeouts.playback();
        self.call(metric_names::SYNTHESIS, "synthesis", budget, token, inner.responder.speak(text))
            .await
    }
}
