//! Direct query: capture an utterance, reply in two sentences, speak it.

use tokio_util::sync::CancellationToken;
use tracing::{info, Instrument};

use super::Orchestrator;
use crate::audio::Cue;
use crate::error::{IveeError, Result};
use crate::history::{Event, Speaker};
use crate::llm::reply_messages;
use crate::metrics::{metric_names, RequestIds};

const REPLY_CONTEXT: usize = 3;

impl Orchestrator {
    pub(super) async fn run_wake_flow(&self) {
        let ids = RequestIds::new("wake");
        let span = self.inner.metrics.span(metric_names::WAKE_FLOW);
        let run = self.inner.root.child_token();

        let result = self
            .wake_steps(&run)
            .instrument(tracing::info_span!("wake_flow", trace_id = %ids.trace_id))
            .await;
        self.update_status(|s| s.speech_listening = false);

        match result {
            Ok(()) => info!(trace_id = %ids.trace_id, "wake flow completed"),
            Err(e) => self.record_failure(ids.flow, &e),
        }
        span.finish();
    }

    async fn wake_steps(&self, run: &CancellationToken) -> Result<()> {
        let inner = &self.inner;
        self.update_status(|s| s.speech_listening = true);

        {
            let this = self.clone();
            let token = run.clone();
            let delay = inner.config.ready_cue_delay();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => this.play_cue(Cue::Ready, &token).await,
                    _ = token.cancelled() => {}
                }
            });
        }

        let captured = self
            .call(
                metric_names::SPEECH_CAPTURE,
                "speech_capture",
                inner.config.timeouts.speech(),
                run,
                inner.speech.listen_for_speech(&inner.config.access_key),
            )
            .await;
        self.update_status(|s| s.speech_listening = false);

        let transcript = captured?.trim().to_string();
        if transcript.is_empty() {
            return Err(IveeError::NoSpeech);
        }
        info!(transcript = %transcript, "utterance captured");
        self.append(Event::spoken(Speaker::User, transcript));

        let context = self.render_context(REPLY_CONTEXT);
        let messages = reply_messages(&inner.config.assistant_name, &inner.config.user_name, &context);
        let models = &inner.config.models;
        let reply = self
            .infer(&models.reply_model, models.reply_max_tokens, messages, run)
            .await?;
        info!(reply = %reply, "reply generated");
        self.append(Event::spoken(Speaker::Ivee, reply.clone()));

        self.speak(&reply, run).await
    }
}
