//! Consent-gated screen analysis.
//! Phases: Prompting → AwaitingDecision → (Capturing → Analyzing → Responding | Declined).
//! Finalization always returns the orchestrator to `Listening` with a fresh poller.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};

use super::Orchestrator;
use crate::audio::Cue;
use crate::error::{IveeError, Result};
use crate::history::{Event, Speaker};
use crate::llm::analysis_messages;
use crate::metrics::{metric_names, RequestIds};
use crate::state_machine::ConsentPhase;

const ANALYSIS_CONTEXT: usize = 5;

impl Orchestrator {
    /// Caller must already hold `AwaitingConsent`.
    pub(super) async fn run_consent_flow(&self) {
        let ids = RequestIds::new("query");
        let span = self.inner.metrics.span(metric_names::CONSENT_FLOW);
        let run = self.inner.root.child_token();

        let result = self
            .consent_steps(&run)
            .instrument(tracing::info_span!("consent_flow", trace_id = %ids.trace_id))
            .await;
        if let Err(e) = &result {
            self.record_failure(ids.flow, e);
        }

        self.finalize_consent().await;
        info!(trace_id = %ids.trace_id, ok = result.is_ok(), "consent flow finished");
        span.finish();
    }

    async fn consent_steps(&self, run: &CancellationToken) -> Result<()> {
        let inner = &self.inner;

        self.set_phase(ConsentPhase::Prompting);
        self.play_cue(Cue::Permission, run).await;

        self.set_phase(ConsentPhase::AwaitingDecision);
        let decision = self
            .call(
                metric_names::CONSENT,
                "consent",
                inner.config.timeouts.consent(),
                run,
                inner.speech.listen_for_consent(&inner.config.access_key),
            )
            .await?;
        info!(decision = %decision, "consent decision");

        let user = &inner.config.user_name;
        if !decision.is_allowed() {
            self.append(Event::notice(format!("{user} did not give permission.")));
            self.set_phase(ConsentPhase::Declined);
            return Ok(());
        }
        self.append(Event::notice(format!("{user} gave permission.")));

        self.set_phase(ConsentPhase::Capturing);
        self.play_cue(Cue::Capture, run).await;
        self.update_status(|s| s.loading = true);
        let reading = self
            .call(
                metric_names::SCREEN_CAPTURE,
                "screen_capture",
                inner.config.timeouts.capture(),
                run,
                inner.screen.capture_and_extract(),
            )
            .await?;
        info!(text_chars = reading.text.len(), "screen captured");
        let screen_text = reading.text.clone();
        self.append(Event::screenshot(reading.image, reading.text));

        self.set_phase(ConsentPhase::Analyzing);
        tokio::select! {
            _ = tokio::time::sleep(inner.config.analysis_settle()) => {}
            _ = run.cancelled() => return Err(IveeError::Cancelled("analysis")),
        }
        let context = self.render_context(ANALYSIS_CONTEXT);
        let models = &inner.config.models;
        let interpretation = self
            .infer(
                &models.analysis_model,
                models.analysis_max_tokens,
                analysis_messages(&context, &screen_text),
                run,
            )
            .await?;
        info!(reply = %interpretation, "screen interpreted");
        self.append(Event::spoken(Speaker::Ivee, interpretation.clone()));
        self.update_status(|s| s.loading = false);

        self.set_phase(ConsentPhase::Responding);
        self.speak(&interpretation, run).await
    }

    /// Restart detection (best effort), re-enter `Listening`, restart the poller.
    async fn finalize_consent(&self) {
        let inner = &self.inner;
        self.update_status(|s| {
            s.loading = false;
            s.consent_phase = None;
        });

        if inner.root.is_cancelled() {
            return;
        }
        let restarted = crate::cancellation::guarded(
            "detection",
            inner.config.timeouts.detection(),
            &inner.root,
            inner.keywords.start(&inner.config.access_key),
        )
        .await;
        if let Err(e) = restarted {
            warn!(error = %e, "failed to restart detection after consent flow");
        }

        inner.state.force_listening();
        self.restart_poller();
        self.notify();
    }

    fn set_phase(&self, phase: ConsentPhase) {
        info!(phase = %phase, "consent_phase");
        self.update_status(|s| s.consent_phase = Some(phase));
    }
}
