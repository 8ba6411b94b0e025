//! Speak a generated reply: synthesize, then play to completion.

use std::sync::Arc;

use tracing::{error, info};

use crate::audio::{AudioClip, AudioSink};
use crate::error::{IveeError, Result};
use crate::tts::SpeechSynthesizer;

pub struct ResponseSynthesizer {
    tts: Arc<dyn SpeechSynthesizer>,
    sink: Arc<dyn AudioSink>,
    voice_id: String,
}

impl ResponseSynthesizer {
    pub fn new(tts: Arc<dyn SpeechSynthesizer>, sink: Arc<dyn AudioSink>, voice_id: impl Into<String>) -> Self {
        Self {
            tts,
            sink,
            voice_id: voice_id.into(),
        }
    }

    /// Returns once playback has finished. Failures are logged and returned.
    pub async fn speak(&self, text: &str) -> Result<()> {
        let result = self.speak_inner(text).await;
        if let Err(e) = &result {
            error!(error = %e, "response synthesis failed");
        }
        result
    }

    async fn speak_inner(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(IveeError::Synthesis("nothing to speak".into()));
        }
        let audio = self.tts.synthesize(text, &self.voice_id).await?;
        if audio.is_empty() {
            return Err(IveeError::Synthesis("synthesizer returned no audio".into()));
        }
        let clip = AudioClip::new("response", audio);
        self.sink.play(&clip).await?;
        info!(chars = text.len(), "response spoken");
        Ok(())
    }
}
