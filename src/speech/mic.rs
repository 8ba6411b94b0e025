//! Microphone-backed speech engine: record one endpointed utterance, then
//! transcribe it remotely.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info};

use super::whisper::{encode_wav, TranscriptionClient};
use super::{ConsentDecision, SpeechEngine};
use crate::audio::endpoint::{Endpoint, UtteranceEndpointer};
use crate::audio::input::MicStream;
use crate::audio::SAMPLE_RATE;
use crate::error::{IveeError, Result};

const FRAME_SIZE: usize = 512;
/// ~0.8s of trailing silence at 32ms frames.
const TRAILING_SILENCE_FRAMES: u32 = 25;

pub struct MicSpeechEngine {
    client: TranscriptionClient,
    speech_window: Duration,
    consent_window: Duration,
}

impl MicSpeechEngine {
    pub fn new(client: TranscriptionClient) -> Self {
        Self {
            client,
            speech_window: Duration::from_secs(5),
            consent_window: Duration::from_secs(3),
        }
    }

    async fn record_and_transcribe(
        &self,
        access_key: &str,
        window: Duration,
        to_error: fn(String) -> IveeError,
    ) -> Result<String> {
        // a silent window never reaches the transcription service
        let samples = tokio::task::spawn_blocking(move || record_utterance(window, to_error))
            .await
            .map_err(|e| to_error(format!("recording task failed: {e}")))??;
        let wav = encode_wav(&samples, SAMPLE_RATE)?;
        self.client.transcribe(access_key, wav).await
    }
}

#[async_trait]
impl SpeechEngine for MicSpeechEngine {
    async fn listen_for_speech(&self, access_key: &str) -> Result<String> {
        info!("listening for speech");
        let transcript = self
            .record_and_transcribe(access_key, self.speech_window, IveeError::SpeechCapture)
            .await?;
        info!(transcript = %transcript, "speech recognized");
        Ok(transcript)
    }

    async fn listen_for_consent(&self, access_key: &str) -> Result<ConsentDecision> {
        info!("listening for verbal consent");
        let recorded = self
            .record_and_transcribe(access_key, self.consent_window, IveeError::Consent)
            .await;
        let decision = ConsentDecision::from_recording(recorded)?;
        info!(decision = %decision, "consent detection completed");
        Ok(decision)
    }
}

fn record_utterance(window: Duration, to_error: fn(String) -> IveeError) -> Result<Vec<i16>> {
    let mic = MicStream::open(window.as_secs_f32() + 1.0, to_error)?;
    // let the device settle before the first frame
    std::thread::sleep(Duration::from_millis(250));
    mic.discard();

    let mut endpointer = UtteranceEndpointer::new(window, TRAILING_SILENCE_FRAMES);
    let mut frame = vec![0i16; FRAME_SIZE];
    let deadline = Instant::now() + window + Duration::from_secs(1);

    while Instant::now() < deadline {
        if mic.is_failed() {
            return Err(to_error("microphone stream failed".into()));
        }
        if mic.available() < FRAME_SIZE {
            std::thread::sleep(Duration::from_millis(10));
            continue;
        }
        let read = mic.read(&mut frame);
        match endpointer.push(&frame[..read]) {
            Endpoint::Continue => {}
            outcome => {
                debug!(?outcome, "utterance endpoint");
                break;
            }
        }
    }

    endpointer.finish()
}
