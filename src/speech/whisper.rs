//! Whisper-compatible transcription over HTTP (multipart WAV upload).
//! The engine access credential is sent as the bearer token.

use std::io::Cursor;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{IveeError, Result};

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

pub struct TranscriptionClient {
    http: reqwest::Client,
    url: String,
    model: String,
}

impl TranscriptionClient {
    pub fn new(url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| IveeError::SpeechCapture(e.to_string()))?;
        Ok(Self {
            http,
            url: url.into(),
            model: model.into(),
        })
    }

    /// Upload WAV bytes and return the raw transcript.
    pub async fn transcribe(&self, access_key: &str, wav: Vec<u8>) -> Result<String> {
        if access_key.is_empty() {
            return Err(IveeError::SpeechCapture("access key not configured".into()));
        }
        debug!(audio_bytes = wav.len(), "uploading audio for transcription");

        let part = reqwest::multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| IveeError::SpeechCapture(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone());

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(access_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| IveeError::SpeechCapture(format!("transcription request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "transcription API error");
            return Err(IveeError::SpeechCapture(format!(
                "transcription API error {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| IveeError::SpeechCapture(format!("transcription response: {e}")))?;
        Ok(parsed.text)
    }
}

/// 16-bit mono PCM → WAV container.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| IveeError::SpeechCapture(format!("wav header: {e}")))?;
        for &s in samples {
            writer
                .write_sample(s)
                .map_err(|e| IveeError::SpeechCapture(format!("wav write: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| IveeError::SpeechCapture(format!("wav finalize: {e}")))?;
    }
    Ok(cursor.into_inner())
}
