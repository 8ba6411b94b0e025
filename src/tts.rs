//! Text-to-speech collaborator backed by the ElevenLabs API (MP3 output).

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{IveeError, Result};

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` in the given voice; returns encoded audio bytes.
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>>;
}

pub struct ElevenLabsClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model_id: String,
}

impl ElevenLabsClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| IveeError::Synthesis(e.to_string()))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: "https://api.elevenlabs.io".into(),
            model_id: "eleven_turbo_v2".into(),
        })
    }

    fn request_body(&self, text: &str) -> serde_json::Value {
        serde_json::json!({
            "text": text,
            "model_id": self.model_id,
            "voice_settings": {
                "stability": 0.5,
                "similarity_boost": 0.5,
            }
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>> {
        if self.api_key.is_empty() {
            return Err(IveeError::Synthesis("ElevenLabs API key not configured".into()));
        }
        if voice_id.is_empty() {
            return Err(IveeError::Synthesis("voice id not configured".into()));
        }

        let response = self
            .http
            .post(format!("{}/v1/text-to-speech/{voice_id}", self.base_url))
            .header("xi-api-key", &self.api_key)
            .header("Accept", "audio/mpeg")
            .json(&self.request_body(text))
            .send()
            .await
            .map_err(|e| IveeError::Synthesis(format!("synthesis request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "speech synthesis API error");
            return Err(IveeError::Synthesis(format!(
                "speech synthesis API error {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| IveeError::Synthesis(format!("synthesis body: {e}")))?;
        debug!(bytes = audio.len(), chars = text.len(), "speech synthesized");
        Ok(audio.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_uses_turbo_model_and_balanced_voice() {
        let client = ElevenLabsClient::new("key").unwrap();
        let body = client.request_body("hello");
        assert_eq!(body["text"], "hello");
        assert_eq!(body["model_id"], "eleven_turbo_v2");
        assert_eq!(body["voice_settings"]["stability"], 0.5);
        assert_eq!(body["voice_settings"]["similarity_boost"], 0.5);
    }

    #[tokio::test]
    async fn missing_voice_is_synthesis_error() {
        let client = ElevenLabsClient::new("key").unwrap();
        let err = client.synthesize("hi", "").await.unwrap_err();
        assert!(matches!(err, IveeError::Synthesis(_)));
    }
}
