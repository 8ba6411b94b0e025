//! Runtime configuration: defaults, optional JSON file (`IVEE_CONFIG`), then
//! environment overrides for credentials.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::error::{IveeError, Result};
use crate::history::HISTORY_CAPACITY;

/// What to do with a wake keyword while another wake flow is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WakePolicy {
    /// Drop the new keyword.
    Serialize,
    /// Start a second, concurrent wake flow.
    Overlap,
}

/// Model identifiers and token budgets for the two inference call sites.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub reply_model: String,
    pub reply_max_tokens: u32,
    pub analysis_model: String,
    pub analysis_max_tokens: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            reply_model: "claude-3-5-sonnet-latest".into(),
            reply_max_tokens: 150,
            analysis_model: "claude-3-sonnet-20240229".into(),
            analysis_max_tokens: 2024,
        }
    }
}

/// Upper bounds for every suspended external call, in milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StageTimeouts {
    pub detection_ms: u64,
    pub poll_ms: u64,
    pub speech_ms: u64,
    pub consent_ms: u64,
    pub capture_ms: u64,
    pub inference_ms: u64,
    pub synthesis_ms: u64,
    pub playback_ms: u64,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            detection_ms: 5_000,
            poll_ms: 2_000,
            speech_ms: 15_000,
            consent_ms: 10_000,
            capture_ms: 20_000,
            inference_ms: 60_000,
            synthesis_ms: 30_000,
            playback_ms: 120_000,
        }
    }
}

impl StageTimeouts {
    pub fn detection(&self) -> Duration {
        Duration::from_millis(self.detection_ms)
    }
    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }
    pub fn speech(&self) -> Duration {
        Duration::from_millis(self.speech_ms)
    }
    pub fn consent(&self) -> Duration {
        Duration::from_millis(self.consent_ms)
    }
    pub fn capture(&self) -> Duration {
        Duration::from_millis(self.capture_ms)
    }
    pub fn inference(&self) -> Duration {
        Duration::from_millis(self.inference_ms)
    }
    pub fn synthesis(&self) -> Duration {
        Duration::from_millis(self.synthesis_ms)
    }
    pub fn playback(&self) -> Duration {
        Duration::from_millis(self.playback_ms)
    }
}

/// Audio cue files (MP3).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CueConfig {
    pub ready: PathBuf,
    pub permission: PathBuf,
    pub capture: PathBuf,
}

impl Default for CueConfig {
    fn default() -> Self {
        Self {
            ready: PathBuf::from("resources/ivee_gentle.mp3"),
            permission: PathBuf::from("resources/permission.mp3"),
            capture: PathBuf::from("resources/ivee_capture.mp3"),
        }
    }
}

/// Full application configuration.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Credential passed to the detection and speech engines.
    pub access_key: String,
    pub anthropic_api_key: String,
    pub elevenlabs_api_key: String,
    pub voice_id: String,
    pub user_name: String,
    pub assistant_name: String,
    pub poll_interval_ms: u64,
    pub ready_cue_delay_ms: u64,
    /// Pause between text extraction and the interpretation request.
    pub analysis_settle_ms: u64,
    pub history_capacity: usize,
    pub wake_policy: WakePolicy,
    pub transcription_url: String,
    pub transcription_model: String,
    pub models: ModelConfig,
    pub timeouts: StageTimeouts,
    pub cues: CueConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            access_key: String::new(),
            anthropic_api_key: String::new(),
            elevenlabs_api_key: String::new(),
            voice_id: String::new(),
            user_name: "Bhada".into(),
            assistant_name: "Ivee".into(),
            poll_interval_ms: 1_000,
            ready_cue_delay_ms: 100,
            analysis_settle_ms: 1_000,
            history_capacity: HISTORY_CAPACITY,
            wake_policy: WakePolicy::Serialize,
            transcription_url: "https://api.openai.com/v1/audio/transcriptions".into(),
            transcription_model: "whisper-1".into(),
            models: ModelConfig::default(),
            timeouts: StageTimeouts::default(),
            cues: CueConfig::default(),
        }
    }
}

impl AppConfig {
    /// Defaults, then the file named by `IVEE_CONFIG` (if set), then env vars.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var("IVEE_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| IveeError::Config(format!("read {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| IveeError::Config(format!("parse {}: {e}", path.display())))?;
        info!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Override fields from environment-style lookups. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = get("ACCESS_KEY") {
            self.access_key = v;
        }
        if let Some(v) = get("ANTHROPIC_API_KEY") {
            self.anthropic_api_key = v;
        }
        if let Some(v) = get("ELEVENLABS_API_KEY") {
            self.elevenlabs_api_key = v;
        }
        if let Some(v) = get("VOICE_ID") {
            self.voice_id = v;
        }
        if let Some(ms) = get("IVEE_POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.poll_interval_ms = ms;
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn ready_cue_delay(&self) -> Duration {
        Duration::from_millis(self.ready_cue_delay_ms)
    }

    pub fn analysis_settle(&self) -> Duration {
        Duration::from_millis(self.analysis_settle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn defaults_match_call_sites() {
        let config = AppConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(1000));
        assert_eq!(config.history_capacity, 6);
        assert_eq!(config.models.reply_max_tokens, 150);
        assert_eq!(config.models.analysis_max_tokens, 2024);
        assert_eq!(config.wake_policy, WakePolicy::Serialize);
    }

    #[test]
    fn file_overrides_and_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"user_name": "Sam", "wake_policy": "overlap", "timeouts": {{"speech_ms": 900}}}}"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.user_name, "Sam");
        assert_eq!(config.wake_policy, WakePolicy::Overlap);
        assert_eq!(config.timeouts.speech(), Duration::from_millis(900));
        assert_eq!(config.timeouts.consent_ms, StageTimeouts::default().consent_ms);
        assert_eq!(config.assistant_name, "Ivee");
    }

    #[test]
    fn bad_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            AppConfig::from_file(file.path()),
            Err(IveeError::Config(_))
        ));
    }

    #[test]
    fn env_overrides_credentials() {
        let env: HashMap<&str, &str> = [
            ("ANTHROPIC_API_KEY", "sk-ant"),
            ("VOICE_ID", "voice-7"),
            ("ACCESS_KEY", "   "),
            ("IVEE_POLL_INTERVAL_MS", "250"),
        ]
        .into_iter()
        .collect();
        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.anthropic_api_key, "sk-ant");
        assert_eq!(config.voice_id, "voice-7");
        assert_eq!(config.access_key, "");
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
    }
}
