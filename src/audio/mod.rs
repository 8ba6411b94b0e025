//! Audio plumbing.
//! Playback side: cue clips and synthesized speech go to an `AudioSink`.
//! Capture side: microphone → ring buffer → VAD → keyword spotter / utterance
//! endpointer (native I/O only with the `desktop` feature).

pub mod endpoint;
pub mod mix;
pub mod ring_buffer;
pub mod vad;
pub mod wake;

#[cfg(feature = "desktop")]
pub mod input;
#[cfg(feature = "desktop")]
pub mod output;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::CueConfig;
use crate::error::Result;

/// Capture sample rate shared by detection and transcription (16 kHz mono).
pub const SAMPLE_RATE: u32 = 16_000;

/// Encoded audio (MP3) ready for playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    label: String,
    bytes: Arc<[u8]>,
}

impl AudioClip {
    pub fn new(label: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            label: label.into(),
            bytes: bytes.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Local playback facility. `play` resolves once the clip has finished.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn play(&self, clip: &AudioClip) -> Result<()>;
}

/// Short decorative sounds played around the flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cue {
    /// Played while a spoken query is being captured.
    Ready,
    /// Asks the user for permission to look at the screen.
    Permission,
    /// Announces that a screenshot is about to be taken.
    Capture,
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cue::Ready => write!(f, "ready"),
            Cue::Permission => write!(f, "permission"),
            Cue::Capture => write!(f, "capture"),
        }
    }
}

/// Preloaded cue clips. A cue whose file is missing is skipped at play time.
#[derive(Debug, Clone, Default)]
pub struct CueBank {
    clips: HashMap<Cue, AudioClip>,
}

impl CueBank {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load every configured cue file; unreadable files are logged and skipped.
    pub fn load(config: &CueConfig) -> Self {
        let mut bank = Self::empty();
        for (cue, path) in [
            (Cue::Ready, &config.ready),
            (Cue::Permission, &config.permission),
            (Cue::Capture, &config.capture),
        ] {
            match read_clip(cue, path) {
                Some(clip) => bank.insert(cue, clip),
                None => warn!(cue = %cue, path = %path.display(), "cue unavailable, will be skipped"),
            }
        }
        bank
    }

    pub fn insert(&mut self, cue: Cue, clip: AudioClip) {
        self.clips.insert(cue, clip);
    }

    pub fn get(&self, cue: Cue) -> Option<&AudioClip> {
        self.clips.get(&cue)
    }
}

fn read_clip(cue: Cue, path: &Path) -> Option<AudioClip> {
    let bytes = std::fs::read(path).ok().filter(|b| !b.is_empty())?;
    debug!(cue = %cue, size = bytes.len(), "cue loaded");
    Some(AudioClip::new(cue.to_string(), bytes))
}
