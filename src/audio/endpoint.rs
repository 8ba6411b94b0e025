//! Utterance endpointing: accumulate frames until the speaker stops talking or
//! the recording window runs out.

use std::time::Duration;

use super::vad::{EnergyVad, DEFAULT_SILENCE_RMS};
use super::SAMPLE_RATE;
use crate::error::{IveeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Keep feeding frames.
    Continue,
    /// Voice was heard and has since gone quiet.
    SpeechEnded,
    /// Recording window exhausted.
    WindowElapsed,
}

pub struct UtteranceEndpointer {
    vad: EnergyVad,
    samples: Vec<i16>,
    max_samples: usize,
    heard_voice: bool,
}

impl UtteranceEndpointer {
    /// `window`: longest recording; `trailing_silence_frames`: silent frames
    /// after speech that end the utterance.
    pub fn new(window: Duration, trailing_silence_frames: u32) -> Self {
        let max_samples = (window.as_secs_f64() * f64::from(SAMPLE_RATE)) as usize;
        Self {
            vad: EnergyVad::new(DEFAULT_SILENCE_RMS, trailing_silence_frames),
            samples: Vec::with_capacity(max_samples),
            max_samples: max_samples.max(1),
            heard_voice: false,
        }
    }

    pub fn push(&mut self, frame: &[i16]) -> Endpoint {
        let room = self.max_samples.saturating_sub(self.samples.len());
        let frame = &frame[..frame.len().min(room)];
        self.samples.extend_from_slice(frame);

        let voice_active = self.vad.process(frame).voice_active;
        if voice_active {
            self.heard_voice = true;
        } else if self.heard_voice {
            return Endpoint::SpeechEnded;
        }

        if self.samples.len() >= self.max_samples {
            Endpoint::WindowElapsed
        } else {
            Endpoint::Continue
        }
    }

    pub fn heard_voice(&self) -> bool {
        self.heard_voice
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }

    /// The recorded utterance, or `NoSpeech` when no frame ever carried voice.
    pub fn finish(self) -> Result<Vec<i16>> {
        if !self.heard_voice {
            return Err(IveeError::NoSpeech);
        }
        Ok(self.samples)
    }
}
