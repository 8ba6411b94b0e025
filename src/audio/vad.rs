//! Energy-based voice activity detection.
//! RMS gate with a hangover: voice stays active until enough consecutive
//! silent frames have been seen. While silent, the keyword spotter only runs on
//! every fourth frame.

/// RMS energy of a frame of i16 samples.
#[inline]
pub fn compute_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}

/// Raw i16 RMS below which a frame counts as silence (about -40 dBFS).
pub const DEFAULT_SILENCE_RMS: f32 = 300.0;

pub struct EnergyVad {
    silence_threshold: f32,
    hangover_frames: u32,
    silent_count: u32,
    voice_active: bool,
    frame_counter: u64,
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new(DEFAULT_SILENCE_RMS, 8)
    }
}

impl EnergyVad {
    pub fn new(silence_threshold: f32, hangover_frames: u32) -> Self {
        Self {
            silence_threshold,
            hangover_frames: hangover_frames.max(1),
            silent_count: 0,
            voice_active: false,
            frame_counter: 0,
        }
    }

    #[inline]
    pub fn process(&mut self, samples: &[i16]) -> VadResult {
        let rms = compute_rms(samples);
        self.frame_counter += 1;

        if rms >= self.silence_threshold {
            self.silent_count = 0;
            self.voice_active = true;
            return VadResult {
                voice_active: true,
                rms,
                should_spot: true,
            };
        }

        self.silent_count += 1;
        if self.silent_count >= self.hangover_frames {
            self.voice_active = false;
        }
        VadResult {
            voice_active: self.voice_active,
            rms,
            should_spot: self.voice_active || self.frame_counter % 4 == 0,
        }
    }

    pub fn is_voice_active(&self) -> bool {
        self.voice_active
    }
}

/// VAD decision for one frame.
#[derive(Debug, Clone)]
pub struct VadResult {
    pub voice_active: bool,
    pub rms: f32,
    /// Whether the keyword spotter should see this frame.
    pub should_spot: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_constant_signal() {
        assert_eq!(compute_rms(&[]), 0.0);
        assert!((compute_rms(&[1000; 64]) - 1000.0).abs() < 0.01);
    }

    #[test]
    fn hangover_keeps_voice_active() {
        let mut vad = EnergyVad::new(300.0, 3);
        assert!(vad.process(&[2000; 32]).voice_active);
        assert!(vad.process(&[0; 32]).voice_active);
        assert!(vad.process(&[0; 32]).voice_active);
        assert!(!vad.process(&[0; 32]).voice_active);
    }

    #[test]
    fn silence_thins_spotting() {
        let mut vad = EnergyVad::new(300.0, 1);
        let spotted = (0..8).filter(|_| vad.process(&[0; 16]).should_spot).count();
        assert_eq!(spotted, 2);
    }
}
