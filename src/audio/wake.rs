//! Keyword spotting on the microphone stream.
//! Pipeline: audio frames → RMS gate → VAD → spotter → keyword slot.
//! The burst-pattern spotter is a stand-in for a trained keyword model: the
//! number of energy bursts in one pattern selects the phrase index.

use super::vad::compute_rms;

/// Keyword model adapter. Feeds frames, reports completed phrase indices.
pub trait KeywordSpotter: Send {
    /// Process one frame; returns the index of a recognized phrase.
    fn process(&mut self, samples: &[i16]) -> Option<usize>;

    /// Number of phrases this spotter can report.
    fn keyword_count(&self) -> usize;

    /// Clear internal state (e.g. between sessions).
    fn reset(&mut self);
}

/// Counts energy spikes separated by short gaps; one spike is phrase 0, two
/// spikes are phrase 1, and so on.
pub struct BurstPatternSpotter {
    keyword_count: usize,
    /// Smoothed background energy; spikes are measured against it.
    smoothed_energy: f32,
    /// Background energy must exceed this before spikes count.
    energy_floor: f32,
    spike_ratio: f32,
    /// Silent frames that close a pattern.
    pattern_gap_frames: u32,
    bursts: usize,
    in_burst: bool,
    frames_since_burst: u32,
}

impl BurstPatternSpotter {
    pub fn new(keyword_count: usize, pattern_gap_frames: u32) -> Self {
        Self {
            keyword_count,
            smoothed_energy: 0.0,
            energy_floor: 100.0,
            spike_ratio: 3.0,
            pattern_gap_frames: pattern_gap_frames.max(1),
            bursts: 0,
            in_burst: false,
            frames_since_burst: 0,
        }
    }

    fn close_pattern(&mut self) -> Option<usize> {
        let index = self.bursts.checked_sub(1);
        self.bursts = 0;
        self.in_burst = false;
        self.frames_since_burst = 0;
        index.filter(|&i| i < self.keyword_count)
    }
}

impl KeywordSpotter for BurstPatternSpotter {
    fn process(&mut self, samples: &[i16]) -> Option<usize> {
        if samples.is_empty() {
            return None;
        }
        let rms = compute_rms(samples);
        let spike = self.smoothed_energy > self.energy_floor
            && rms > self.smoothed_energy * self.spike_ratio;

        let mut detected = None;
        if spike {
            if !self.in_burst {
                self.bursts += 1;
                self.in_burst = true;
            }
            self.frames_since_burst = 0;
        } else {
            self.in_burst = false;
            if self.bursts > 0 {
                self.frames_since_burst += 1;
                if self.frames_since_burst >= self.pattern_gap_frames {
                    detected = self.close_pattern();
                }
            }
        }

        self.smoothed_energy = self.smoothed_energy * 0.9 + rms * 0.1;
        detected
    }

    fn keyword_count(&self) -> usize {
        self.keyword_count
    }

    fn reset(&mut self) {
        self.smoothed_energy = 0.0;
        self.close_pattern();
    }
}

#[cfg(feature = "desktop")]
pub use mic::MicKeywordEngine;

#[cfg(feature = "desktop")]
mod mic {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::sync::oneshot;
    use tracing::{debug, info, warn};

    use super::{BurstPatternSpotter, KeywordSpotter};
    use crate::audio::input::MicStream;
    use crate::audio::vad::EnergyVad;
    use crate::error::{IveeError, Result};
    use crate::keyword::{keyword_label, KeywordEngine, KeywordSlot};

    const FRAME_SIZE: usize = 512; // ~32ms at 16kHz

    /// Background microphone listener that stores detections in a keyword slot.
    pub struct MicKeywordEngine {
        slot: Arc<KeywordSlot>,
        running: Arc<AtomicBool>,
        worker: Mutex<Option<std::thread::JoinHandle<()>>>,
    }

    impl Default for MicKeywordEngine {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MicKeywordEngine {
        pub fn new() -> Self {
            Self {
                slot: Arc::new(KeywordSlot::new()),
                running: Arc::new(AtomicBool::new(false)),
                worker: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl KeywordEngine for MicKeywordEngine {
        async fn start(&self, _access_key: &str) -> Result<()> {
            if self.running.swap(true, Ordering::SeqCst) {
                return Ok(());
            }

            let (ready_tx, ready_rx) = oneshot::channel();
            let slot = Arc::clone(&self.slot);
            let running = Arc::clone(&self.running);
            let handle = std::thread::Builder::new()
                .name("keyword-detection".into())
                .spawn(move || run_detection_loop(slot, running, ready_tx))
                .map_err(|e| IveeError::Detection(format!("spawn detection thread: {e}")))?;
            *self.worker.lock() = Some(handle);

            match ready_rx.await {
                Ok(Ok(())) => {
                    info!("keyword detection started");
                    Ok(())
                }
                Ok(Err(e)) => {
                    self.running.store(false, Ordering::SeqCst);
                    Err(e)
                }
                Err(_) => {
                    self.running.store(false, Ordering::SeqCst);
                    Err(IveeError::Detection("detection thread exited early".into()))
                }
            }
        }

        async fn stop(&self) -> Result<()> {
            self.running.store(false, Ordering::SeqCst);
            if let Some(handle) = self.worker.lock().take() {
                tokio::task::spawn_blocking(move || {
                    let _ = handle.join();
                })
                .await
                .map_err(|e| IveeError::Detection(format!("join detection thread: {e}")))?;
            }
            self.slot.clear();
            info!("keyword detection stopped");
            Ok(())
        }

        async fn last_keyword(&self) -> Result<Option<String>> {
            Ok(self.slot.take())
        }
    }

    fn run_detection_loop(
        slot: Arc<KeywordSlot>,
        running: Arc<AtomicBool>,
        ready: oneshot::Sender<Result<()>>,
    ) {
        let mic = match MicStream::open(3.0, IveeError::Detection) {
            Ok(mic) => {
                let _ = ready.send(Ok(()));
                mic
            }
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };

        let mut vad = EnergyVad::default();
        let mut spotter = BurstPatternSpotter::new(2, 20);
        let mut frame = vec![0i16; FRAME_SIZE];
        let idle_sleep = Duration::from_millis(20);

        while running.load(Ordering::Relaxed) {
            if mic.available() < FRAME_SIZE {
                std::thread::sleep(idle_sleep);
                continue;
            }
            let read = mic.read(&mut frame);
            let samples = &frame[..read];
            if !vad.process(samples).should_spot {
                continue;
            }
            if let Some(index) = spotter.process(samples) {
                debug!(index, "keyword spotted");
                slot.store(keyword_label(index));
            }
        }

        if mic.is_failed() {
            warn!("microphone stream reported an error during detection");
        }
        spotter.reset();
    }
}
