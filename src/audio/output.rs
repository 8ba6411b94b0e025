//! Speaker playback via cpal. MP3 clips are decoded with minimp3 and played on a
//! blocking thread until the last sample has been consumed. The stream uses a
//! config the device supports; mono samples are copied to every channel.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, error};

use super::mix::{fill_frames, resample_linear};
use super::{AudioClip, AudioSink};
use crate::error::{IveeError, Result};

/// Decoded mono PCM.
struct Pcm {
    samples: Vec<f32>,
    sample_rate: u32,
}

/// Plays clips on the default output device.
#[derive(Debug, Default)]
pub struct SpeakerSink;

impl SpeakerSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AudioSink for SpeakerSink {
    async fn play(&self, clip: &AudioClip) -> Result<()> {
        let bytes = clip.bytes().to_vec();
        let label = clip.label().to_string();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let pcm = decode_mp3(&bytes)?;
            play_blocking(&pcm)?;
            debug!(clip = %label, samples = pcm.samples.len(), "playback complete");
            Ok(())
        })
        .await
        .map_err(|e| IveeError::Synthesis(format!("playback task failed: {e}")))?
    }
}

fn decode_mp3(data: &[u8]) -> Result<Pcm> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(data));
    let mut samples = Vec::new();
    let mut sample_rate = 0u32;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate = frame.sample_rate as u32;
                let channels = frame.channels.max(1);
                samples.extend(frame.data.chunks(channels).map(|chunk| {
                    let sum: f32 = chunk.iter().map(|&s| f32::from(s) / 32768.0).sum();
                    sum / chunk.len() as f32
                }));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(IveeError::Synthesis(format!("MP3 decode error: {e}"))),
        }
    }

    if samples.is_empty() || sample_rate == 0 {
        return Err(IveeError::Synthesis("audio clip decoded to nothing".into()));
    }
    Ok(Pcm {
        samples,
        sample_rate,
    })
}

/// Mono then stereo at the clip's own rate; otherwise the device default,
/// which the caller resamples to.
fn output_config(device: &cpal::Device, sample_rate: u32) -> Result<cpal::StreamConfig> {
    let rate = cpal::SampleRate(sample_rate);
    let at_clip_rate = |channels: u16| {
        device
            .supported_output_configs()
            .ok()?
            .find(|c| c.channels() == channels && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
            .map(|c| c.with_sample_rate(rate).config())
    };
    if let Some(config) = at_clip_rate(1).or_else(|| at_clip_rate(2)) {
        return Ok(config);
    }
    device
        .default_output_config()
        .map(|c| c.config())
        .map_err(|e| IveeError::Synthesis(format!("no usable output config: {e}")))
}

fn play_blocking(pcm: &Pcm) -> Result<()> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| IveeError::Synthesis("no output device available".into()))?;

    let config = output_config(&device, pcm.sample_rate)?;
    let channels = usize::from(config.channels.max(1));
    let device_rate = config.sample_rate.0;
    let samples: Arc<[f32]> = resample_linear(&pcm.samples, pcm.sample_rate, device_rate).into();
    debug!(
        channels,
        device_rate,
        clip_rate = pcm.sample_rate,
        "output stream configured"
    );

    let finished = Arc::new(AtomicBool::new(false));
    let src = Arc::clone(&samples);
    let done = Arc::clone(&finished);
    let mut position = 0usize;
    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if fill_frames(data, channels, &src, &mut position) {
                    done.store(true, Ordering::Relaxed);
                }
            },
            |err| error!(error = %err, "audio playback error"),
            None,
        )
        .map_err(|e| IveeError::Synthesis(format!("failed to build output stream: {e}")))?;

    stream
        .play()
        .map_err(|e| IveeError::Synthesis(format!("failed to start playback: {e}")))?;

    let expected_ms = samples.len() as u64 * 1000 / u64::from(device_rate.max(1));
    let deadline = Instant::now() + Duration::from_millis(expected_ms + 500);
    while !finished.load(Ordering::Relaxed) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    drop(stream);
    Ok(())
}
