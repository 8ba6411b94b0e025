//! Microphone capture via cpal. The callback only writes into the ring buffer;
//! readers poll it from their own thread. `cpal::Stream` is not `Send`, so a
//! `MicStream` lives on the thread that opened it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use tracing::{error, info};

use super::ring_buffer::RingBuffer;
use super::SAMPLE_RATE;
use crate::error::{IveeError, Result};

pub struct MicStream {
    _stream: cpal::Stream,
    buffer: Arc<Mutex<RingBuffer>>,
    failed: Arc<AtomicBool>,
}

impl MicStream {
    /// Open the default input device at 16 kHz mono. `to_error` picks the error
    /// category for the caller (detection vs. speech capture).
    pub fn open(buffer_secs: f32, to_error: fn(String) -> IveeError) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| to_error("no audio input device available".into()))?;

        let config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(SAMPLE_RATE),
            buffer_size: cpal::BufferSize::Default,
        };

        let buffer = Arc::new(Mutex::new(RingBuffer::new(SAMPLE_RATE, buffer_secs)));
        let failed = Arc::new(AtomicBool::new(false));
        let writer = Arc::clone(&buffer);
        let failed_flag = Arc::clone(&failed);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    writer.lock().write(data);
                },
                move |err| {
                    error!(error = %err, "audio capture error");
                    failed_flag.store(true, Ordering::Relaxed);
                },
                None,
            )
            .map_err(|e| to_error(format!("failed to build input stream: {e}")))?;

        stream
            .play()
            .map_err(|e| to_error(format!("failed to start audio stream: {e}")))?;
        info!("microphone stream started");

        Ok(Self {
            _stream: stream,
            buffer,
            failed,
        })
    }

    pub fn available(&self) -> usize {
        self.buffer.lock().available()
    }

    pub fn read(&self, out: &mut [i16]) -> usize {
        self.buffer.lock().read(out)
    }

    /// Drop audio captured so far (e.g. the tail of a cue).
    pub fn discard(&self) {
        self.buffer.lock().reset_read();
    }

    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }
}
