//! Screen capture + text extraction collaborator.
//! One combined call: grab the primary screen, then OCR it.

pub mod screen;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::error::{IveeError, Result};
use crate::history::Screenshot;
use crate::ocr::TextExtractor;
use screen::ScreenGrabber;

/// A captured screen together with the text read from it.
#[derive(Debug, Clone)]
pub struct ScreenReading {
    pub image: Screenshot,
    pub text: String,
}

#[async_trait]
pub trait ScreenEngine: Send + Sync {
    async fn capture_and_extract(&self) -> Result<ScreenReading>;
}

/// Screen grab via grim/maim/scrot followed by tesseract OCR, on the blocking pool.
pub struct DesktopScreenEngine {
    grabber: Arc<ScreenGrabber>,
    extractor: Arc<TextExtractor>,
}

impl DesktopScreenEngine {
    pub fn new(grabber: ScreenGrabber, extractor: TextExtractor) -> Self {
        Self {
            grabber: Arc::new(grabber),
            extractor: Arc::new(extractor),
        }
    }

    /// Probe for the system tools.
    pub fn detect() -> Self {
        Self::new(ScreenGrabber::detect(), TextExtractor::detect())
    }
}

#[async_trait]
impl ScreenEngine for DesktopScreenEngine {
    async fn capture_and_extract(&self) -> Result<ScreenReading> {
        let grabber = Arc::clone(&self.grabber);
        let extractor = Arc::clone(&self.extractor);
        tokio::task::spawn_blocking(move || -> Result<ScreenReading> {
            let start = std::time::Instant::now();
            let png = grabber.capture()?;
            let text = extractor.extract(&png)?;
            info!(
                image_bytes = png.len(),
                text_chars = text.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "screenshot and text extraction completed"
            );
            Ok(ScreenReading {
                image: Screenshot::from_png(png),
                text,
            })
        })
        .await
        .map_err(|e| IveeError::Capture(format!("capture task failed: {e}")))?
    }
}
