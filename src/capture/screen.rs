//! Full-screen capture through whichever tool is installed
//! (grim on Wayland, maim or scrot on X11). Returns PNG bytes.

use std::path::PathBuf;
use std::process::Command;

use tracing::{debug, info, warn};

use crate::error::{IveeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureBackend {
    Grim,
    Maim,
    Scrot,
}

impl CaptureBackend {
    fn program(self) -> &'static str {
        match self {
            CaptureBackend::Grim => "grim",
            CaptureBackend::Maim => "maim",
            CaptureBackend::Scrot => "scrot",
        }
    }

    fn command(self, output: &str) -> Command {
        let mut cmd = Command::new(self.program());
        match self {
            CaptureBackend::Scrot => {
                cmd.args(["-z", "-o", output]);
            }
            CaptureBackend::Grim | CaptureBackend::Maim => {
                cmd.arg(output);
            }
        }
        cmd
    }
}

/// Screen capture with cached backend detection.
pub struct ScreenGrabber {
    backend: Option<CaptureBackend>,
}

impl ScreenGrabber {
    pub fn with_backend(backend: Option<CaptureBackend>) -> Self {
        Self { backend }
    }

    /// Prefer grim (Wayland), then maim, then scrot.
    pub fn detect() -> Self {
        let backend = [CaptureBackend::Grim, CaptureBackend::Maim, CaptureBackend::Scrot]
            .into_iter()
            .find(|b| probe_command(b.program()));
        match backend {
            Some(b) => info!(backend = b.program(), "screen capture backend detected"),
            None => warn!("no screen capture backend found"),
        }
        Self::with_backend(backend)
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    /// Capture the full screen as PNG bytes.
    pub fn capture(&self) -> Result<Vec<u8>> {
        let backend = self.backend.ok_or_else(|| IveeError::Capture("No screens found.".into()))?;
        let path = scratch_path("png");
        let path_str = path.to_string_lossy().into_owned();

        let output = backend
            .command(&path_str)
            .output()
            .map_err(|e| IveeError::Capture(format!("failed to run {}: {e}", backend.program())))?;
        if !output.status.success() {
            return Err(IveeError::Capture(format!(
                "{} failed: {}",
                backend.program(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let bytes = std::fs::read(&path)
            .map_err(|e| IveeError::Capture(format!("failed to read screenshot: {e}")));
        if let Err(e) = std::fs::remove_file(&path) {
            debug!(error = %e, "failed to remove temporary screenshot");
        }
        let bytes = bytes?;
        if bytes.is_empty() {
            return Err(IveeError::Capture("empty screenshot".into()));
        }
        debug!(size = bytes.len(), "screen captured");
        Ok(bytes)
    }
}

/// Unique temp file path per capture.
pub(crate) fn scratch_path(ext: &str) -> PathBuf {
    std::env::temp_dir().join(format!("ivee_{}.{ext}", uuid::Uuid::new_v4()))
}

pub(crate) fn probe_command(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
