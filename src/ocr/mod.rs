//! Text extraction from screenshots via the tesseract CLI.

use std::process::Command;

use tracing::{debug, info, warn};

use crate::capture::screen::{probe_command, scratch_path};
use crate::error::{IveeError, Result};

pub struct TextExtractor {
    program: Option<String>,
    language: String,
}

impl TextExtractor {
    pub fn new(program: Option<String>, language: impl Into<String>) -> Self {
        Self {
            program,
            language: language.into(),
        }
    }

    /// Look for `tesseract` on PATH; English model.
    pub fn detect() -> Self {
        let program = probe_command("tesseract").then(|| "tesseract".to_string());
        match &program {
            Some(_) => info!("tesseract available for text extraction"),
            None => warn!("tesseract not found; screen analysis will fail"),
        }
        Self::new(program, "eng")
    }

    /// OCR a PNG image and return normalized text.
    pub fn extract(&self, png: &[u8]) -> Result<String> {
        let program = self
            .program
            .as_deref()
            .ok_or_else(|| IveeError::Capture("tesseract not available".into()))?;

        let path = scratch_path("png");
        std::fs::write(&path, png)
            .map_err(|e| IveeError::Capture(format!("write OCR input: {e}")))?;

        let output = Command::new(program)
            .arg(&path)
            .arg("stdout")
            .args(["-l", &self.language])
            .output();
        if let Err(e) = std::fs::remove_file(&path) {
            debug!(error = %e, "failed to remove OCR input");
        }
        let output = output.map_err(|e| IveeError::Capture(format!("failed to run {program}: {e}")))?;

        if !output.status.success() {
            return Err(IveeError::Capture(format!(
                "text extraction failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(normalize_ocr_text(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Trim lines, drop blank ones, collapse inner whitespace.
pub fn normalize_ocr_text(raw: &str) -> String {
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_tesseract_output() {
        let raw = "  fn   main() {\n\n\n    println!(\"hi\");  \n}\n\x0c";
        assert_eq!(normalize_ocr_text(raw), "fn main() {\nprintln!(\"hi\");\n}");
    }

    #[test]
    fn missing_tool_is_capture_error() {
        let extractor = TextExtractor::new(None, "eng");
        assert!(matches!(extractor.extract(b"png"), Err(IveeError::Capture(_))));
    }
}
