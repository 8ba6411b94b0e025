//! Error taxonomy shared by the orchestrator and its collaborators.
//! Every variant carries a display string suitable for the user-facing error flag.

/// Errors raised by collaborators and pipeline steps.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IveeError {
    #[error("keyword detection failed: {0}")]
    Detection(String),
    #[error("speech capture failed: {0}")]
    SpeechCapture(String),
    #[error("no speech detected")]
    NoSpeech,
    #[error("consent capture failed: {0}")]
    Consent(String),
    #[error("screen capture failed: {0}")]
    Capture(String),
    #[error("model inference failed: {0}")]
    Inference(String),
    #[error("speech synthesis failed: {0}")]
    Synthesis(String),
    #[error("{stage} timed out after {timeout_ms}ms")]
    Timeout { stage: &'static str, timeout_ms: u64 },
    #[error("{0} cancelled")]
    Cancelled(&'static str),
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, IveeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(IveeError::NoSpeech.to_string(), "no speech detected");
        assert_eq!(
            IveeError::Capture("No screens found.".into()).to_string(),
            "screen capture failed: No screens found."
        );
        assert_eq!(
            IveeError::Timeout { stage: "inference", timeout_ms: 250 }.to_string(),
            "inference timed out after 250ms"
        );
        assert_eq!(IveeError::Cancelled("consent").to_string(), "consent cancelled");
    }
}
