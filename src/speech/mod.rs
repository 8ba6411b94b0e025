//! Speech-to-text collaborator: free-form utterances for the wake flow and a
//! yes/no decision for the consent flow.

pub mod whisper;

#[cfg(feature = "desktop")]
pub mod mic;

use std::fmt;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::error::{IveeError, Result};

/// Spoken answer to the permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConsentDecision {
    Allowed,
    Denied,
}

impl ConsentDecision {
    /// Engines that answer with a word: `"allowed"` grants, anything else denies.
    pub fn from_reply(reply: &str) -> Self {
        if reply.trim() == "allowed" {
            ConsentDecision::Allowed
        } else {
            ConsentDecision::Denied
        }
    }

    /// Interpret a transcript. Any refusal wins over an approval.
    pub fn from_transcript(transcript: &str) -> Self {
        match (allow_pattern(), refuse_pattern()) {
            (Some(allow), Some(refuse))
                if allow.is_match(transcript) && !refuse.is_match(transcript) =>
            {
                ConsentDecision::Allowed
            }
            _ => ConsentDecision::Denied,
        }
    }

    /// Decision from a recorded-and-transcribed answer. Silence denies;
    /// capture failures surface as `Consent` errors.
    pub fn from_recording(recorded: Result<String>) -> Result<Self> {
        match recorded {
            Ok(transcript) => {
                let decision = Self::from_transcript(&transcript);
                debug!(transcript = %transcript, decision = %decision, "consent transcript");
                Ok(decision)
            }
            Err(IveeError::NoSpeech) => {
                debug!("no answer heard, consent denied");
                Ok(ConsentDecision::Denied)
            }
            Err(IveeError::SpeechCapture(msg)) => Err(IveeError::Consent(msg)),
            Err(e) => Err(e),
        }
    }

    pub fn is_allowed(self) -> bool {
        self == ConsentDecision::Allowed
    }
}

impl fmt::Display for ConsentDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsentDecision::Allowed => write!(f, "allowed"),
            ConsentDecision::Denied => write!(f, "denied"),
        }
    }
}

fn allow_pattern() -> Option<&'static Regex> {
    static ALLOW: OnceLock<Option<Regex>> = OnceLock::new();
    ALLOW
        .get_or_init(|| {
            Regex::new(r"(?i)\b(yes|yeah|yep|sure|allow(ed)?|ok(ay)?|go ahead|of course|please do)\b").ok()
        })
        .as_ref()
}

fn refuse_pattern() -> Option<&'static Regex> {
    static REFUSE: OnceLock<Option<Regex>> = OnceLock::new();
    REFUSE
        .get_or_init(|| Regex::new(r"(?i)\b(no|nope|don'?t|do not|deny|denied|never|stop)\b").ok())
        .as_ref()
}

/// Captures speech from the user. Both calls suspend until the user has
/// answered or the recording window closes.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    async fn listen_for_speech(&self, access_key: &str) -> Result<String>;

    async fn listen_for_consent(&self, access_key: &str) -> Result<ConsentDecision>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_word_protocol() {
        assert_eq!(ConsentDecision::from_reply("allowed"), ConsentDecision::Allowed);
        assert_eq!(ConsentDecision::from_reply("denied"), ConsentDecision::Denied);
        assert_eq!(ConsentDecision::from_reply(""), ConsentDecision::Denied);
    }

    #[test]
    fn transcript_intents() {
        assert!(ConsentDecision::from_transcript("Yes, go ahead.").is_allowed());
        assert!(ConsentDecision::from_transcript("okay").is_allowed());
        assert!(!ConsentDecision::from_transcript("No thanks").is_allowed());
        assert!(!ConsentDecision::from_transcript("yes... actually don't").is_allowed());
        assert!(!ConsentDecision::from_transcript("hmm").is_allowed());
        assert!(!ConsentDecision::from_transcript("").is_allowed());
    }

    #[test]
    fn silence_denies_and_capture_errors_become_consent_errors() {
        assert_eq!(
            ConsentDecision::from_recording(Err(IveeError::NoSpeech)),
            Ok(ConsentDecision::Denied)
        );
        assert_eq!(
            ConsentDecision::from_recording(Ok("yes please".into())),
            Ok(ConsentDecision::Allowed)
        );
        assert_eq!(
            ConsentDecision::from_recording(Err(IveeError::SpeechCapture("upload failed".into()))),
            Err(IveeError::Consent("upload failed".into()))
        );
        assert_eq!(
            ConsentDecision::from_recording(Err(IveeError::Cancelled("consent"))),
            Err(IveeError::Cancelled("consent"))
        );
    }

    #[test]
    fn intent_patterns_compile() {
        assert!(allow_pattern().is_some());
        assert!(refuse_pattern().is_some());
    }

    #[test]
    fn display_matches_reply_words() {
        assert_eq!(ConsentDecision::Allowed.to_string(), "allowed");
        assert_eq!(ConsentDecision::Denied.to_string(), "denied");
    }
}
