//! Keyword vocabulary and flow classification.
//! The detector reports each trained phrase by numeric index; the index digit
//! decides which conversational flow a keyword starts.

use std::fmt;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::Result;

/// Background wake-phrase detector.
#[async_trait]
pub trait KeywordEngine: Send + Sync {
    /// Begin background listening. Starting a running engine is a no-op.
    async fn start(&self, access_key: &str) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    /// Point-in-time read of the most recent keyword; clears it.
    async fn last_keyword(&self) -> Result<Option<String>>;
}

/// Indicator for the direct-query ("hey Ivee") phrase.
pub const WAKE_INDICATOR: char = '0';
/// Indicator for the screen-analysis ("what do you see") phrase.
pub const QUERY_INDICATOR: char = '1';

/// Conversational flow selected by a keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FlowKind {
    /// Speech capture → reply, no consent.
    Wake,
    /// Consent-gated screenshot analysis.
    Query,
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowKind::Wake => write!(f, "wake"),
            FlowKind::Query => write!(f, "query"),
        }
    }
}

/// Substring classification. A keyword carrying both indicators
/// (e.g. "Keyword 10 detected") resolves to `Wake`.
pub fn classify(keyword: &str) -> Option<FlowKind> {
    if keyword.contains(WAKE_INDICATOR) {
        Some(FlowKind::Wake)
    } else if keyword.contains(QUERY_INDICATOR) {
        Some(FlowKind::Query)
    } else {
        None
    }
}

/// Label stored by the detector for a recognized phrase index.
pub fn keyword_label(index: usize) -> String {
    format!("Keyword {index} detected")
}

/// Single-slot mailbox holding the most recent detection.
/// Reads take the value so each detection is dispatched once.
#[derive(Debug, Default)]
pub struct KeywordSlot {
    last: Mutex<Option<String>>,
}

impl KeywordSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites any keyword not yet read.
    pub fn store(&self, keyword: String) {
        *self.last.lock() = Some(keyword);
    }

    pub fn take(&self) -> Option<String> {
        self.last.lock().take()
    }

    pub fn clear(&self) {
        self.last.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_indicator() {
        assert_eq!(classify("0-alpha"), Some(FlowKind::Wake));
        assert_eq!(classify("1-beta"), Some(FlowKind::Query));
        assert_eq!(classify("xyz"), None);
        assert_eq!(classify(""), None);
        assert_eq!(classify(&keyword_label(0)), Some(FlowKind::Wake));
        assert_eq!(classify(&keyword_label(1)), Some(FlowKind::Query));
    }

    #[test]
    fn both_indicators_resolve_to_wake() {
        assert_eq!(classify("10"), Some(FlowKind::Wake));
        assert_eq!(classify("1-then-0"), Some(FlowKind::Wake));
        assert_eq!(classify(&keyword_label(10)), Some(FlowKind::Wake));
    }

    #[test]
    fn slot_take_clears() {
        let slot = KeywordSlot::new();
        assert_eq!(slot.take(), None);
        slot.store(keyword_label(0));
        slot.store(keyword_label(1));
        assert_eq!(slot.take().as_deref(), Some("Keyword 1 detected"));
        assert_eq!(slot.take(), None);
    }
}
