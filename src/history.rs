//! Conversation history: a bounded, most-recent-first log of events.
//! Holds utterances, assistant replies, consent notices and screenshots.
//! In-memory only; discarded with the orchestrator.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Default number of events retained.
pub const HISTORY_CAPACITY: usize = 6;

/// Who produced an event. System notices carry no speaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Speaker {
    User,
    Ivee,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::User => write!(f, "User"),
            Speaker::Ivee => write!(f, "Ivee"),
        }
    }
}

/// Captured screen image (PNG bytes). Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    png: Arc<[u8]>,
}

impl Screenshot {
    pub fn from_png(png: Vec<u8>) -> Self {
        Self { png: png.into() }
    }

    pub fn png_bytes(&self) -> &[u8] {
        &self.png
    }

    /// `data:image/png;base64,...` form for the webview.
    pub fn data_url(&self) -> String {
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&self.png)
        )
    }
}

impl Serialize for Screenshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.data_url())
    }
}

/// One immutable entry of the conversation log.
///
/// Constructors guarantee that an event carries text, a screenshot, or both.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    timestamp: DateTime<Utc>,
    speaker: Option<Speaker>,
    text: Option<String>,
    screenshot: Option<Screenshot>,
    context: Option<String>,
}

impl Event {
    /// Utterance or reply attributed to a speaker.
    pub fn spoken(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            timestamp: next_timestamp(),
            speaker: Some(speaker),
            text: Some(text.into()),
            screenshot: None,
            context: None,
        }
    }

    /// Speaker-less system notice (e.g. consent outcome).
    pub fn notice(text: impl Into<String>) -> Self {
        Self {
            timestamp: next_timestamp(),
            speaker: None,
            text: Some(text.into()),
            screenshot: None,
            context: None,
        }
    }

    /// Screenshot with the text extracted from it as context.
    pub fn screenshot(image: Screenshot, context: impl Into<String>) -> Self {
        Self {
            timestamp: next_timestamp(),
            speaker: None,
            text: None,
            screenshot: Some(image),
            context: Some(context.into()),
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn speaker(&self) -> Option<Speaker> {
        self.speaker
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn screenshot_image(&self) -> Option<&Screenshot> {
        self.screenshot.as_ref()
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// `speaker: text (Context: context)`, or None for entries that cannot be
    /// attributed to a speaker with text.
    fn context_line(&self) -> Option<String> {
        let speaker = self.speaker?;
        let text = self.text.as_deref().filter(|t| !t.is_empty())?;
        Some(match self.context.as_deref() {
            Some(ctx) if !ctx.is_empty() => format!("{speaker}: {text} (Context: {ctx})"),
            _ => format!("{speaker}: {text}"),
        })
    }
}

/// Last issued timestamp, in microseconds since the epoch.
static LAST_STAMP_US: AtomicI64 = AtomicI64::new(i64::MIN);

/// Wall-clock timestamp, strictly greater than every previously issued one.
fn next_timestamp() -> DateTime<Utc> {
    let now = Utc::now().timestamp_micros();
    let mut prev = LAST_STAMP_US.load(Ordering::SeqCst);
    loop {
        let candidate = now.max(prev.saturating_add(1));
        match LAST_STAMP_US.compare_exchange(prev, candidate, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => {
                return DateTime::<Utc>::from_timestamp_micros(candidate).unwrap_or_else(Utc::now);
            }
            Err(actual) => prev = actual,
        }
    }
}

/// Bounded most-recent-first event log.
#[derive(Debug, Clone)]
pub struct EventHistory {
    events: VecDeque<Event>,
    capacity: usize,
}

impl Default for EventHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl EventHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Prepend an event, evicting the oldest entries beyond the bound.
    pub fn append(&mut self, event: Event) {
        self.events.push_front(event);
        self.events.truncate(self.capacity);
    }

    /// Current contents, most recent first.
    pub fn snapshot(&self) -> Vec<Event> {
        self.events.iter().cloned().collect()
    }

    /// Format the `limit` most recent entries as prompt context, oldest first.
    /// Entries without both a speaker and text are skipped.
    pub fn render_context(&self, limit: usize) -> String {
        let lines: Vec<String> = self
            .events
            .iter()
            .take(limit)
            .filter_map(Event::context_line)
            .collect();
        lines.into_iter().rev().collect::<Vec<_>>().join("\n")
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_six_most_recent_newest_first() {
        let mut history = EventHistory::default();
        for i in 0..10 {
            history.append(Event::spoken(Speaker::User, format!("msg {i}")));
        }
        let texts: Vec<_> = history
            .snapshot()
            .iter()
            .map(|e| e.text().unwrap_or_default().to_string())
            .collect();
        assert_eq!(texts, ["msg 9", "msg 8", "msg 7", "msg 6", "msg 5", "msg 4"]);
    }

    #[test]
    fn render_context_takes_most_recent_oldest_first() {
        let mut history = EventHistory::default();
        // Appended oldest first, so the store reads [User A, Ivee B, User C].
        history.append(Event::spoken(Speaker::User, "C"));
        history.append(Event::spoken(Speaker::Ivee, "B"));
        history.append(Event::spoken(Speaker::User, "A"));

        assert_eq!(history.render_context(2), "Ivee: B\nUser: A");
        assert_eq!(history.render_context(5), "User: C\nIvee: B\nUser: A");
    }

    #[test]
    fn render_context_skips_notices_and_screenshots() {
        let mut history = EventHistory::default();
        history.append(Event::spoken(Speaker::User, "what am I doing"));
        history.append(Event::notice("Bhada gave permission."));
        history.append(Event::screenshot(Screenshot::from_png(vec![1, 2]), "fn main()"));
        history.append(Event::spoken(Speaker::Ivee, "You are writing Rust."));

        // Slice first, then filter: limit 3 covers the reply, screenshot, notice.
        assert_eq!(history.render_context(3), "Ivee: You are writing Rust.");
        assert_eq!(
            history.render_context(4),
            "User: what am I doing\nIvee: You are writing Rust."
        );
    }

    #[test]
    fn context_annotation_is_appended() {
        let event = Event {
            context: Some("terminal".into()),
            ..Event::spoken(Speaker::User, "look")
        };
        assert_eq!(event.context_line().as_deref(), Some("User: look (Context: terminal)"));
    }

    #[test]
    fn timestamps_are_unique_and_ordered() {
        let events: Vec<Event> = (0..200).map(|_| Event::notice("tick")).collect();
        for pair in events.windows(2) {
            assert!(pair[0].timestamp() < pair[1].timestamp());
        }
    }

    #[test]
    fn screenshot_serializes_as_data_url() {
        let event = Event::screenshot(Screenshot::from_png(vec![0x89, 0x50]), "text");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["screenshot"], "data:image/png;base64,iVA=");
        assert_eq!(json["context"], "text");
        assert!(json["speaker"].is_null());
    }
}
