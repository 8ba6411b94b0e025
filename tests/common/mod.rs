//! In-memory collaborators for driving the orchestrator in tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use ivee::audio::{AudioClip, AudioSink, Cue, CueBank};
use ivee::capture::{ScreenEngine, ScreenReading};
use ivee::config::AppConfig;
use ivee::history::Screenshot;
use ivee::keyword::{KeywordEngine, KeywordSlot};
use ivee::llm::{CompletionRequest, LanguageModel};
use ivee::speech::{ConsentDecision, SpeechEngine};
use ivee::tts::SpeechSynthesizer;
use ivee::{Collaborators, IveeError, Orchestrator, Result};

#[derive(Default)]
pub struct FakeKeywords {
    pub slot: KeywordSlot,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub fail_start: Mutex<Option<IveeError>>,
}

#[async_trait]
impl KeywordEngine for FakeKeywords {
    async fn start(&self, _access_key: &str) -> Result<()> {
        if let Some(e) = self.fail_start.lock().clone() {
            return Err(e);
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.slot.clear();
        Ok(())
    }

    async fn last_keyword(&self) -> Result<Option<String>> {
        Ok(self.slot.take())
    }
}

/// Scripted speech engine. Optional gates hold calls until permits are added.
#[derive(Default)]
pub struct FakeSpeech {
    pub transcripts: Mutex<VecDeque<Result<String>>>,
    pub consents: Mutex<VecDeque<Result<String>>>,
    pub speech_calls: AtomicUsize,
    pub consent_calls: AtomicUsize,
    pub speech_gate: Option<Semaphore>,
    pub consent_gate: Option<Semaphore>,
}

impl FakeSpeech {
    pub fn gated() -> Self {
        Self {
            speech_gate: Some(Semaphore::new(0)),
            consent_gate: Some(Semaphore::new(0)),
            ..Default::default()
        }
    }

    pub fn say(&self, transcript: &str) {
        self.transcripts.lock().push_back(Ok(transcript.to_string()));
    }

    pub fn answer(&self, reply: &str) {
        self.consents.lock().push_back(Ok(reply.to_string()));
    }
}

async fn pass(gate: &Option<Semaphore>) {
    if let Some(gate) = gate {
        if let Ok(permit) = gate.acquire().await {
            permit.forget();
        }
    }
}

#[async_trait]
impl SpeechEngine for FakeSpeech {
    async fn listen_for_speech(&self, _access_key: &str) -> Result<String> {
        self.speech_calls.fetch_add(1, Ordering::SeqCst);
        pass(&self.speech_gate).await;
        self.transcripts.lock().pop_front().unwrap_or(Err(IveeError::NoSpeech))
    }

    async fn listen_for_consent(&self, _access_key: &str) -> Result<ConsentDecision> {
        self.consent_calls.fetch_add(1, Ordering::SeqCst);
        pass(&self.consent_gate).await;
        let reply = self
            .consents
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok("denied".into()))?;
        Ok(ConsentDecision::from_reply(&reply))
    }
}

pub struct FakeScreen {
    pub result: Mutex<Result<String>>,
    pub calls: AtomicUsize,
}

impl Default for FakeScreen {
    fn default() -> Self {
        Self {
            result: Mutex::new(Ok("fn main() {}".into())),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ScreenEngine for FakeScreen {
    async fn capture_and_extract(&self) -> Result<ScreenReading> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = self.result.lock().clone()?;
        Ok(ScreenReading {
            image: Screenshot::from_png(vec![0x89, b'P', b'N', b'G']),
            text,
        })
    }
}

#[derive(Default)]
pub struct FakeModel {
    pub replies: Mutex<VecDeque<Result<String>>>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeModel {
    pub fn reply(&self, text: &str) {
        self.replies.lock().push_back(Ok(text.to_string()));
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.requests.lock().push(request);
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok("Okay.".into()))
    }
}

#[derive(Default)]
pub struct FakeTts {
    pub spoken: Mutex<Vec<(String, String)>>,
    pub silent: std::sync::atomic::AtomicBool,
}

#[async_trait]
impl SpeechSynthesizer for FakeTts {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>> {
        self.spoken.lock().push((text.to_string(), voice_id.to_string()));
        if self.silent.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        Ok(b"ID3fake-mp3".to_vec())
    }
}

#[derive(Default)]
pub struct FakeSink {
    pub played: Mutex<Vec<String>>,
}

impl FakeSink {
    pub fn labels(&self) -> Vec<String> {
        self.played.lock().clone()
    }

    pub fn count(&self, label: &str) -> usize {
        self.played.lock().iter().filter(|l| *l == label).count()
    }
}

#[async_trait]
impl AudioSink for FakeSink {
    async fn play(&self, clip: &AudioClip) -> Result<()> {
        self.played.lock().push(clip.label().to_string());
        Ok(())
    }
}

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub keywords: Arc<FakeKeywords>,
    pub speech: Arc<FakeSpeech>,
    pub screen: Arc<FakeScreen>,
    pub model: Arc<FakeModel>,
    pub tts: Arc<FakeTts>,
    pub sink: Arc<FakeSink>,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        access_key: "test-access".into(),
        voice_id: "voice-1".into(),
        ready_cue_delay_ms: 0,
        analysis_settle_ms: 0,
        ..AppConfig::default()
    }
}

pub fn cue_bank() -> CueBank {
    let mut bank = CueBank::empty();
    for cue in [Cue::Ready, Cue::Permission, Cue::Capture] {
        bank.insert(cue, AudioClip::new(cue.to_string(), vec![0xFF, 0xFB]));
    }
    bank
}

pub fn harness_with(config: AppConfig, speech: FakeSpeech, cues: CueBank) -> Harness {
    let keywords = Arc::new(FakeKeywords::default());
    let speech = Arc::new(speech);
    let screen = Arc::new(FakeScreen::default());
    let model = Arc::new(FakeModel::default());
    let tts = Arc::new(FakeTts::default());
    let sink = Arc::new(FakeSink::default());
    let collaborators = Collaborators {
        keywords: keywords.clone(),
        speech: speech.clone(),
        screen: screen.clone(),
        model: model.clone(),
        tts: tts.clone(),
        sink: sink.clone(),
    };
    Harness {
        orchestrator: Orchestrator::new(config, collaborators, cues),
        keywords,
        speech,
        screen,
        model,
        tts,
        sink,
    }
}

pub fn harness() -> Harness {
    harness_with(test_config(), FakeSpeech::default(), CueBank::empty())
}

/// Yield until `cond` holds; panics after a generous number of rounds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..2_000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached");
}
