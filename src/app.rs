//! Tauri shell: wires the concrete collaborators into an orchestrator, exposes
//! the control and presentation commands, and forwards change notifications.

use std::collections::HashMap;
use std::sync::Arc;

use tauri::{Emitter, Manager};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::audio::output::SpeakerSink;
use crate::audio::wake::MicKeywordEngine;
use crate::audio::CueBank;
use crate::capture::DesktopScreenEngine;
use crate::config::AppConfig;
use crate::error::Result;
use crate::history::Event;
use crate::llm::anthropic::AnthropicClient;
use crate::metrics::MetricSummary;
use crate::orchestrator::{Collaborators, Orchestrator, StatusSnapshot};
use crate::speech::mic::MicSpeechEngine;
use crate::speech::whisper::TranscriptionClient;
use crate::tts::ElevenLabsClient;

/// Shared application state managed by Tauri.
pub struct AppContext {
    pub orchestrator: Orchestrator,
}

// --- Tauri Commands ---

#[tauri::command]
async fn start_listening(ctx: tauri::State<'_, AppContext>) -> std::result::Result<(), String> {
    ctx.orchestrator.start_listening().await.map_err(|e| e.to_string())
}

#[tauri::command]
async fn stop_listening(ctx: tauri::State<'_, AppContext>) -> std::result::Result<(), String> {
    ctx.orchestrator.stop_listening().await.map_err(|e| e.to_string())
}

#[tauri::command]
fn get_events(ctx: tauri::State<'_, AppContext>) -> Vec<Event> {
    ctx.orchestrator.history()
}

#[tauri::command]
fn get_status(ctx: tauri::State<'_, AppContext>) -> StatusSnapshot {
    ctx.orchestrator.status()
}

#[tauri::command]
fn get_metrics_summary(ctx: tauri::State<'_, AppContext>) -> HashMap<String, MetricSummary> {
    ctx.orchestrator.metrics_summary()
}

fn build_orchestrator(config: AppConfig, shutdown: CancellationToken) -> Result<Orchestrator> {
    let transcription = TranscriptionClient::new(&config.transcription_url, &config.transcription_model)?;
    let collaborators = Collaborators {
        keywords: Arc::new(MicKeywordEngine::new()),
        speech: Arc::new(MicSpeechEngine::new(transcription)),
        screen: Arc::new(DesktopScreenEngine::detect()),
        model: Arc::new(AnthropicClient::new(&config.anthropic_api_key, shutdown)?),
        tts: Arc::new(ElevenLabsClient::new(&config.elevenlabs_api_key)?),
        sink: Arc::new(SpeakerSink::new()),
    };
    let cues = CueBank::load(&config.cues);
    Ok(Orchestrator::new(config, collaborators, cues))
}

/// Forward orchestrator revisions to the webview as events.
fn spawn_emitter(handle: tauri::AppHandle, orchestrator: Orchestrator) {
    let mut revisions = orchestrator.subscribe();
    tauri::async_runtime::spawn(async move {
        while revisions.changed().await.is_ok() {
            if let Err(e) = handle.emit("history-updated", orchestrator.history()) {
                warn!(error = %e, "failed to emit history");
            }
            if let Err(e) = handle.emit("status-updated", orchestrator.status()) {
                warn!(error = %e, "failed to emit status");
            }
        }
    });
}

/// Build and run the Tauri application.
pub fn run() {
    crate::init_tracing();
    info!("ivee starting");

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "config load failed, using defaults and environment");
            let mut config = AppConfig::default();
            config.apply_env(|key| std::env::var(key).ok());
            config
        }
    };

    let shutdown = CancellationToken::new();
    let orchestrator = match build_orchestrator(config, shutdown.clone()) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            error!(error = %e, "failed to initialize collaborators");
            return;
        }
    };

    let app_context = AppContext {
        orchestrator: orchestrator.clone(),
    };

    let result = tauri::Builder::default()
        .plugin(tauri_plugin_shell::init())
        .manage(app_context)
        .setup(move |app| {
            spawn_emitter(app.handle().clone(), orchestrator.clone());

            let starter = orchestrator.clone();
            tauri::async_runtime::spawn(async move {
                if let Err(e) = starter.start_listening().await {
                    warn!(error = %e, "initial start_listening failed");
                }
            });

            if app.get_webview_window("main").is_none() {
                warn!("main window missing");
            }
            info!("ivee setup complete");
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            start_listening,
            stop_listening,
            get_events,
            get_status,
            get_metrics_summary,
        ])
        .build(tauri::generate_context!());

    match result {
        Ok(app) => app.run(move |handle, event| {
            if let tauri::RunEvent::Exit = event {
                shutdown.cancel();
                let ctx = handle.state::<AppContext>();
                let orchestrator = ctx.orchestrator.clone();
                tauri::async_runtime::block_on(orchestrator.shutdown());
            }
        }),
        Err(e) => error!(error = %e, "error while building ivee"),
    }
}
