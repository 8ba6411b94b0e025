//! Ivee: wake-phrase voice assistant.
//! Library root: module tree, tracing setup, and (with `desktop`) the Tauri shell.

pub mod audio;
pub mod cancellation;
pub mod capture;
pub mod config;
pub mod error;
pub mod history;
pub mod keyword;
pub mod llm;
pub mod metrics;
pub mod ocr;
pub mod orchestrator;
pub mod poller;
pub mod responder;
pub mod speech;
pub mod state_machine;
pub mod tts;

#[cfg(feature = "desktop")]
mod app;

#[cfg(feature = "desktop")]
pub use app::run;

pub use error::{IveeError, Result};
pub use orchestrator::{Collaborators, Dispatch, Orchestrator, StatusSnapshot};

use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "ivee=debug,tauri=info";

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter; `IVEE_LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);

    let json = std::env::var("IVEE_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
