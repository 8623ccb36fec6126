//! smart-cane: hands-free control loop for an object-detecting cane
//!
//! Listens for spoken commands and runs time-boxed detection sessions:
//! - Microphone capture from an input device, or a raw PCM recorder process
//! - Speech recognition through a Whisper-compatible HTTP service
//! - Explicit state machine for the listen/recognize/dispatch cycle
//! - Detection engine and speech synthesizer run as child processes
//!
//! Model loading, inference and rendering belong to the detection engine.

mod audio;
mod config;
mod console;
mod detection;
mod error;
mod events;
mod lifecycle;
mod speech;
mod state;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::audio::{AudioCapture, CommandMicrophone, DeviceMicrophone, Microphone};
use crate::config::Config;
use crate::detection::{CommandSynthesizer, DetectionSessionRunner, ProcessEngine};
use crate::events::CaneEvent;
use crate::lifecycle::ShutdownSignal;
use crate::speech::{SpeechRecognizer, WhisperService};
use crate::state::SessionController;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "smart-cane starting"
    );

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;
    info!(
        weights = %config.weights.display(),
        source = %config.source,
        session_ms = config.session_duration.as_millis() as u64,
        "configuration loaded"
    );

    if config.stt_api_key.is_empty() {
        warn!("OPENAI_API_KEY is not set, recognition requests are sent without credentials");
    }

    // Create shutdown signal handler
    let shutdown = ShutdownSignal::new();

    // Controller -> console
    let (event_tx, event_rx) = broadcast::channel::<CaneEvent>(64);

    console::banner(
        &mut std::io::stdout(),
        &config.start_word,
        &config.exit_word,
        config.session_duration.as_secs_f64(),
    )
    .context("failed to write to console")?;
    let console = tokio::spawn(console::report(event_rx, std::io::stdout()));

    let microphone: Arc<dyn Microphone> = match &config.record_command {
        Some(command) => {
            info!(recorder = %command.join(" "), "capturing through recorder command");
            Arc::new(CommandMicrophone::new(command.clone(), config.sample_rate))
        }
        None => {
            info!(device = config.input_device.as_deref().unwrap_or("default"), "capturing from input device");
            Arc::new(DeviceMicrophone::new(config.input_device.clone(), config.sample_rate))
        }
    };
    let capture = AudioCapture::new(microphone, config.energy_threshold);
    let recognizer = SpeechRecognizer::new(
        Arc::new(WhisperService::new(
            config.stt_url.clone(),
            config.stt_api_key.clone(),
            config.stt_model.clone(),
        )),
        config.recognition_deadline,
    );
    let runner = DetectionSessionRunner::new(
        Arc::new(
            ProcessEngine::new(config.detect_command.clone())
                .with_teardown_grace(config.teardown_grace),
        ),
        Arc::new(CommandSynthesizer::new(config.tts_command.clone())),
    );

    let mut controller = SessionController::new(config, capture, recognizer, runner, event_tx);

    info!("smart-cane initialized, entering main loop");

    let reason = controller.run(shutdown.wait()).await;
    info!(?reason, "session controller returned");

    // Dropping the controller closes the event channel and ends the console
    drop(controller);
    if let Err(e) = console.await {
        warn!(error = %e, "console task failed");
    }

    info!("smart-cane stopped");

    Ok(())
}
