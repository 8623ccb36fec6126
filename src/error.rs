//! Error types for the smart cane control loop
//!
//! Only failures that are not part of normal operation live here. Expected
//! outcomes (capture timeout, unintelligible audio, network hiccups, failed
//! detection sessions) are ordinary values on their own result types.

use thiserror::Error;

/// Microphone failures
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to open microphone: {0}")]
    Open(String),

    #[error("microphone stream error: {0}")]
    Stream(#[from] std::io::Error),

    #[error("microphone stopped producing audio")]
    Closed,
}

/// Recognition failures that are neither "not understood" nor network related
#[derive(Debug, Error)]
pub enum RecognizerError {
    #[error("recognition service rejected the request: {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("malformed recognition response: {0}")]
    Response(String),

    #[error("failed to encode audio: {0}")]
    Encode(String),
}

/// Detection engine failures, contained by the session runner
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start detection engine: {0}")]
    Spawn(std::io::Error),

    #[error("detection engine exited with code {0}")]
    Exit(i32),

    #[error("detection engine was terminated by a signal")]
    Killed,

    #[error("detection engine overran its {0:?} session")]
    Overran(std::time::Duration),

    #[error("detection engine I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid detection engine command: {0}")]
    Command(String),
}

/// Speech synthesizer failures
#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("failed to start speech synthesizer: {0}")]
    Spawn(std::io::Error),

    #[error("speech synthesizer error: {0}")]
    Io(#[from] std::io::Error),

    #[error("speech synthesizer exited with code {0}")]
    Exit(i32),
}

/// Failures that abandon the current cycle but never the loop
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("audio capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("speech recognition failed: {0}")]
    Recognizer(#[from] RecognizerError),
}
