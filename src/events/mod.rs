//! Events module for the operator console
//!
//! The controller publishes one event per console-relevant moment of a
//! cycle. `Display` renders the human-readable status line.

use serde::{Deserialize, Serialize};

/// Events emitted by the session controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CaneEvent {
    /// Microphone opened, waiting for speech
    Listening,

    /// Audio captured, recognition in progress
    Recognizing,

    /// Speech recognized
    Heard {
        /// Lower-cased transcript
        text: String,
    },

    /// Audio captured but not understood
    Unintelligible,

    /// Recognition service unreachable
    NetworkError {
        /// Failure description from the service client
        detail: String,
    },

    /// Recognition did not finish within its deadline
    RecognitionTimedOut {
        /// Deadline in milliseconds
        after_ms: u64,
    },

    /// Detection session started
    SessionStarted,

    /// Detection session returned
    SessionFinished {
        /// Failure detail, if the session failed
        error: Option<String>,
        /// Duration in milliseconds that the session ran
        duration_ms: u64,
    },

    /// Cycle abandoned because of an unexpected failure
    CycleFailed {
        /// Failure description
        detail: String,
    },

    /// Exit command received
    Exiting,

    /// Interrupt signal received
    Interrupted,
}

impl CaneEvent {
    /// Whether this event reports a failure on the console
    pub fn is_error(&self) -> bool {
        match self {
            CaneEvent::NetworkError { .. }
            | CaneEvent::RecognitionTimedOut { .. }
            | CaneEvent::CycleFailed { .. } => true,
            CaneEvent::SessionFinished { error, .. } => error.is_some(),
            _ => false,
        }
    }
}

impl std::fmt::Display for CaneEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaneEvent::Listening => write!(f, "Listening..."),
            CaneEvent::Recognizing => write!(f, "Recognizing..."),
            CaneEvent::Heard { text } => write!(f, "You said: {}", text),
            CaneEvent::Unintelligible => write!(f, "Could not understand audio."),
            CaneEvent::NetworkError { detail } => write!(f, "Network error: {}", detail),
            CaneEvent::RecognitionTimedOut { after_ms } => {
                write!(f, "Network error: no answer from recognition service after {}ms", after_ms)
            }
            CaneEvent::SessionStarted => write!(f, "Starting object detection..."),
            CaneEvent::SessionFinished { error: None, duration_ms } => {
                write!(f, "Detection finished ({}ms).", duration_ms)
            }
            CaneEvent::SessionFinished { error: Some(detail), .. } => {
                write!(f, "Error during detection: {}", detail)
            }
            CaneEvent::CycleFailed { detail } => {
                write!(f, "An unexpected error occurred: {}", detail)
            }
            CaneEvent::Exiting => write!(f, "Exiting..."),
            CaneEvent::Interrupted => write!(f, "Stopped by user."),
        }
    }
}
