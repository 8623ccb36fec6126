//! Speech recognition front end
//!
//! Wraps a recognition service with a hard deadline and normalises the
//! transcript so command matching is case-insensitive.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::audio::AudioSample;
use crate::error::RecognizerError;

/// What the recognizer made of one sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionOutcome {
    /// Transcript, lower-cased once it leaves `SpeechRecognizer`
    Recognized(String),
    /// Audio was captured but nothing was understood
    Unintelligible,
    /// The service could not be reached
    NetworkError(String),
    /// The service did not answer before the deadline
    Timeout,
}

/// A remote or local speech-to-text backend
#[async_trait]
pub trait RecognitionService: Send + Sync {
    /// Transcribe one sample
    ///
    /// Expected failures are returned as outcomes; `Err` is reserved for
    /// failures the controller cannot classify.
    async fn transcribe(&self, sample: &AudioSample) -> Result<RecognitionOutcome, RecognizerError>;
}

/// Converts captured audio into command text
pub struct SpeechRecognizer {
    service: Arc<dyn RecognitionService>,
    deadline: Duration,
}

impl SpeechRecognizer {
    /// Create a recognizer that abandons any request running past `deadline`
    pub fn new(service: Arc<dyn RecognitionService>, deadline: Duration) -> Self {
        Self { service, deadline }
    }

    /// The configured recognition deadline
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Recognize a sample, consuming it
    pub async fn recognize(&self, sample: AudioSample) -> Result<RecognitionOutcome, RecognizerError> {
        let outcome = match tokio::time::timeout(self.deadline, self.service.transcribe(&sample)).await {
            Ok(outcome) => outcome?,
            Err(_) => {
                warn!(deadline_ms = self.deadline.as_millis() as u64, "recognition abandoned");
                return Ok(RecognitionOutcome::Timeout);
            }
        };

        let outcome = match outcome {
            RecognitionOutcome::Recognized(text) => {
                let text = text.trim().to_lowercase();
                if text.is_empty() {
                    RecognitionOutcome::Unintelligible
                } else {
                    RecognitionOutcome::Recognized(text)
                }
            }
            other => other,
        };

        debug!(?outcome, "recognition finished");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample, ScriptedRecognizer};

    #[tokio::test]
    async fn test_text_is_lower_cased() {
        let service = ScriptedRecognizer::new(vec![Ok(RecognitionOutcome::Recognized(
            "  Hello Please START ".to_string(),
        ))]);
        let recognizer = SpeechRecognizer::new(service, Duration::from_secs(10));

        let outcome = recognizer.recognize(sample()).await.unwrap();
        assert_eq!(outcome, RecognitionOutcome::Recognized("hello please start".to_string()));
    }

    #[tokio::test]
    async fn test_blank_text_is_unintelligible() {
        let service = ScriptedRecognizer::new(vec![Ok(RecognitionOutcome::Recognized("   ".to_string()))]);
        let recognizer = SpeechRecognizer::new(service, Duration::from_secs(10));

        let outcome = recognizer.recognize(sample()).await.unwrap();
        assert_eq!(outcome, RecognitionOutcome::Unintelligible);
    }

    #[tokio::test]
    async fn test_failures_pass_through() {
        let service = ScriptedRecognizer::new(vec![
            Ok(RecognitionOutcome::NetworkError("timeout".to_string())),
            Err(RecognizerError::Response("garbage".to_string())),
        ]);
        let recognizer = SpeechRecognizer::new(service, Duration::from_secs(10));

        let outcome = recognizer.recognize(sample()).await.unwrap();
        assert_eq!(outcome, RecognitionOutcome::NetworkError("timeout".to_string()));

        let result = recognizer.recognize(sample()).await;
        assert!(matches!(result, Err(RecognizerError::Response(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_service_hits_deadline() {
        let service = ScriptedRecognizer::hanging();
        let recognizer = SpeechRecognizer::new(service, Duration::from_secs(10));

        let outcome = recognizer.recognize(sample()).await.unwrap();
        assert_eq!(outcome, RecognitionOutcome::Timeout);
    }
}
