//! Speech module: recognition and command classification

mod command;
mod recognizer;
mod whisper;

pub use command::{Command, CommandClassifier};
pub use recognizer::{RecognitionOutcome, RecognitionService, SpeechRecognizer};
pub use whisper::WhisperService;
