//! Spoken command classification

/// Commands the cane responds to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run one detection session
    StartDetection,
    /// Stop the cane
    Exit,
    /// Background speech, ignored
    Unknown,
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::StartDetection => write!(f, "StartDetection"),
            Command::Exit => write!(f, "Exit"),
            Command::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Maps lower-cased transcripts to commands by substring match
#[derive(Debug, Clone)]
pub struct CommandClassifier {
    start_word: String,
    exit_word: String,
}

impl Default for CommandClassifier {
    fn default() -> Self {
        Self::new("hello", "exit")
    }
}

impl CommandClassifier {
    /// Create a classifier with the given trigger words
    pub fn new(start_word: impl Into<String>, exit_word: impl Into<String>) -> Self {
        Self {
            start_word: start_word.into().to_lowercase(),
            exit_word: exit_word.into().to_lowercase(),
        }
    }

    /// Classify a transcript
    ///
    /// Start takes priority over exit regardless of where each word appears.
    pub fn classify(&self, text: &str) -> Command {
        if text.contains(&self.start_word) {
            Command::StartDetection
        } else if text.contains(&self.exit_word) {
            Command::Exit
        } else {
            Command::Unknown
        }
    }
}
