//! Voice feedback resource
//!
//! A `Synthesizer` hands out one `FeedbackSink` per detection session. The
//! sink is wrapped in a `FeedbackSession` guard that releases it exactly once,
//! when the guard is released explicitly or dropped (including on unwind or
//! when the owning future is cancelled).

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::error::FeedbackError;

/// Source of speech output handles
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Acquire the speech output device
    async fn acquire(&self) -> Result<Box<dyn FeedbackSink>, FeedbackError>;
}

/// An acquired speech output handle
#[async_trait]
pub trait FeedbackSink: Send {
    /// Speak one announcement, returning when it has been spoken
    async fn speak(&mut self, text: &str) -> Result<(), FeedbackError>;

    /// Stop any speech in flight and give up the device
    fn release(&mut self);
}

/// Scoped ownership of a feedback sink
pub struct FeedbackSession {
    sink: Option<Box<dyn FeedbackSink>>,
}

impl FeedbackSession {
    /// Acquire a sink from the synthesizer
    pub async fn acquire(synthesizer: &dyn Synthesizer) -> Result<Self, FeedbackError> {
        let sink = synthesizer.acquire().await?;
        debug!("voice feedback acquired");
        Ok(Self { sink: Some(sink) })
    }

    /// Speak through the held sink
    pub async fn speak(&mut self, text: &str) -> Result<(), FeedbackError> {
        match self.sink.as_mut() {
            Some(sink) => sink.speak(text).await,
            None => Ok(()),
        }
    }

    /// Release the sink now rather than at end of scope
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            sink.release();
            debug!("voice feedback released");
        }
    }
}

impl Drop for FeedbackSession {
    fn drop(&mut self) {
        self.release_inner();
    }
}

/// Synthesizer that speaks through a TTS command (e.g. `espeak`)
///
/// The announcement text is appended as the last argument.
pub struct CommandSynthesizer {
    command: Vec<String>,
}

impl CommandSynthesizer {
    /// Create a synthesizer from a command line
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

#[async_trait]
impl Synthesizer for CommandSynthesizer {
    async fn acquire(&self) -> Result<Box<dyn FeedbackSink>, FeedbackError> {
        if self.command.is_empty() {
            return Err(FeedbackError::Spawn(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty speech command",
            )));
        }

        Ok(Box::new(CommandSink {
            command: self.command.clone(),
            current: None,
        }))
    }
}

struct CommandSink {
    command: Vec<String>,
    current: Option<Child>,
}

#[async_trait]
impl FeedbackSink for CommandSink {
    async fn speak(&mut self, text: &str) -> Result<(), FeedbackError> {
        let Some((program, args)) = self.command.split_first() else {
            return Ok(());
        };

        let child = Command::new(program)
            .args(args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(FeedbackError::Spawn)?;

        let status = self.current.insert(child).wait().await?;
        self.current = None;

        if !status.success() {
            return Err(FeedbackError::Exit(status.code().unwrap_or(-1)));
        }
        Ok(())
    }

    fn release(&mut self) {
        if let Some(mut child) = self.current.take() {
            if let Err(e) = child.start_kill() {
                debug!(error = %e, "utterance already finished");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CountingSynthesizer;

    #[tokio::test]
    async fn test_drop_releases_once() {
        let synth = CountingSynthesizer::new();
        {
            let mut session = FeedbackSession::acquire(synth.as_ref()).await.unwrap();
            session.speak("person ahead").await.unwrap();
        }
        assert_eq!(synth.acquired(), 1);
        assert_eq!(synth.released(), 1);
        assert_eq!(synth.spoken(), vec!["person ahead".to_string()]);
    }

    #[tokio::test]
    async fn test_explicit_release_is_not_repeated_on_drop() {
        let synth = CountingSynthesizer::new();
        let session = FeedbackSession::acquire(synth.as_ref()).await.unwrap();
        session.release();
        assert_eq!(synth.released(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_sink_reports_exit_code() {
        let ok = CommandSynthesizer::new(vec!["true".to_string()]);
        let mut sink = ok.acquire().await.unwrap();
        sink.speak("chair").await.unwrap();
        sink.release();

        let failing = CommandSynthesizer::new(vec!["false".to_string()]);
        let mut sink = failing.acquire().await.unwrap();
        assert!(matches!(sink.speak("chair").await, Err(FeedbackError::Exit(1))));
        sink.release();
    }

    #[tokio::test]
    async fn test_empty_command_cannot_acquire() {
        let synth = CommandSynthesizer::new(Vec::new());
        assert!(synth.acquire().await.is_err());
    }
}
