//! Session controller state machine
//!
//! Drives the listen → recognize → dispatch cycle and supervises detection
//! sessions. Cycles run strictly one after another; nothing that goes wrong
//! inside a cycle stops the loop. Only an exit command or an interrupt does.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::audio::{AudioCapture, CaptureOutcome};
use crate::config::Config;
use crate::detection::{DetectionSessionResult, DetectionSessionRunner};
use crate::error::CycleError;
use crate::events::CaneEvent;
use crate::speech::{Command, CommandClassifier, RecognitionOutcome, SpeechRecognizer};

/// Pause after an unexpected cycle failure before listening again
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Controller states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Waiting for speech
    Listening,
    /// Turning captured audio into text
    Recognizing,
    /// Classifying recognized text
    Dispatching,
    /// Detection session in progress
    RunningSession,
    /// Loop finished
    Stopped,
}

impl Default for State {
    fn default() -> Self {
        Self::Listening
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Listening => write!(f, "Listening"),
            State::Recognizing => write!(f, "Recognizing"),
            State::Dispatching => write!(f, "Dispatching"),
            State::RunningSession => write!(f, "RunningSession"),
            State::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Why the controller loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The user said the exit word
    ExitCommand,
    /// An interrupt signal arrived
    Interrupted,
}

/// The top-level voice control loop
pub struct SessionController {
    config: Config,
    capture: AudioCapture,
    recognizer: SpeechRecognizer,
    classifier: CommandClassifier,
    runner: DetectionSessionRunner,
    /// Current state
    state: State,
    /// Time when the current state was entered
    state_entered_at: Instant,
    /// Loop continuation flag
    running: bool,
    /// Channel for console events
    event_tx: broadcast::Sender<CaneEvent>,
}

impl SessionController {
    /// Create a controller from its collaborators
    pub fn new(
        config: Config,
        capture: AudioCapture,
        recognizer: SpeechRecognizer,
        runner: DetectionSessionRunner,
        event_tx: broadcast::Sender<CaneEvent>,
    ) -> Self {
        let classifier = CommandClassifier::new(config.start_word.clone(), config.exit_word.clone());
        Self {
            config,
            capture,
            recognizer,
            classifier,
            runner,
            state: State::Listening,
            state_entered_at: Instant::now(),
            running: false,
            event_tx,
        }
    }

    /// Get the current state
    pub fn state(&self) -> State {
        self.state
    }

    /// Run cycles until an exit command or until `shutdown` resolves
    ///
    /// On shutdown the in-flight cycle is dropped, which releases whichever
    /// microphone or speech device it held.
    pub async fn run<F>(&mut self, shutdown: F) -> StopReason
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        self.running = true;
        info!("session controller started");

        while self.running {
            let result = tokio::select! {
                biased;
                _ = &mut shutdown => None,
                result = self.cycle() => Some(result),
            };

            match result {
                None => return self.interrupt(),
                Some(Ok(State::Stopped)) => {
                    self.running = false;
                }
                Some(Ok(next)) => {
                    debug!(next = %next, "cycle finished");
                }
                Some(Err(e)) => {
                    error!(error = %e, "cycle failed, resuming listening");
                    self.emit(CaneEvent::CycleFailed {
                        detail: e.to_string(),
                    });
                    self.transition_to(State::Listening);

                    let interrupted = tokio::select! {
                        biased;
                        _ = &mut shutdown => true,
                        _ = tokio::time::sleep(ERROR_BACKOFF) => false,
                    };
                    if interrupted {
                        return self.interrupt();
                    }
                }
            }
        }

        info!("session controller stopped");
        StopReason::ExitCommand
    }

    /// Run one cycle and return the state the next cycle starts from
    pub async fn cycle(&mut self) -> Result<State, CycleError> {
        self.transition_to(State::Listening);
        self.emit(CaneEvent::Listening);

        let outcome = self
            .capture
            .capture(self.config.listen_timeout, self.config.phrase_time_limit)
            .await?;
        let sample = match outcome {
            CaptureOutcome::Captured(sample) => sample,
            CaptureOutcome::Timeout => return Ok(State::Listening),
        };

        self.transition_to(State::Recognizing);
        self.emit(CaneEvent::Recognizing);

        let text = match self.recognizer.recognize(sample).await? {
            RecognitionOutcome::Recognized(text) => text,
            RecognitionOutcome::Unintelligible => {
                self.emit(CaneEvent::Unintelligible);
                return Ok(State::Listening);
            }
            RecognitionOutcome::NetworkError(detail) => {
                error!(detail = %detail, "recognition service unavailable");
                self.emit(CaneEvent::NetworkError { detail });
                return Ok(State::Listening);
            }
            RecognitionOutcome::Timeout => {
                let after_ms = self.recognizer.deadline().as_millis() as u64;
                error!(after_ms, "recognition service did not answer");
                self.emit(CaneEvent::RecognitionTimedOut { after_ms });
                return Ok(State::Listening);
            }
        };

        self.emit(CaneEvent::Heard { text: text.clone() });
        self.transition_to(State::Dispatching);

        let command = self.classifier.classify(&text);
        info!(%command, "command classified");

        match command {
            Command::StartDetection => {
                self.transition_to(State::RunningSession);
                self.emit(CaneEvent::SessionStarted);

                let started = Instant::now();
                let result = self.runner.run(self.config.session_config()).await;
                let duration_ms = started.elapsed().as_millis() as u64;

                let error = match result {
                    DetectionSessionResult::Completed => None,
                    DetectionSessionResult::Failed(detail) => Some(detail),
                };
                self.emit(CaneEvent::SessionFinished { error, duration_ms });

                Ok(State::Listening)
            }
            Command::Exit => {
                self.emit(CaneEvent::Exiting);
                self.transition_to(State::Stopped);
                Ok(State::Stopped)
            }
            Command::Unknown => Ok(State::Listening),
        }
    }

    /// Stop after an interrupt
    fn interrupt(&mut self) -> StopReason {
        self.running = false;
        self.transition_to(State::Stopped);
        self.emit(CaneEvent::Interrupted);
        info!("session controller interrupted");
        StopReason::Interrupted
    }

    /// Perform a state transition
    fn transition_to(&mut self, new_state: State) {
        let old_state = self.state;
        if old_state == new_state {
            return;
        }

        let duration_ms = self.state_entered_at.elapsed().as_millis() as u64;
        info!(
            from = %old_state,
            to = %new_state,
            duration_ms = duration_ms,
            "state transition"
        );

        self.state = new_state;
        self.state_entered_at = Instant::now();
    }

    fn emit(&self, event: CaneEvent) {
        debug!(?event, "emitting event");
        let _ = self.event_tx.send(event);
    }
}
