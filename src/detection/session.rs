//! Detection session supervision

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info};

use super::{DetectionEngine, FeedbackSession, Synthesizer};

/// Parameters for one detection session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionSessionConfig {
    /// Model weights reference
    pub weights: PathBuf,
    /// Camera index or video source identifier
    pub source: String,
    /// How long the engine runs before returning control
    pub duration: Duration,
    /// Whether the engine persists annotated results
    pub save_results: bool,
}

impl Default for DetectionSessionConfig {
    fn default() -> Self {
        Self {
            weights: PathBuf::from("yolov9e.pt"),
            source: "0".to_string(),
            duration: Duration::from_secs(10),
            save_results: false,
        }
    }
}

/// Outcome of one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionSessionResult {
    /// The engine ran to completion
    Completed,
    /// The engine or the feedback device failed
    Failed(String),
}

/// Runs one bounded detection session at a time
pub struct DetectionSessionRunner {
    engine: Arc<dyn DetectionEngine>,
    synthesizer: Arc<dyn Synthesizer>,
}

impl DetectionSessionRunner {
    /// Create a runner over an engine and a speech output device
    pub fn new(engine: Arc<dyn DetectionEngine>, synthesizer: Arc<dyn Synthesizer>) -> Self {
        Self {
            engine,
            synthesizer,
        }
    }

    /// Run a session
    ///
    /// Never fails: engine and feedback errors become `Failed`. The feedback
    /// device is released before this returns, and also when the returned
    /// future is dropped mid-session.
    pub async fn run(&self, config: DetectionSessionConfig) -> DetectionSessionResult {
        let started = Instant::now();

        let mut feedback = match FeedbackSession::acquire(self.synthesizer.as_ref()).await {
            Ok(feedback) => feedback,
            Err(e) => {
                error!(error = %e, "failed to acquire voice feedback");
                return DetectionSessionResult::Failed(e.to_string());
            }
        };

        info!(
            weights = %config.weights.display(),
            source = %config.source,
            duration_ms = config.duration.as_millis() as u64,
            "detection session started"
        );

        let result = self.engine.run(&config, &mut feedback).await;
        feedback.release();

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(()) => {
                info!(elapsed_ms, "detection session completed");
                DetectionSessionResult::Completed
            }
            Err(e) => {
                error!(error = %e, elapsed_ms, "detection session failed");
                DetectionSessionResult::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_pending, assert_ready_eq, task};

    use super::*;
    use crate::testing::{CountingSynthesizer, EngineScript, ScriptedEngine};

    #[tokio::test]
    async fn test_completed_session_releases_feedback() {
        let synth = CountingSynthesizer::new();
        let engine = ScriptedEngine::new(EngineScript::Announce(vec!["person".to_string()]));
        let runner = DetectionSessionRunner::new(engine.clone(), synth.clone());

        let result = runner.run(DetectionSessionConfig::default()).await;

        assert_eq!(result, DetectionSessionResult::Completed);
        assert_eq!(synth.acquired(), 1);
        assert_eq!(synth.released(), 1);
        assert_eq!(synth.spoken(), vec!["person".to_string()]);
        assert_eq!(engine.configs(), vec![DetectionSessionConfig::default()]);
    }

    #[tokio::test]
    async fn test_engine_failure_is_contained() {
        let synth = CountingSynthesizer::new();
        let engine = ScriptedEngine::new(EngineScript::Fail(3));
        let runner = DetectionSessionRunner::new(engine, synth.clone());

        let result = runner.run(DetectionSessionConfig::default()).await;

        assert!(matches!(result, DetectionSessionResult::Failed(ref detail) if detail.contains('3')));
        assert_eq!(synth.acquired(), 1);
        assert_eq!(synth.released(), 1);
    }

    #[tokio::test]
    async fn test_interrupted_session_releases_feedback() {
        let synth = CountingSynthesizer::new();
        let engine = ScriptedEngine::new(EngineScript::Hang);
        let runner = DetectionSessionRunner::new(engine.clone(), synth.clone());

        let mut run = task::spawn(runner.run(DetectionSessionConfig::default()));
        assert_pending!(run.poll());
        assert_eq!(synth.acquired(), 1);
        assert_eq!(synth.released(), 0);
        assert_eq!(engine.active(), 1);

        drop(run);
        assert_eq!(synth.released(), 1);
        assert_eq!(engine.active(), 0);
    }

    #[tokio::test]
    async fn test_acquire_failure_skips_engine() {
        let synth = CountingSynthesizer::failing();
        let engine = ScriptedEngine::new(EngineScript::Complete);
        let runner = DetectionSessionRunner::new(engine.clone(), synth.clone());

        let mut run = task::spawn(runner.run(DetectionSessionConfig::default()));
        assert_ready_eq!(
            run.poll(),
            DetectionSessionResult::Failed("failed to start speech synthesizer: no audio device".to_string())
        );
        assert!(engine.configs().is_empty());
        assert_eq!(synth.released(), 0);
    }
}
