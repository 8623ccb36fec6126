//! Detection engine boundary
//!
//! The engine owns model loading, frame acquisition and inference. The cane
//! only hands it a session configuration and a feedback session to announce
//! detections through.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use super::{DetectionSessionConfig, FeedbackSession};
use crate::error::EngineError;

/// Time an engine may take to shut down after its session ends
const DEFAULT_TEARDOWN_GRACE: Duration = Duration::from_secs(5);

/// External object detector
#[async_trait]
pub trait DetectionEngine: Send + Sync {
    /// Run detection for `config.duration`, announcing through `feedback`
    async fn run(
        &self,
        config: &DetectionSessionConfig,
        feedback: &mut FeedbackSession,
    ) -> Result<(), EngineError>;
}

/// Detection engine run as a child process
///
/// The process receives `--weights`, `--source`, `--timeout` and, unless
/// saving is enabled, `--nosave`. Each non-empty stdout line is spoken.
pub struct ProcessEngine {
    command: Vec<String>,
    teardown_grace: Duration,
}

impl ProcessEngine {
    /// Create an engine from a command line
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            teardown_grace: DEFAULT_TEARDOWN_GRACE,
        }
    }

    /// Override the teardown grace period
    pub fn with_teardown_grace(mut self, grace: Duration) -> Self {
        self.teardown_grace = grace;
        self
    }

    fn arguments(config: &DetectionSessionConfig) -> Vec<String> {
        let mut args = vec![
            "--weights".to_string(),
            config.weights.display().to_string(),
            "--source".to_string(),
            config.source.clone(),
            "--timeout".to_string(),
            config.duration.as_secs_f64().to_string(),
        ];
        if !config.save_results {
            args.push("--nosave".to_string());
        }
        args
    }
}

#[async_trait]
impl DetectionEngine for ProcessEngine {
    async fn run(
        &self,
        config: &DetectionSessionConfig,
        feedback: &mut FeedbackSession,
    ) -> Result<(), EngineError> {
        let (program, base_args) = self
            .command
            .split_first()
            .ok_or_else(|| EngineError::Command("empty detection command".to_string()))?;

        let mut child = Command::new(program)
            .args(base_args)
            .args(Self::arguments(config))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(EngineError::Spawn)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Command("engine has no stdout".to_string()))?;

        debug!(program = %program, "detection engine started");

        let deadline = Instant::now() + config.duration + self.teardown_grace;
        let mut lines = BufReader::new(stdout).lines();

        loop {
            match timeout_at(deadline, lines.next_line()).await {
                Ok(Ok(Some(line))) => {
                    let announcement = line.trim();
                    if announcement.is_empty() {
                        continue;
                    }
                    debug!(announcement, "detection");
                    match timeout_at(deadline, feedback.speak(announcement)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => warn!(error = %e, announcement, "announcement failed"),
                        Err(_) => {
                            warn!("speech output outlasted the session, killing engine");
                            child.kill().await?;
                            return Err(EngineError::Overran(config.duration));
                        }
                    }
                }
                Ok(Ok(None)) => break,
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    warn!("detection engine overran its session, killing");
                    child.kill().await?;
                    return Err(EngineError::Overran(config.duration));
                }
            }
        }

        let status = match timeout_at(deadline, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                warn!("detection engine did not exit, killing");
                child.kill().await?;
                return Err(EngineError::Overran(config.duration));
            }
        };

        match status.code() {
            Some(0) => Ok(()),
            Some(code) => Err(EngineError::Exit(code)),
            None => Err(EngineError::Killed),
        }
    }
}
