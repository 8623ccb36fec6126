//! Microphone backed by an external raw PCM recorder
//!
//! Used instead of the input device when a recorder command is configured.
//! The recorder (e.g. `arecord`) is spawned when the microphone is opened and
//! must write signed 16-bit little-endian mono samples to stdout. It is killed
//! when the stream is dropped.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tracing::debug;

use super::{Microphone, MicrophoneStream};
use crate::error::CaptureError;

/// Frame length in milliseconds
const FRAME_MS: u32 = 50;

/// Microphone that records through a child process
pub struct CommandMicrophone {
    command: Vec<String>,
    sample_rate: u32,
}

impl CommandMicrophone {
    /// Create a microphone from a recorder command line
    pub fn new(command: Vec<String>, sample_rate: u32) -> Self {
        Self {
            command,
            sample_rate,
        }
    }
}

#[async_trait]
impl Microphone for CommandMicrophone {
    async fn open(&self) -> Result<Box<dyn MicrophoneStream>, CaptureError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| CaptureError::Open("empty recorder command".to_string()))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CaptureError::Open(format!("{program}: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CaptureError::Open("recorder has no stdout".to_string()))?;

        debug!(program = %program, sample_rate = self.sample_rate, "microphone opened");

        let frame_samples = (self.sample_rate * FRAME_MS / 1000).max(1) as usize;

        Ok(Box::new(RecorderStream {
            child,
            stdout,
            sample_rate: self.sample_rate,
            buffer: vec![0u8; frame_samples * 2],
        }))
    }
}

struct RecorderStream {
    child: Child,
    stdout: ChildStdout,
    sample_rate: u32,
    buffer: Vec<u8>,
}

#[async_trait]
impl MicrophoneStream for RecorderStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    async fn next_frame(&mut self) -> Result<Option<Vec<f32>>, CaptureError> {
        let mut filled = 0;
        while filled < self.buffer.len() {
            let read = self.stdout.read(&mut self.buffer[filled..]).await?;
            if read == 0 {
                break;
            }
            filled += read;
        }

        // Drop a dangling odd byte from a truncated final read
        let usable = filled - filled % 2;
        if usable == 0 {
            return Ok(None);
        }

        Ok(Some(pcm16_to_f32(&self.buffer[..usable])))
    }
}

impl Drop for RecorderStream {
    fn drop(&mut self) {
        if let Err(e) = self.child.start_kill() {
            debug!(error = %e, "recorder already exited");
        }
        debug!("microphone released");
    }
}

/// Decode signed 16-bit little-endian PCM
fn pcm16_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0)
        .collect()
}
