//! Bounded speech capture from a microphone
//!
//! Waits up to `listen_timeout` for speech to begin, then records until the
//! speaker pauses or `phrase_time_limit` is reached. The microphone stream is
//! opened per call and dropped on every exit path, including cancellation of
//! the returned future.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace};

use crate::error::CaptureError;

/// Trailing silence that ends a phrase
const PAUSE_THRESHOLD: Duration = Duration::from_millis(800);

/// A source of microphone streams
#[async_trait]
pub trait Microphone: Send + Sync {
    /// Acquire the device; dropping the stream releases it
    async fn open(&self) -> Result<Box<dyn MicrophoneStream>, CaptureError>;
}

/// An open microphone
#[async_trait]
pub trait MicrophoneStream: Send {
    /// Samples per second of the produced frames
    fn sample_rate(&self) -> u32;

    /// Read the next frame of mono samples in [-1.0, 1.0]
    ///
    /// Returns `None` once the device stops producing audio.
    async fn next_frame(&mut self) -> Result<Option<Vec<f32>>, CaptureError>;
}

/// Captured speech, owned by the cycle that recorded it
#[derive(Debug, Clone)]
pub struct AudioSample {
    /// Mono samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Samples per second
    pub sample_rate: u32,
    /// When speech began
    pub captured_at: SystemTime,
    /// Upper bound the capture was allowed to reach
    pub max_duration: Duration,
}

impl AudioSample {
    /// Length of the recorded audio
    pub fn duration(&self) -> Duration {
        samples_to_duration(self.samples.len(), self.sample_rate)
    }
}

/// Result of one capture attempt
#[derive(Debug)]
pub enum CaptureOutcome {
    /// Speech was recorded
    Captured(AudioSample),
    /// Nobody spoke within the listen timeout
    Timeout,
}

/// Records one phrase per call
pub struct AudioCapture {
    microphone: Arc<dyn Microphone>,
    energy_threshold: f32,
}

impl AudioCapture {
    /// Create a capture front end over a microphone
    pub fn new(microphone: Arc<dyn Microphone>, energy_threshold: f32) -> Self {
        Self {
            microphone,
            energy_threshold,
        }
    }

    /// Record a single phrase
    pub async fn capture(
        &self,
        listen_timeout: Duration,
        phrase_time_limit: Duration,
    ) -> Result<CaptureOutcome, CaptureError> {
        let mut stream = self.microphone.open().await?;
        let sample_rate = stream.sample_rate();

        let listen_deadline = Instant::now() + listen_timeout;
        let mut waited = 0usize;

        let onset = loop {
            let frame = match timeout_at(listen_deadline, stream.next_frame()).await {
                Ok(frame) => frame?.ok_or(CaptureError::Closed)?,
                Err(_) => {
                    debug!("no speech before listen timeout");
                    return Ok(CaptureOutcome::Timeout);
                }
            };

            let energy = frame_energy(&frame);
            if energy > self.energy_threshold {
                trace!(energy, "speech onset");
                break frame;
            }

            waited += frame.len();
            if samples_to_duration(waited, sample_rate) >= listen_timeout {
                debug!("no speech before listen timeout");
                return Ok(CaptureOutcome::Timeout);
            }
        };

        let captured_at = SystemTime::now();
        let phrase_deadline = Instant::now() + phrase_time_limit;
        let max_samples = duration_to_samples(phrase_time_limit, sample_rate);
        let pause_samples = duration_to_samples(PAUSE_THRESHOLD, sample_rate);

        let mut samples = onset;
        let mut trailing_silence = 0usize;

        while samples.len() < max_samples && trailing_silence < pause_samples {
            let frame = match timeout_at(phrase_deadline, stream.next_frame()).await {
                Ok(frame) => frame?,
                Err(_) => break,
            };
            let Some(frame) = frame else {
                break;
            };

            if frame_energy(&frame) > self.energy_threshold {
                trailing_silence = 0;
            } else {
                trailing_silence += frame.len();
            }
            samples.extend_from_slice(&frame);
        }

        samples.truncate(max_samples);
        drop(stream);

        let sample = AudioSample {
            samples,
            sample_rate,
            captured_at,
            max_duration: phrase_time_limit,
        };
        debug!(duration_ms = sample.duration().as_millis() as u64, "phrase captured");

        Ok(CaptureOutcome::Captured(sample))
    }
}

/// Root-mean-square level of a frame
pub fn frame_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

fn samples_to_duration(samples: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(samples as f64 / f64::from(sample_rate))
}

fn duration_to_samples(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_secs_f64() * f64::from(sample_rate)).round() as usize
}
