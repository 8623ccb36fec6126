//! Scripted collaborators for unit tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use crate::audio::{AudioSample, Microphone, MicrophoneStream};
use crate::detection::{DetectionEngine, DetectionSessionConfig, FeedbackSession, FeedbackSink, Synthesizer};
use crate::error::{CaptureError, EngineError, FeedbackError, RecognizerError};
use crate::speech::{RecognitionOutcome, RecognitionService};

pub const RATE: u32 = 16_000;

/// 100ms frames
pub const FRAME: usize = 1_600;

pub fn sample() -> AudioSample {
    AudioSample {
        samples: vec![0.25; FRAME],
        sample_rate: RATE,
        captured_at: SystemTime::now(),
        max_duration: Duration::from_secs(5),
    }
}

#[derive(Clone)]
enum MicScript {
    Frames(Vec<Vec<f32>>),
    Endless(Vec<f32>),
    Stalled,
}

/// Microphone replaying the same frames on every open
pub struct ScriptedMicrophone {
    script: MicScript,
    opened: AtomicUsize,
    released: Arc<AtomicUsize>,
}

impl ScriptedMicrophone {
    pub fn new(frames: Vec<Vec<f32>>) -> Arc<Self> {
        Self::with_script(MicScript::Frames(frames))
    }

    pub fn endless(frame: Vec<f32>) -> Arc<Self> {
        Self::with_script(MicScript::Endless(frame))
    }

    /// Opens but never delivers a frame
    pub fn stalled() -> Arc<Self> {
        Self::with_script(MicScript::Stalled)
    }

    fn with_script(script: MicScript) -> Arc<Self> {
        Arc::new(Self {
            script,
            opened: AtomicUsize::new(0),
            released: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Microphone for ScriptedMicrophone {
    async fn open(&self) -> Result<Box<dyn MicrophoneStream>, CaptureError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let frames = match &self.script {
            MicScript::Frames(frames) => frames.iter().cloned().collect(),
            _ => VecDeque::new(),
        };
        Ok(Box::new(ScriptedStream {
            script: self.script.clone(),
            frames,
            released: Arc::clone(&self.released),
        }))
    }
}

struct ScriptedStream {
    script: MicScript,
    frames: VecDeque<Vec<f32>>,
    released: Arc<AtomicUsize>,
}

#[async_trait]
impl MicrophoneStream for ScriptedStream {
    fn sample_rate(&self) -> u32 {
        RATE
    }

    async fn next_frame(&mut self) -> Result<Option<Vec<f32>>, CaptureError> {
        match &self.script {
            MicScript::Frames(_) => Ok(self.frames.pop_front()),
            MicScript::Endless(frame) => Ok(Some(frame.clone())),
            MicScript::Stalled => std::future::pending().await,
        }
    }
}

impl Drop for ScriptedStream {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Recognition service returning queued outcomes
///
/// Once the queue is empty it hears "exit", so looping tests terminate.
pub struct ScriptedRecognizer {
    outcomes: Mutex<VecDeque<Result<RecognitionOutcome, RecognizerError>>>,
    hang: bool,
    calls: AtomicUsize,
}

impl ScriptedRecognizer {
    pub fn new(outcomes: Vec<Result<RecognitionOutcome, RecognizerError>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            hang: false,
            calls: AtomicUsize::new(0),
        })
    }

    /// Never answers
    pub fn hanging() -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(VecDeque::new()),
            hang: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecognitionService for ScriptedRecognizer {
    async fn transcribe(&self, _sample: &AudioSample) -> Result<RecognitionOutcome, RecognizerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            return std::future::pending().await;
        }

        let next = self.outcomes.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(RecognitionOutcome::Recognized("exit".to_string())))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum SynthScript {
    Speak,
    FailAcquire,
    Stuck,
}

/// Synthesizer counting acquire/release pairs
pub struct CountingSynthesizer {
    script: SynthScript,
    acquired: AtomicUsize,
    released: Arc<AtomicUsize>,
    spoken: Arc<Mutex<Vec<String>>>,
}

impl CountingSynthesizer {
    pub fn new() -> Arc<Self> {
        Self::build(SynthScript::Speak)
    }

    /// Every acquire fails
    pub fn failing() -> Arc<Self> {
        Self::build(SynthScript::FailAcquire)
    }

    /// Acquires, but an utterance never finishes
    pub fn stuck() -> Arc<Self> {
        Self::build(SynthScript::Stuck)
    }

    fn build(script: SynthScript) -> Arc<Self> {
        Arc::new(Self {
            script,
            acquired: AtomicUsize::new(0),
            released: Arc::new(AtomicUsize::new(0)),
            spoken: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl Synthesizer for CountingSynthesizer {
    async fn acquire(&self) -> Result<Box<dyn FeedbackSink>, FeedbackError> {
        if self.script == SynthScript::FailAcquire {
            return Err(FeedbackError::Spawn(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no audio device",
            )));
        }

        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingSink {
            stuck: self.script == SynthScript::Stuck,
            released: Arc::clone(&self.released),
            spoken: Arc::clone(&self.spoken),
        }))
    }
}

struct CountingSink {
    stuck: bool,
    released: Arc<AtomicUsize>,
    spoken: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl FeedbackSink for CountingSink {
    async fn speak(&mut self, text: &str) -> Result<(), FeedbackError> {
        self.spoken.lock().unwrap().push(text.to_string());
        if self.stuck {
            return std::future::pending().await;
        }
        Ok(())
    }

    fn release(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// What a scripted engine does on every run
#[derive(Debug, Clone)]
pub enum EngineScript {
    Complete,
    Announce(Vec<String>),
    Fail(i32),
    Sleep(Duration),
    Hang,
}

/// Engine recording its sessions and how many overlap
pub struct ScriptedEngine {
    script: EngineScript,
    configs: Mutex<Vec<DetectionSessionConfig>>,
    active: Arc<AtomicUsize>,
    max_active: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new(script: EngineScript) -> Arc<Self> {
        Arc::new(Self {
            script,
            configs: Mutex::new(Vec::new()),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: AtomicUsize::new(0),
        })
    }

    pub fn configs(&self) -> Vec<DetectionSessionConfig> {
        self.configs.lock().unwrap().clone()
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DetectionEngine for ScriptedEngine {
    async fn run(
        &self,
        config: &DetectionSessionConfig,
        feedback: &mut FeedbackSession,
    ) -> Result<(), EngineError> {
        self.configs.lock().unwrap().push(config.clone());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        let _guard = ActiveGuard(Arc::clone(&self.active));

        match &self.script {
            EngineScript::Complete => Ok(()),
            EngineScript::Announce(lines) => {
                for line in lines {
                    let _ = feedback.speak(line).await;
                }
                Ok(())
            }
            EngineScript::Fail(code) => Err(EngineError::Exit(*code)),
            EngineScript::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(())
            }
            EngineScript::Hang => std::future::pending().await,
        }
    }
}
