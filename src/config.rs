//! Configuration loading and management

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::detection::DetectionSessionConfig;

/// Default transcription endpoint (OpenAI-compatible)
const DEFAULT_STT_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Accepted capture sample rates
const MIN_SAMPLE_RATE: u32 = 8_000;
const MAX_SAMPLE_RATE: u32 = 192_000;

/// Smart cane configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Model weights handed to the detection engine
    pub weights: PathBuf,

    /// Camera index or video source identifier
    pub source: String,

    /// How long one detection session runs
    pub session_duration: Duration,

    /// Whether the engine should persist annotated results
    pub save_results: bool,

    /// How long to wait for speech to begin
    pub listen_timeout: Duration,

    /// Maximum length of one spoken phrase
    pub phrase_time_limit: Duration,

    /// Hard upper bound on one recognition round-trip
    pub recognition_deadline: Duration,

    /// Word that starts a detection session
    pub start_word: String,

    /// Word that stops the cane
    pub exit_word: String,

    /// RMS level above which a frame counts as speech
    pub energy_threshold: f32,

    /// Detection engine command line
    pub detect_command: Vec<String>,

    /// Input device name substring, default device when unset
    pub input_device: Option<String>,

    /// Raw PCM recorder command line (s16le mono), replaces the input device
    pub record_command: Option<Vec<String>>,

    /// Capture sample rate
    pub sample_rate: u32,

    /// Time the detection engine gets to exit after its session
    pub teardown_grace: Duration,

    /// Speech synthesizer command line
    pub tts_command: Vec<String>,

    /// Transcription endpoint
    pub stt_url: String,

    /// Transcription model name
    pub stt_model: String,

    /// Transcription API key
    pub stt_api_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            weights: PathBuf::from("yolov9e.pt"),
            source: "0".to_string(),
            session_duration: Duration::from_secs(10),
            save_results: false,
            listen_timeout: Duration::from_secs(5),
            phrase_time_limit: Duration::from_secs(5),
            recognition_deadline: Duration::from_secs(10),
            start_word: "hello".to_string(),
            exit_word: "exit".to_string(),
            energy_threshold: 0.03,
            detect_command: split_command("python3 detect.py"),
            input_device: None,
            record_command: None,
            sample_rate: 16_000,
            teardown_grace: Duration::from_secs(5),
            tts_command: split_command("espeak"),
            stt_url: DEFAULT_STT_URL.to_string(),
            stt_model: "whisper-1".to_string(),
            stt_api_key: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let secs = |key: &str, default: Duration| -> Result<Duration> {
            match lookup(key) {
                Some(raw) => {
                    let secs: f64 = parse(key, &raw)?;
                    if !secs.is_finite() || secs <= 0.0 {
                        bail!("{key} must be a positive number of seconds, got {raw:?}");
                    }
                    Ok(Duration::from_secs_f64(secs))
                }
                None => Ok(default),
            }
        };

        let command = |key: &str, default: Vec<String>| -> Result<Vec<String>> {
            match lookup(key) {
                Some(raw) => {
                    let parts = split_command(&raw);
                    if parts.is_empty() {
                        bail!("{key} must not be empty");
                    }
                    Ok(parts)
                }
                None => Ok(default),
            }
        };

        let word = |key: &str, default: String| -> Result<String> {
            match lookup(key) {
                Some(raw) => {
                    let word = raw.trim().to_lowercase();
                    if word.is_empty() {
                        bail!("{key} must not be empty");
                    }
                    Ok(word)
                }
                None => Ok(default),
            }
        };

        let config = Self {
            weights: lookup("SMART_CANE_WEIGHTS")
                .map(PathBuf::from)
                .unwrap_or(defaults.weights),
            source: lookup("SMART_CANE_SOURCE").unwrap_or(defaults.source),
            session_duration: secs("SMART_CANE_SESSION_SECS", defaults.session_duration)?,
            save_results: lookup("SMART_CANE_SAVE_RESULTS")
                .map(|raw| parse_bool("SMART_CANE_SAVE_RESULTS", &raw))
                .transpose()?
                .unwrap_or(defaults.save_results),
            listen_timeout: secs("SMART_CANE_LISTEN_TIMEOUT_SECS", defaults.listen_timeout)?,
            phrase_time_limit: secs("SMART_CANE_PHRASE_LIMIT_SECS", defaults.phrase_time_limit)?,
            recognition_deadline: secs(
                "SMART_CANE_RECOGNITION_DEADLINE_SECS",
                defaults.recognition_deadline,
            )?,
            start_word: word("SMART_CANE_START_WORD", defaults.start_word)?,
            exit_word: word("SMART_CANE_EXIT_WORD", defaults.exit_word)?,
            energy_threshold: lookup("SMART_CANE_ENERGY_THRESHOLD")
                .map(|raw| parse("SMART_CANE_ENERGY_THRESHOLD", &raw))
                .transpose()?
                .unwrap_or(defaults.energy_threshold),
            detect_command: command("SMART_CANE_DETECT_CMD", defaults.detect_command)?,
            input_device: lookup("SMART_CANE_INPUT_DEVICE")
                .map(|raw| raw.trim().to_string())
                .filter(|name| !name.is_empty()),
            record_command: lookup("SMART_CANE_RECORD_CMD")
                .map(|_| command("SMART_CANE_RECORD_CMD", Vec::new()))
                .transpose()?,
            sample_rate: lookup("SMART_CANE_SAMPLE_RATE")
                .map(|raw| parse_sample_rate("SMART_CANE_SAMPLE_RATE", &raw))
                .transpose()?
                .unwrap_or(defaults.sample_rate),
            teardown_grace: secs("SMART_CANE_TEARDOWN_GRACE_SECS", defaults.teardown_grace)?,
            tts_command: command("SMART_CANE_TTS_CMD", defaults.tts_command)?,
            stt_url: lookup("SMART_CANE_STT_URL").unwrap_or(defaults.stt_url),
            stt_model: lookup("SMART_CANE_STT_MODEL").unwrap_or(defaults.stt_model),
            stt_api_key: lookup("OPENAI_API_KEY").unwrap_or(defaults.stt_api_key),
        };

        if config.start_word == config.exit_word {
            bail!("start and exit words must differ");
        }

        Ok(config)
    }

    /// Build the parameters for one detection session
    pub fn session_config(&self) -> DetectionSessionConfig {
        DetectionSessionConfig {
            weights: self.weights.clone(),
            source: self.source.clone(),
            duration: self.session_duration,
            save_results: self.save_results,
        }
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("invalid value for {key}: {raw:?}"))
}

fn parse_sample_rate(key: &str, raw: &str) -> Result<u32> {
    let rate: u32 = parse(key, raw)?;
    if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&rate) {
        bail!("{key} must be between {MIN_SAMPLE_RATE} and {MAX_SAMPLE_RATE} Hz, got {rate}");
    }
    Ok(rate)
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("invalid value for {key}: {raw:?}"),
    }
}

fn split_command(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}
