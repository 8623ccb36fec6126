//! OpenAI-compatible transcription service

use std::io::Cursor;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, error, info, warn};

use super::{RecognitionOutcome, RecognitionService};
use crate::audio::AudioSample;
use crate::error::RecognizerError;

/// Response from a Whisper transcription endpoint
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Transcribes speech through a Whisper-style HTTP API
pub struct WhisperService {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl WhisperService {
    /// Create a service client
    pub fn new(endpoint: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl RecognitionService for WhisperService {
    async fn transcribe(&self, sample: &AudioSample) -> Result<RecognitionOutcome, RecognizerError> {
        let wav = samples_to_wav(&sample.samples, sample.sample_rate)?;
        debug!(audio_bytes = wav.len(), "starting transcription");

        let part = reqwest::multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| RecognizerError::Encode(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone());

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_connect() || e.is_timeout() || e.is_request() => {
                warn!(error = %e, "transcription request failed");
                return Ok(RecognitionOutcome::NetworkError(e.to_string()));
            }
            Err(e) => return Err(RecognizerError::Response(e.to_string())),
        };

        let status = response.status();
        debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if is_service_unavailable(status) {
                return Ok(RecognitionOutcome::NetworkError(format!("{status}: {body}")));
            }
            error!(status = %status, body = %body, "transcription API error");
            return Err(RecognizerError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let result: WhisperResponse = response
            .json()
            .await
            .map_err(|e| RecognizerError::Response(e.to_string()))?;

        if result.text.trim().is_empty() {
            return Ok(RecognitionOutcome::Unintelligible);
        }

        info!(transcript = %result.text, "transcription complete");
        Ok(RecognitionOutcome::Recognized(result.text))
    }
}

/// Statuses that mean "try again later" rather than "bad request"
fn is_service_unavailable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Convert f32 samples to 16-bit mono WAV bytes
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, RecognizerError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| RecognizerError::Encode(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| RecognizerError::Encode(e.to_string()))?;
        }

        writer
            .finalize()
            .map_err(|e| RecognizerError::Encode(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
