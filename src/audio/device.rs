//! Microphone backed by a system input device through cpal
//!
//! `cpal::Stream` is not `Send`, so each opened stream lives on its own
//! thread. Frames cross to the async side over a bounded channel, and the
//! thread drops the stream as soon as the handle is dropped.

use std::sync::mpsc as std_mpsc;
use std::thread;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, StreamConfig, SupportedStreamConfig};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::{Microphone, MicrophoneStream};
use crate::error::CaptureError;

/// Callback buffers queued before the oldest are dropped
const FRAME_QUEUE: usize = 100;

/// Microphone reading from the default (or a named) input device
pub struct DeviceMicrophone {
    device_name: Option<String>,
    sample_rate: u32,
}

impl DeviceMicrophone {
    /// Create a microphone for a device name substring and a preferred rate
    pub fn new(device_name: Option<String>, sample_rate: u32) -> Self {
        Self {
            device_name,
            sample_rate,
        }
    }
}

#[async_trait]
impl Microphone for DeviceMicrophone {
    async fn open(&self) -> Result<Box<dyn MicrophoneStream>, CaptureError> {
        let (frame_tx, frame_rx) = mpsc::channel(FRAME_QUEUE);
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        let device_name = self.device_name.clone();
        let sample_rate = self.sample_rate;

        thread::Builder::new()
            .name("microphone".to_string())
            .spawn(move || {
                let stream = match start_stream(device_name.as_deref(), sample_rate, frame_tx) {
                    Ok((stream, actual_rate)) => {
                        let _ = ready_tx.send(Ok(actual_rate));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Blocks until the handle is dropped
                let _ = stop_rx.recv();
                drop(stream);
                debug!("microphone released");
            })
            .map_err(|e| CaptureError::Open(format!("failed to start capture thread: {e}")))?;

        let actual_rate = ready_rx
            .await
            .map_err(|_| CaptureError::Open("capture thread exited".to_string()))??;

        Ok(Box::new(DeviceStream {
            frames: frame_rx,
            sample_rate: actual_rate,
            stop: Some(stop_tx),
        }))
    }
}

struct DeviceStream {
    frames: mpsc::Receiver<Vec<f32>>,
    sample_rate: u32,
    stop: Option<std_mpsc::Sender<()>>,
}

#[async_trait]
impl MicrophoneStream for DeviceStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    async fn next_frame(&mut self) -> Result<Option<Vec<f32>>, CaptureError> {
        Ok(self.frames.recv().await)
    }
}

impl Drop for DeviceStream {
    fn drop(&mut self) {
        // Closing the stop channel wakes the capture thread
        self.stop.take();
        self.frames.close();
    }
}

/// Build and start an input stream, returning it with its actual rate
fn start_stream(
    device_name: Option<&str>,
    sample_rate: u32,
    frames: mpsc::Sender<Vec<f32>>,
) -> Result<(cpal::Stream, u32), CaptureError> {
    let host = cpal::default_host();
    let device = match device_name {
        Some(name) => find_device(&host, name)?,
        None => host
            .default_input_device()
            .ok_or_else(|| CaptureError::Open("no input device available".to_string()))?,
    };

    let supported = select_config(&device, sample_rate)?;
    let channels = usize::from(supported.channels());
    let actual_rate = supported.sample_rate().0;
    let config: StreamConfig = supported.config();

    info!(
        device = %device.name().unwrap_or_else(|_| "unknown".to_string()),
        channels,
        sample_rate = actual_rate,
        target_rate = sample_rate,
        "microphone opened"
    );

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if let Err(TrySendError::Full(_)) = frames.try_send(downmix(data, channels)) {
                    warn!("microphone buffer overflow, dropping samples");
                }
            },
            |err| {
                error!(error = %err, "microphone stream error");
            },
            None,
        )
        .map_err(|e| CaptureError::Open(e.to_string()))?;

    stream
        .play()
        .map_err(|e| CaptureError::Open(e.to_string()))?;

    Ok((stream, actual_rate))
}

fn find_device(host: &cpal::Host, name: &str) -> Result<Device, CaptureError> {
    let devices = host
        .input_devices()
        .map_err(|e| CaptureError::Open(e.to_string()))?;

    for device in devices {
        if let Ok(device_name) = device.name() {
            if device_name.contains(name) {
                return Ok(device);
            }
        }
    }

    Err(CaptureError::Open(format!("input device not found: {name}")))
}

/// Pick an f32 input configuration, preferring mono at the target rate
fn select_config(device: &Device, sample_rate: u32) -> Result<SupportedStreamConfig, CaptureError> {
    let target = SampleRate(sample_rate);
    let mut fallback = None;

    let configs = device
        .supported_input_configs()
        .map_err(|e| CaptureError::Open(e.to_string()))?;

    for range in configs.filter(|c| c.sample_format() == SampleFormat::F32) {
        let covers_target = range.min_sample_rate() <= target && target <= range.max_sample_rate();
        if range.channels() == 1 && covers_target {
            return Ok(range.with_sample_rate(target));
        }
        if fallback.is_none() {
            fallback = Some(if covers_target {
                range.with_sample_rate(target)
            } else {
                range.with_max_sample_rate()
            });
        }
    }

    fallback.ok_or_else(|| CaptureError::Open("no f32 input configuration".to_string()))
}

/// Average interleaved channels into mono
fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }

    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}
